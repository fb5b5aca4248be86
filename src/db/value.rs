use std::borrow::Cow;
use std::fmt;
use std::ops::Index;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tiberius::{ColumnData, FromSql, ToSql};

use crate::error::{HarnessError, Result};

/// A single parameter or result cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view; `bit` columns read as 0/1.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(i64::from(*v)),
            SqlValue::BigInt(v) => Some(*v),
            SqlValue::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqlValue::Date(d) => Some(*d),
            SqlValue::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Decode one driver cell.
    pub fn from_column(data: ColumnData<'static>) -> Result<Self> {
        let value = match data {
            ColumnData::U8(v) => v.map(|v| SqlValue::Int(i32::from(v))),
            ColumnData::I16(v) => v.map(|v| SqlValue::Int(i32::from(v))),
            ColumnData::I32(v) => v.map(SqlValue::Int),
            ColumnData::I64(v) => v.map(SqlValue::BigInt),
            ColumnData::F32(v) => v.map(|v| SqlValue::Float(f64::from(v))),
            ColumnData::F64(v) => v.map(SqlValue::Float),
            ColumnData::Bit(v) => v.map(SqlValue::Bool),
            ColumnData::String(v) => v.map(|s| SqlValue::Text(s.into_owned())),
            ColumnData::Guid(v) => v.map(|g| SqlValue::Text(g.to_string())),
            ColumnData::Numeric(v) => v.map(|n| SqlValue::Text(n.to_string())),
            ref cell @ ColumnData::Date(_) => NaiveDate::from_sql(cell)?.map(SqlValue::Date),
            ref cell @ (ColumnData::DateTime(_)
            | ColumnData::SmallDateTime(_)
            | ColumnData::DateTime2(_)) => {
                NaiveDateTime::from_sql(cell)?.map(|dt| SqlValue::Text(dt.to_string()))
            }
            ref cell @ ColumnData::Time(_) => {
                NaiveTime::from_sql(cell)?.map(|t| SqlValue::Text(t.to_string()))
            }
            other => {
                return Err(HarnessError::Driver(format!(
                    "unsupported result column: {:?}",
                    other
                )))
            }
        };
        Ok(value.unwrap_or(SqlValue::Null))
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::BigInt(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Date(v) => write!(f, "{}", v),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlValue::Null => ColumnData::String(None),
            SqlValue::Bool(v) => ColumnData::Bit(Some(*v)),
            SqlValue::Int(v) => ColumnData::I32(Some(*v)),
            SqlValue::BigInt(v) => ColumnData::I64(Some(*v)),
            SqlValue::Float(v) => ColumnData::F64(Some(*v)),
            SqlValue::Text(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            SqlValue::Date(v) => v.to_sql(),
        }
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One fetched row, addressable by column position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Build a row with unnamed columns.
    pub fn from_values(values: Vec<SqlValue>) -> Self {
        Self {
            columns: vec![String::new(); values.len()],
            values,
        }
    }

    pub fn from_tiberius(row: tiberius::Row) -> Result<Self> {
        let columns = row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let values = row
            .into_iter()
            .map(SqlValue::from_column)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns, values })
    }

    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Index<usize> for Row {
    type Output = SqlValue;

    fn index(&self, idx: usize) -> &SqlValue {
        &self.values[idx]
    }
}
