use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{Row, SqlValue};
use crate::error::{HarnessError, Result};

/// Longest title `dbo.Chores.Title` accepts.
pub const MAX_TITLE_LEN: usize = 256;

/// Rows generated for the bulk insert.
pub const BULK_ROW_COUNT: usize = 5000;

/// One row of `dbo.Chores`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chore {
    pub id: i32,
    pub title: String,
    pub due_by: NaiveDate,
    pub is_complete: bool,
}

impl Chore {
    pub fn new(id: i32, title: &str, due_by: NaiveDate, is_complete: bool) -> Result<Self> {
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(HarnessError::Assertion(format!(
                "title of chore {} is longer than {} characters",
                id, MAX_TITLE_LEN
            )));
        }
        Ok(Self {
            id,
            title: title.to_string(),
            due_by,
            is_complete,
        })
    }

    /// Parameters for `insert ... (Id, Title, DueBy, IsComplete) values(?, ?, ?, ?)`.
    ///
    /// The date travels as its `YYYY-MM-DD` literal and the flag as 0/1; the
    /// server converts both to the column types.
    pub fn to_params(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Int(self.id),
            SqlValue::Text(self.title.clone()),
            SqlValue::Text(self.due_by.format("%Y-%m-%d").to_string()),
            SqlValue::Int(i32::from(self.is_complete)),
        ]
    }

    /// Read `(Title, DueBy, IsComplete)` back into a chore with the given id.
    pub fn from_row(id: i32, row: &Row) -> Result<Self> {
        let title = row
            .get(0)
            .and_then(SqlValue::as_str)
            .ok_or_else(|| column_error(id, "Title"))?;
        let due_by = row
            .get(1)
            .and_then(SqlValue::as_date)
            .ok_or_else(|| column_error(id, "DueBy"))?;
        let flag = row
            .get(2)
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| column_error(id, "IsComplete"))?;
        Chore::new(id, title, due_by, flag != 0)
    }
}

fn column_error(id: i32, column: &str) -> HarnessError {
    HarnessError::Assertion(format!("chore {}: column {} missing or mistyped", id, column))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// The chore the insert-and-query case writes and reads back.
pub fn trash_chore() -> Chore {
    Chore {
        id: 1,
        title: "Take out the trash".to_string(),
        due_by: date(2025, 9, 16),
        is_complete: false,
    }
}

/// Arguments for `dbo.save_chore`: title, due date, completion flag.
pub fn lawn_chore_params() -> Vec<SqlValue> {
    vec![
        SqlValue::Text("Mow the lawn".to_string()),
        SqlValue::Text("2025-09-20".to_string()),
        SqlValue::Int(0),
    ]
}

/// The four chores the bulk generator cycles through.
pub fn everyday_chores() -> Vec<Chore> {
    vec![
        Chore {
            id: 2,
            title: "Wash the dishes".to_string(),
            due_by: date(2025, 9, 17),
            is_complete: false,
        },
        Chore {
            id: 3,
            title: "Do the laundry".to_string(),
            due_by: date(2025, 9, 18),
            is_complete: false,
        },
        Chore {
            id: 4,
            title: "Clean the bathroom".to_string(),
            due_by: date(2025, 9, 19),
            is_complete: false,
        },
        Chore {
            id: 5,
            title: "Wash the car".to_string(),
            due_by: date(2025, 9, 21),
            is_complete: false,
        },
    ]
}

/// Deterministic bulk rows: `(i+1, titles[i % 4], 2025-12-31, 0)` for `i` in `0..count`.
pub fn bulk_chores(count: usize) -> Vec<Chore> {
    let everyday = everyday_chores();
    let due_by = date(2025, 12, 31);
    (0..count)
        .map(|i| Chore {
            id: i32::try_from(i + 1).unwrap_or(i32::MAX),
            title: everyday[i % everyday.len()].title.clone(),
            due_by,
            is_complete: false,
        })
        .collect()
}

/// What `dbo.translate_to_emoji` returns for `word`; unknown words come back unchanged.
pub fn expected_emoji(word: &str) -> &str {
    match word {
        "dog" => "🐕",
        "dishes" => "🍽️",
        "laundry" => "👕",
        "bathroom" => "🚽",
        "car" => "🛻",
        other => other,
    }
}
