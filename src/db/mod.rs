pub mod connection;
pub mod connection_string;
pub mod cursor;
pub mod placeholder;
pub mod value;

#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;

use crate::error::Result;

pub use connection::Connection;
pub use connection_string::ConnectionString;
pub use cursor::Cursor;
pub use value::{Row, SqlValue};

/// Every result set a statement produced, in order.
pub type ResultSets = Vec<Vec<Row>>;

/// The operations a cursor needs from a database session.
#[async_trait]
pub trait Session: Send {
    /// Run one statement (or batch) with positional `?` parameters.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSets>;

    /// Run one statement once per parameter row. Returns the rows affected.
    async fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64>;

    /// Commit the open transaction, if any.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction, if any.
    async fn rollback(&mut self) -> Result<()>;

    /// Open a cursor over this session.
    fn cursor(&mut self) -> Cursor<'_, Self>
    where
        Self: Sized,
    {
        Cursor::new(self)
    }
}
