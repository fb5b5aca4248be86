use std::collections::VecDeque;

use super::{Row, Session, SqlValue};
use crate::error::Result;

/// Executes statements on a borrowed session and buffers their results.
pub struct Cursor<'s, S: Session> {
    session: &'s mut S,
    statement: Option<String>,
    current: VecDeque<Row>,
    pending: VecDeque<Vec<Row>>,
}

impl<'s, S: Session> Cursor<'s, S> {
    pub fn new(session: &'s mut S) -> Self {
        Self {
            session,
            statement: None,
            current: VecDeque::new(),
            pending: VecDeque::new(),
        }
    }

    /// Run a statement; any previous results are discarded.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<()> {
        self.reset(sql);
        let mut sets: VecDeque<Vec<Row>> = self.session.execute(sql, params).await?.into();
        if let Some(first) = sets.pop_front() {
            self.current = first.into();
        }
        self.pending = sets;
        Ok(())
    }

    /// Run a statement once per row of parameters.
    pub async fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64> {
        self.reset(sql);
        self.session.execute_many(sql, rows).await
    }

    pub fn fetch_one(&mut self) -> Option<Row> {
        self.current.pop_front()
    }

    /// Every row left in the current result set.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.current.drain(..).collect()
    }

    /// Advance to the next result set of a batch. Returns false when none is left.
    pub fn next_set(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(set) => {
                self.current = set.into();
                true
            }
            None => {
                self.current.clear();
                false
            }
        }
    }

    /// Text of the last statement run through this cursor.
    pub fn statement(&self) -> Option<&str> {
        self.statement.as_deref()
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.session.commit().await
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.session.rollback().await
    }

    fn reset(&mut self, sql: &str) {
        self.statement = Some(sql.to_string());
        self.current.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::scripted::ScriptedSession;

    fn row(v: i32) -> Row {
        Row::from_values(vec![SqlValue::Int(v)])
    }

    #[tokio::test]
    async fn test_fetch_one_then_all() {
        let mut session = ScriptedSession::new();
        session.respond(vec![vec![row(1), row(2), row(3)]]);

        let mut cursor = session.cursor();
        cursor.execute("select Id from dbo.Chores", &[]).await.unwrap();
        assert_eq!(cursor.fetch_one(), Some(row(1)));
        assert_eq!(cursor.fetch_all(), vec![row(2), row(3)]);
        assert_eq!(cursor.fetch_one(), None);
    }

    #[tokio::test]
    async fn test_next_set_walks_batch_results() {
        let mut session = ScriptedSession::new();
        session.respond(vec![vec![row(1)], vec![row(2)]]);

        let mut cursor = session.cursor();
        cursor.execute("select 1; select 2", &[]).await.unwrap();
        assert_eq!(cursor.fetch_all(), vec![row(1)]);
        assert!(cursor.next_set());
        assert_eq!(cursor.fetch_one(), Some(row(2)));
        assert!(!cursor.next_set());
        assert_eq!(cursor.fetch_one(), None);
    }

    #[tokio::test]
    async fn test_execute_discards_previous_results() {
        let mut session = ScriptedSession::new();
        session.respond(vec![vec![row(1), row(2)]]);
        session.respond(vec![]);

        let mut cursor = session.cursor();
        cursor.execute("select Id from dbo.Chores", &[]).await.unwrap();
        cursor
            .execute("delete from dbo.Chores where Id=?", &[SqlValue::Int(1)])
            .await
            .unwrap();
        assert_eq!(cursor.fetch_one(), None);
        assert_eq!(cursor.statement(), Some("delete from dbo.Chores where Id=?"));
    }

    #[tokio::test]
    async fn test_commit_goes_to_session() {
        let mut session = ScriptedSession::new();
        {
            let mut cursor = session.cursor();
            cursor.commit().await.unwrap();
            cursor.rollback().await.unwrap();
        }
        assert_eq!(session.commits, 1);
        assert_eq!(session.rollbacks, 1);
    }
}
