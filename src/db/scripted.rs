//! In-memory session replaying canned results, for unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::{ResultSets, Session, SqlValue};
use crate::error::{HarnessError, Result};

#[derive(Default)]
pub struct ScriptedSession {
    responses: VecDeque<Result<ResultSets>>,
    pub executed: Vec<(String, Vec<SqlValue>)>,
    pub batches: Vec<(String, Vec<Vec<SqlValue>>)>,
    pub commits: usize,
    pub rollbacks: usize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result sets for the next `execute`.
    pub fn respond(&mut self, sets: ResultSets) {
        self.responses.push_back(Ok(sets));
    }

    /// Queue a failure for the next `execute`.
    pub fn fail(&mut self, err: HarnessError) {
        self.responses.push_back(Err(err));
    }

    pub fn statements(&self) -> Vec<&str> {
        self.executed.iter().map(|(sql, _)| sql.as_str()).collect()
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSets> {
        self.executed.push((sql.to_string(), params.to_vec()));
        self.responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64> {
        self.batches.push((sql.to_string(), rows.to_vec()));
        Ok(rows.len() as u64)
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.rollbacks += 1;
        Ok(())
    }
}
