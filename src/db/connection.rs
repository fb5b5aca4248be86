use std::fmt;
use std::io;

use async_trait::async_trait;
use tiberius::{Client, QueryStream, SqlBrowser, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::placeholder;
use super::{ConnectionString, ResultSets, Row, Session, SqlValue};
use crate::error::{HarnessError, Result};

/// SQL Server caps an RPC at 2100 parameters; stay clear of it.
const MAX_BATCH_PARAMS: usize = 2000;

/// Statements per round trip in `execute_many`.
const MAX_BATCH_ROWS: usize = 1000;

/// One round trip of `execute_many`: the statement repeated per row with
/// renumbered placeholders, and the rows' values flattened in order.
#[derive(Debug)]
pub(crate) struct Batch<'a> {
    pub sql: String,
    pub params: Vec<&'a SqlValue>,
}

/// Rows that fit in one batch for a statement with `per_row` placeholders.
fn rows_per_batch(per_row: usize) -> usize {
    (MAX_BATCH_PARAMS / per_row.max(1)).clamp(1, MAX_BATCH_ROWS)
}

/// Split `rows` into batches. Every row must bind exactly the statement's placeholders.
pub(crate) fn plan_batches<'a>(sql: &str, rows: &'a [Vec<SqlValue>]) -> Result<Vec<Batch<'a>>> {
    let per_row = placeholder::translate(sql).placeholders;
    if let Some(bad) = rows.iter().find(|r| r.len() != per_row) {
        return Err(HarnessError::ParameterCount {
            expected: per_row,
            actual: bad.len(),
        });
    }

    let batches = rows
        .chunks(rows_per_batch(per_row))
        .map(|chunk| {
            let mut batch = Batch {
                sql: String::new(),
                params: Vec::with_capacity(chunk.len() * per_row),
            };
            for (i, row) in chunk.iter().enumerate() {
                batch.sql.push_str(&placeholder::translate_from(sql, i * per_row).sql);
                batch.sql.push('\n');
                batch.params.extend(row.iter());
            }
            batch
        })
        .collect();
    Ok(batches)
}

/// Socket trouble while opening a session is a connection failure, not plain I/O.
fn socket_error(action: &str, peer: &dyn fmt::Display, err: io::Error) -> HarnessError {
    HarnessError::Connection(format!("Failed to {} {}: {}", action, peer, err))
}

/// A live session to one database.
pub struct Connection {
    client: Client<Compat<TcpStream>>,
    target: ConnectionString,
    autocommit: bool,
}

impl Connection {
    /// Parse `conn_str` and open a session. One attempt, no retry.
    pub async fn connect(conn_str: &str) -> Result<Self> {
        Self::open(conn_str.parse()?).await
    }

    pub async fn open(target: ConnectionString) -> Result<Self> {
        let config = target.to_tiberius_config()?;
        log::debug!("Connecting to {}", target.redacted());

        let tcp = if target.server.instance.is_some() {
            TcpStream::connect_named(&config).await?
        } else {
            let addr = config.get_addr();
            TcpStream::connect(addr.as_str())
                .await
                .map_err(|e| socket_error("connect to SQL Server at", &addr, e))?
        };
        tcp.set_nodelay(true)
            .map_err(|e| socket_error("configure socket to", &target.server, e))?;

        let client = Client::connect(config, tcp.compat_write()).await?;

        // A fresh login runs with IMPLICIT_TRANSACTIONS OFF.
        let wants_autocommit = target.autocommit;
        let mut conn = Self {
            client,
            target,
            autocommit: true,
        };
        conn.set_autocommit(wants_autocommit).await?;

        log::info!(
            "Connected to {} (database {})",
            conn.target.server,
            conn.target.database.as_deref().unwrap_or("<default>")
        );
        Ok(conn)
    }

    pub fn target(&self) -> &ConnectionString {
        &self.target
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    /// Switch between autocommit and implicit transactions. Pending work is committed first.
    pub async fn set_autocommit(&mut self, on: bool) -> Result<()> {
        if on == self.autocommit {
            return Ok(());
        }
        if on {
            self.commit().await?;
            self.run_batch("SET IMPLICIT_TRANSACTIONS OFF").await?;
        } else {
            self.run_batch("SET IMPLICIT_TRANSACTIONS ON").await?;
        }
        self.autocommit = on;
        Ok(())
    }

    /// End the session. Uncommitted work is rolled back by the server.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }

    async fn run_batch(&mut self, sql: &str) -> Result<()> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn collect(stream: QueryStream<'_>) -> Result<ResultSets> {
        let sets = stream.into_results().await?;
        sets.into_iter()
            .map(|set| set.into_iter().map(Row::from_tiberius).collect::<Result<Vec<Row>>>())
            .collect()
    }
}

#[async_trait]
impl Session for Connection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSets> {
        let translated = placeholder::translate(sql);
        if translated.placeholders != params.len() {
            return Err(HarnessError::ParameterCount {
                expected: translated.placeholders,
                actual: params.len(),
            });
        }

        log::debug!("execute ({} params): {}", params.len(), sql.trim());

        if params.is_empty() {
            let stream = self.client.simple_query(sql).await?;
            return Self::collect(stream).await;
        }

        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let stream = self.client.query(translated.sql, &refs).await?;
        Self::collect(stream).await
    }

    async fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64> {
        let batches = plan_batches(sql, rows)?;
        let mut total = 0u64;

        for batch in &batches {
            let refs: Vec<&dyn ToSql> = batch.params.iter().map(|v| *v as &dyn ToSql).collect();
            let result = self.client.execute(batch.sql.as_str(), &refs).await?;
            total += result.rows_affected().iter().sum::<u64>();
        }

        log::debug!(
            "execute_many: {} rows in {} batches, {} affected",
            rows.len(),
            batches.len(),
            total
        );
        Ok(total)
    }

    async fn commit(&mut self) -> Result<()> {
        self.run_batch("IF @@TRANCOUNT > 0 COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.run_batch("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }
}
