use std::fmt::Debug;
use std::future::Future;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::db::Connection;
use crate::error::{HarnessError, Result};
use crate::{exercisers, fixture};

/// Outcome of one case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub passed: bool,
    /// Observed value on success, error message on failure.
    pub detail: String,
    pub error_kind: Option<String>,
    pub elapsed_ms: u64,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub started_at: String,
    pub database: String,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| !c.passed)
    }
}

/// Run one case to completion and record how it went.
pub async fn record<F, T>(name: &str, case: F) -> CaseReport
where
    F: Future<Output = Result<T>>,
    T: Debug,
{
    let started = Instant::now();
    let outcome = case.await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(value) => {
            log::info!("{} ... ok ({} ms)", name, elapsed_ms);
            CaseReport {
                name: name.to_string(),
                passed: true,
                detail: format!("{:?}", value),
                error_kind: None,
                elapsed_ms,
            }
        }
        Err(e) => {
            log::warn!("{} ... FAILED ({} ms): {}", name, elapsed_ms, e);
            CaseReport {
                name: name.to_string(),
                passed: false,
                detail: e.to_string(),
                error_kind: Some(e.kind().to_string()),
                elapsed_ms,
            }
        }
    }
}

/// Fresh session against the chores database.
pub async fn household(config: &HarnessConfig) -> Result<Connection> {
    Connection::open(config.household()?).await
}

/// Run every case in order. A failing case is recorded and the next one still runs.
pub async fn run(config: &HarnessConfig) -> SuiteReport {
    let run_id = Uuid::new_v4();
    let started_at = chrono::Utc::now().to_rfc3339();
    log::info!("Suite run {} against database {}", run_id, config.database);

    let mut cases = Vec::new();

    cases.push(
        record("connect_to_bare_sql_server", async {
            let mut conn = Connection::open(config.bare()?).await?;
            exercisers::raw_query(&mut conn).await
        })
        .await,
    );

    cases.push(
        record("create_table", async {
            let mut conn = household(config).await?;
            fixture::setup_schema(&mut conn).await?;
            if config.install_routines {
                fixture::install_routines(&mut conn).await?;
            }
            Ok::<_, HarnessError>(())
        })
        .await,
    );

    cases.push(
        record("insert_and_query_data", async {
            let mut conn = household(config).await?;
            exercisers::insert_and_query(&mut conn).await
        })
        .await,
    );

    cases.push(
        record("execute_stored_procedure", async {
            let mut conn = household(config).await?;
            exercisers::stored_procedure(&mut conn).await
        })
        .await,
    );

    for word in ["dog", "car"] {
        cases.push(
            record(&format!("execute_function_{}", word), async {
                let mut conn = household(config).await?;
                exercisers::scalar_function(&mut conn, word).await
            })
            .await,
        );
    }

    cases.push(
        record("fake_bulk_insert", async {
            let mut conn = household(config).await?;
            exercisers::bulk_insert(&mut conn, config.bulk_rows, config.bulk_count_threshold)
                .await
        })
        .await,
    );

    let report = SuiteReport {
        run_id,
        started_at,
        database: config.database.clone(),
        cases,
    };
    log::info!(
        "Suite run {} finished: {} of {} cases passed",
        report.run_id,
        report.cases.iter().filter(|c| c.passed).count(),
        report.cases.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_success() {
        let case = record("raw", async { Ok::<_, HarnessError>(42i64) }).await;
        assert!(case.passed);
        assert_eq!(case.detail, "42");
        assert!(case.error_kind.is_none());
    }

    #[tokio::test]
    async fn test_record_failure_keeps_kind() {
        let case = record("dup", async {
            Err::<(), _>(HarnessError::from_server(2627, "Violation of PRIMARY KEY"))
        })
        .await;
        assert!(!case.passed);
        assert_eq!(case.error_kind.as_deref(), Some("constraint"));
        assert!(case.detail.contains("2627"));
    }

    #[tokio::test]
    async fn test_report_passed_and_json() {
        let ok = record("a", async { Ok::<_, HarnessError>(()) }).await;
        let bad = record("b", async {
            Err::<(), _>(HarnessError::Assertion("nope".into()))
        })
        .await;
        let report = SuiteReport {
            run_id: Uuid::new_v4(),
            started_at: chrono::Utc::now().to_rfc3339(),
            database: "Household".into(),
            cases: vec![ok, bad],
        };
        assert!(!report.passed());
        assert_eq!(report.failures().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["b"]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cases"][1]["error_kind"], "assertion");
        assert_eq!(json["database"], "Household");
    }
}
