//! Integration tests against a live SQL Server.
//!
//! Prerequisites:
//!   - SQL Server reachable as configured by `CHORES_*` variables (default
//!     `localhost\sql2025ed` with integrated security, database `Household`)
//!   - the login may drop/create tables and create procedures in that database
//!
//! Run with `CHORES_LIVE_TESTS=1 cargo test --test live_db_test`. Without it
//! every test prints a notice and returns.

use household_lib::chores;
use household_lib::db::{Connection, Session, SqlValue};
use household_lib::{exercisers, fixture, suite, HarnessConfig, HarnessError};
use serial_test::serial;

// ─── helpers ───────────────────────────────────────────────────────────────

fn live_config() -> Option<HarnessConfig> {
    let _ = env_logger::builder().is_test(true).try_init();
    if std::env::var("CHORES_LIVE_TESTS").ok().as_deref() != Some("1") {
        eprintln!("Skipping live test: set CHORES_LIVE_TESTS=1 and CHORES_* connection settings");
        return None;
    }
    Some(HarnessConfig::from_env().expect("harness config"))
}

async fn household(config: &HarnessConfig) -> Connection {
    suite::household(config)
        .await
        .expect("connect to household database")
}

/// Fresh `dbo.Chores` plus the routines, on a new session.
async fn prepared(config: &HarnessConfig) -> Connection {
    let mut conn = household(config).await;
    fixture::setup_schema(&mut conn).await.expect("setup schema");
    if config.install_routines {
        fixture::install_routines(&mut conn)
            .await
            .expect("install routines");
    }
    conn
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
#[serial]
async fn connect_to_bare_sql_server() {
    let Some(config) = live_config() else { return };
    let mut conn = Connection::open(config.bare().unwrap())
        .await
        .expect("connect to bare server");
    assert_eq!(
        conn.target().database.as_deref(),
        Some(config.bare_database.as_str())
    );

    let count = exercisers::raw_query(&mut conn).await.expect("raw query");
    println!("Number of rows in sys.all_objects: {}", count);
    assert!(count > 0);

    conn.close().await.expect("close");
}

#[tokio::test]
#[serial]
async fn connect_wrong_database() {
    let Some(config) = live_config() else { return };
    let target = config.connection_string_for("NonExistentDb_XYZ_999").unwrap();

    let result = Connection::open(target).await;
    assert!(
        matches!(result, Err(HarnessError::Connection(_))),
        "opening a missing database should be a connection error"
    );
}

#[tokio::test]
#[serial]
async fn connection_starts_in_implicit_transactions() {
    let Some(config) = live_config() else { return };
    let mut conn = household(&config).await;
    assert!(!conn.autocommit());

    let mut cursor = conn.cursor();
    cursor
        .execute("select cast(@@OPTIONS & 2 as int)", &[])
        .await
        .unwrap();
    let row = cursor.fetch_one().expect("options row");
    assert_eq!(row[0].as_i64(), Some(2));
}

// ═══════════════════════════════════════════════════════════════════════════
//  FIXTURE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
#[serial]
async fn create_table() {
    let Some(config) = live_config() else { return };
    let mut conn = household(&config).await;

    fixture::setup_schema(&mut conn).await.expect("first setup");
    fixture::setup_schema(&mut conn).await.expect("second setup");

    let tables = fixture::table_count(&mut conn, fixture::CHORES_TABLE)
        .await
        .unwrap();
    assert_eq!(tables, 1);
    assert_eq!(exercisers::chore_count(&mut conn).await.unwrap(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
#[serial]
async fn insert_and_query_data() {
    let Some(config) = live_config() else { return };
    let mut conn = prepared(&config).await;

    let chore = exercisers::insert_and_query(&mut conn)
        .await
        .expect("insert and query");
    assert_eq!(chore, chores::trash_chore());
    assert_eq!(chore.due_by.to_string(), "2025-09-16");
}

#[tokio::test]
#[serial]
async fn execute_stored_procedure() {
    let Some(config) = live_config() else { return };
    let mut conn = prepared(&config).await;

    let id = exercisers::stored_procedure(&mut conn)
        .await
        .expect("stored procedure");
    assert!(id >= 1, "new id should be at least 1, got {}", id);
}

#[tokio::test]
#[serial]
async fn execute_function() {
    let Some(config) = live_config() else { return };
    let mut conn = prepared(&config).await;

    for word in ["dog", "dishes", "laundry", "bathroom", "car", "vacuum"] {
        let got = exercisers::scalar_function(&mut conn, word)
            .await
            .unwrap_or_else(|e| panic!("translate_to_emoji({}) failed: {}", word, e));
        assert_eq!(got, chores::expected_emoji(word));
    }
}

#[tokio::test]
#[serial]
async fn fake_bulk_insert() {
    let Some(config) = live_config() else { return };
    let mut conn = prepared(&config).await;

    let outcome =
        exercisers::bulk_insert(&mut conn, config.bulk_rows, config.bulk_count_threshold)
            .await
            .expect("bulk insert");
    println!("Inserted {} rows.", outcome.submitted);
    assert_eq!(outcome.submitted, config.bulk_rows);
    assert_eq!(outcome.total_rows, config.bulk_rows as i64);
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRANSACTIONS AND ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
#[serial]
async fn rollback_discards_uncommitted_insert() {
    let Some(config) = live_config() else { return };
    let mut conn = prepared(&config).await;

    {
        let mut cursor = conn.cursor();
        cursor
            .execute(
                "insert into dbo.Chores (Id, Title, DueBy, IsComplete) values(?, ?, ?, ?)",
                &chores::trash_chore().to_params(),
            )
            .await
            .unwrap();
        cursor.rollback().await.unwrap();
    }

    assert_eq!(exercisers::chore_count(&mut conn).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn uncommitted_insert_lost_on_close() {
    let Some(config) = live_config() else { return };
    let mut conn = prepared(&config).await;
    conn.execute(
        "insert into dbo.Chores (Id, Title, DueBy, IsComplete) values(?, ?, ?, ?)",
        &chores::trash_chore().to_params(),
    )
    .await
    .unwrap();
    conn.close().await.unwrap();

    let mut other = household(&config).await;
    assert_eq!(exercisers::chore_count(&mut other).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn syntax_error_is_classified() {
    let Some(config) = live_config() else { return };
    let mut conn = household(&config).await;

    let err = conn.execute("selec 1 frm nowhere", &[]).await.unwrap_err();
    assert!(matches!(err, HarnessError::Syntax { .. }), "got {:?}", err);
}

#[tokio::test]
#[serial]
async fn duplicate_key_is_constraint_violation() {
    let Some(config) = live_config() else { return };
    let mut conn = household(&config).await;

    conn.execute("create table #dup (Id int primary key)", &[])
        .await
        .unwrap();
    conn.execute("insert into #dup (Id) values(?)", &[SqlValue::Int(1)])
        .await
        .unwrap();
    let err = conn
        .execute("insert into #dup (Id) values(?)", &[SqlValue::Int(1)])
        .await
        .unwrap_err();
    assert!(
        matches!(err, HarnessError::ConstraintViolation { code: 2627, .. }),
        "got {:?}",
        err
    );
    conn.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn placeholder_mismatch_never_reaches_server() {
    let Some(config) = live_config() else { return };
    let mut conn = household(&config).await;

    let err = conn
        .execute("select ?, ?", &[SqlValue::Int(1)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::ParameterCount {
            expected: 2,
            actual: 1
        }
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
//  END TO END
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
#[serial]
async fn end_to_end_scenario() {
    let Some(config) = live_config() else { return };
    let mut conn = prepared(&config).await;

    let chore = exercisers::insert_and_query(&mut conn).await.unwrap();
    assert_eq!(chore.title, "Take out the trash");

    let id = exercisers::stored_procedure(&mut conn).await.unwrap();
    assert_eq!(id, 2, "save_chore numbers rows after the existing one");

    let emoji = exercisers::scalar_function(&mut conn, "car").await.unwrap();
    assert_eq!(emoji, "🛻");

    let outcome =
        exercisers::bulk_insert(&mut conn, config.bulk_rows, config.bulk_count_threshold)
            .await
            .unwrap();
    assert_eq!(outcome.total_rows, config.bulk_rows as i64 + 2);
}

#[tokio::test]
#[serial]
async fn suite_run_reports_every_case() {
    let Some(config) = live_config() else { return };

    let report = suite::run(&config).await;
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    assert_eq!(report.cases.len(), 7);
    let failed: Vec<_> = report.failures().map(|c| (&c.name, &c.detail)).collect();
    assert!(failed.is_empty(), "failed cases: {:?}", failed);
}
