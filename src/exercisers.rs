//! One function per driver capability. Each runs a single linear sequence
//! (cursor, execute, fetch, check, commit) and returns what it observed;
//! an unmet expectation comes back as `HarnessError::Assertion`.

use serde::Serialize;

use crate::chores::{self, Chore};
use crate::db::{Session, SqlValue};
use crate::error::{HarnessError, Result};

macro_rules! check {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(HarnessError::Assertion(format!($($arg)+)));
        }
    };
}

const INSERT_CHORE: &str = "
insert into dbo.Chores (Id, Title, DueBy, IsComplete)
values(?, ?, ?, ?)
";

const SELECT_CHORE: &str = "select Title, DueBy, IsComplete from dbo.Chores where Id=?";

const SAVE_CHORE_BATCH: &str = "
set nocount on
declare @new_id int
exec dbo.save_chore @Title=?, @DueBy=?, @IsComplete=?, @NewId=@new_id output
select @new_id
";

const TRANSLATE: &str = "select dbo.translate_to_emoji(?)";

const COUNT_CHORES: &str = "select count(1) from dbo.Chores";

/// Result of the bulk insert case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkOutcome {
    pub submitted: usize,
    pub affected: u64,
    pub total_rows: i64,
}

/// Aggregate over `sys.all_objects`; the catalog is never empty.
pub async fn raw_query<S: Session>(session: &mut S) -> Result<i64> {
    let mut cursor = session.cursor();
    cursor
        .execute("select count(1) from sys.all_objects", &[])
        .await?;
    let rows = cursor.fetch_all();
    let count = rows
        .first()
        .and_then(|row| row.get(0))
        .and_then(SqlValue::as_i64);

    log::info!("Number of rows in sys.all_objects: {:?}", count);
    check!(
        matches!(count, Some(n) if n > 0),
        "sys.all_objects count should be positive, got {:?}",
        count
    );
    Ok(count.unwrap_or_default())
}

/// Insert the trash chore with bound parameters and read it back by id.
pub async fn insert_and_query<S: Session>(session: &mut S) -> Result<Chore> {
    let expected = chores::trash_chore();
    let mut cursor = session.cursor();

    cursor.execute(INSERT_CHORE, &expected.to_params()).await?;
    cursor
        .execute(SELECT_CHORE, &[SqlValue::Int(expected.id)])
        .await?;
    let row = cursor.fetch_one();
    cursor.commit().await?;

    let row = row.ok_or_else(|| {
        HarnessError::Assertion(format!("no row came back for Id={}", expected.id))
    })?;

    check!(
        row.get(0).and_then(SqlValue::as_str) == Some(expected.title.as_str()),
        "Title: expected {:?}, got {:?}",
        expected.title,
        row.get(0)
    );
    let due_by = row.get(1).map(ToString::to_string);
    check!(
        due_by.as_deref() == Some("2025-09-16"),
        "DueBy: expected \"2025-09-16\", got {:?}",
        due_by
    );
    check!(
        row.get(2).and_then(SqlValue::as_i64) == Some(0),
        "IsComplete: expected 0, got {:?}",
        row.get(2)
    );

    let chore = Chore::from_row(expected.id, &row)?;
    check!(chore == expected, "read back {:?}, wrote {:?}", chore, expected);
    Ok(chore)
}

/// Call `dbo.save_chore` and read its output parameter through a trailing select.
pub async fn stored_procedure<S: Session>(session: &mut S) -> Result<i64> {
    let mut cursor = session.cursor();
    cursor
        .execute(SAVE_CHORE_BATCH, &chores::lawn_chore_params())
        .await?;
    let rows = cursor.fetch_all();
    let new_id = rows
        .first()
        .and_then(|row| row.get(0))
        .cloned()
        .unwrap_or(SqlValue::Null);
    cursor.commit().await?;

    check!(!new_id.is_null(), "save_chore returned no id");
    let id = new_id.as_i64().ok_or_else(|| {
        HarnessError::Assertion(format!("save_chore id is not an integer: {:?}", new_id))
    })?;
    log::info!("save_chore assigned id {}", id);
    Ok(id)
}

/// Apply `dbo.translate_to_emoji` to `word` and compare with the known mapping.
pub async fn scalar_function<S: Session>(session: &mut S, word: &str) -> Result<String> {
    let mut cursor = session.cursor();
    cursor.execute(TRANSLATE, &[SqlValue::from(word)]).await?;

    let emoji = cursor
        .fetch_one()
        .and_then(|row| row.get(0).and_then(SqlValue::as_str).map(str::to_string));
    let expected = chores::expected_emoji(word);
    check!(
        emoji.as_deref() == Some(expected),
        "translate_to_emoji({:?}): expected {:?}, got {:?}",
        word,
        expected,
        emoji
    );
    Ok(emoji.unwrap_or_default())
}

/// Total rows in `dbo.Chores`.
pub async fn chore_count<S: Session>(session: &mut S) -> Result<i64> {
    let mut cursor = session.cursor();
    cursor.execute(COUNT_CHORES, &[]).await?;
    cursor
        .fetch_one()
        .and_then(|row| row.get(0).and_then(SqlValue::as_i64))
        .ok_or_else(|| HarnessError::Assertion("count over dbo.Chores returned nothing".to_string()))
}

/// Submit `count` generated chores in one `execute_many` call, commit, and
/// require the table to hold at least `threshold` rows afterwards.
pub async fn bulk_insert<S: Session>(
    session: &mut S,
    count: usize,
    threshold: i64,
) -> Result<BulkOutcome> {
    let rows: Vec<Vec<SqlValue>> = chores::bulk_chores(count)
        .iter()
        .map(Chore::to_params)
        .collect();

    let affected = {
        let mut cursor = session.cursor();
        let affected = cursor.execute_many(INSERT_CHORE, &rows).await?;
        cursor.commit().await?;
        affected
    };
    log::info!("Inserted {} rows.", rows.len());

    let total_rows = chore_count(session).await?;
    check!(
        total_rows >= threshold,
        "dbo.Chores holds {} rows, expected at least {}",
        total_rows,
        threshold
    );

    Ok(BulkOutcome {
        submitted: rows.len(),
        affected,
        total_rows,
    })
}
