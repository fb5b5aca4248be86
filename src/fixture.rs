//! Schema setup for the chores cases.
//!
//! The table is dropped and recreated on every setup so no row from a previous
//! run survives. The two routines are installed with `CREATE OR ALTER`, which
//! must be the only statement in its batch.

use crate::db::{Session, SqlValue};
use crate::error::{HarnessError, Result};

pub const CHORES_TABLE: &str = "Chores";

const CREATE_CHORES: &str = "
drop table if exists dbo.Chores
create table dbo.Chores
(
    Id int,
    Title nvarchar(256),
    DueBy date,
    IsComplete bit
)
";

const SAVE_CHORE: &str = "
create or alter proc dbo.save_chore
        @Title nvarchar(256),
        @DueBy date,
        @IsComplete bit,
        @NewId int output
as
    begin
        select @NewId=count(1)+1 from dbo.Chores

        insert dbo.Chores(Id, Title, DueBy, IsComplete)
        values(@NewId,@Title,@DueBy,@IsComplete)
    end
";

const TRANSLATE_TO_EMOJI: &str = "
create or alter function dbo.translate_to_emoji(@word nvarchar(32))
returns nvarchar(32)
as
    begin
        if @word = 'dog'
            return N'🐕'

        if @word = 'dishes'
            return N'🍽️'

        if @word = 'laundry'
            return N'👕'

        if @word = 'bathroom'
            return N'🚽'

        if @word = 'car'
            return N'🛻'

        return @word
    end
";

/// Count the user tables called `name`.
pub async fn table_count<S: Session>(session: &mut S, name: &str) -> Result<i64> {
    let mut cursor = session.cursor();
    cursor
        .execute(
            "select count(1) from sys.tables where name=?",
            &[SqlValue::from(name)],
        )
        .await?;
    cursor
        .fetch_one()
        .and_then(|row| row.get(0).and_then(SqlValue::as_i64))
        .ok_or_else(|| HarnessError::Assertion("catalog count returned no value".to_string()))
}

/// Drop and recreate `dbo.Chores`, then check the catalog holds exactly one such table.
pub async fn setup_schema<S: Session>(session: &mut S) -> Result<()> {
    {
        let mut cursor = session.cursor();
        cursor.execute(CREATE_CHORES, &[]).await?;
        cursor.commit().await?;
    }

    let found = table_count(session, CHORES_TABLE).await?;
    if found != 1 {
        return Err(HarnessError::Assertion(format!(
            "expected exactly one {} table, found {}",
            CHORES_TABLE, found
        )));
    }

    log::info!("Recreated dbo.{}", CHORES_TABLE);
    Ok(())
}

/// Create or refresh `dbo.save_chore` and `dbo.translate_to_emoji`.
pub async fn install_routines<S: Session>(session: &mut S) -> Result<()> {
    let mut cursor = session.cursor();
    for routine in [SAVE_CHORE, TRANSLATE_TO_EMOJI] {
        cursor.execute(routine, &[]).await?;
    }
    cursor.commit().await?;
    log::info!("Installed dbo.save_chore and dbo.translate_to_emoji");
    Ok(())
}
