//! Every helper must release its connection on every exit path; the
//! crate's live-connection gauge makes that observable.

use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;
use sqlite_context::{live_connection_count, DbContext, SqlQuery};
use tempfile::NamedTempFile;

// The gauge is process-global, so tests reading it take turns.
static GAUGE_LOCK: Mutex<()> = Mutex::new(());

fn create_temp_db() -> Result<(DbContext, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let path = temp_file.path().to_str().unwrap();
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
        INSERT INTO widgets (name) VALUES ('bolt'), ('nut'), ('gear');
        "#,
    )?;
    let context = DbContext::new(path)?;
    Ok((context, temp_file))
}

#[tokio::test]
async fn successful_operations_release_their_connections() -> Result<()> {
    let _guard = GAUGE_LOCK.lock().unwrap();
    let (context, _db) = create_temp_db()?;

    context
        .execute(SqlQuery::new("INSERT INTO widgets (name) VALUES ('cog')"))
        .await?;
    let _: Option<i64> = context
        .query_scalar(SqlQuery::new("SELECT COUNT(*) FROM widgets"))
        .await?;
    let _: Vec<String> = context
        .query_column(SqlQuery::new("SELECT name FROM widgets"), 0)
        .await?;
    context.truncate_table("widgets").await?;
    context.table_names().await?;

    assert_eq!(live_connection_count(), 0);
    Ok(())
}

#[tokio::test]
async fn failing_statements_release_their_connections() -> Result<()> {
    let _guard = GAUGE_LOCK.lock().unwrap();
    let (context, _db) = create_temp_db()?;

    assert!(context
        .execute(SqlQuery::new("DELETE FROM no_such_table"))
        .await
        .is_err());
    assert!(context
        .query_scalar::<i64>(SqlQuery::new("SELECT nonsense FROM"))
        .await
        .is_err());
    assert!(context
        .query_column::<i64>(SqlQuery::new("NOT EVEN SQL"), 0)
        .await
        .is_err());

    assert_eq!(live_connection_count(), 0);
    Ok(())
}

#[tokio::test]
async fn decode_failures_mid_read_release_their_connections() -> Result<()> {
    let _guard = GAUGE_LOCK.lock().unwrap();
    let (context, _db) = create_temp_db()?;

    // Fails on the first row, after the statement has started producing.
    assert!(context
        .query_column::<i64>(SqlQuery::new("SELECT name FROM widgets"), 0)
        .await
        .is_err());

    assert_eq!(live_connection_count(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_probes_release_their_connections() -> Result<()> {
    let _guard = GAUGE_LOCK.lock().unwrap();

    let dir = tempfile::tempdir()?;
    let unreachable = dir.path().join("missing").join("db.sqlite");
    let bad = DbContext::new(unreachable.to_str().unwrap())?;
    assert!(!bad.test_connection().await);

    assert_eq!(live_connection_count(), 0);
    Ok(())
}

#[tokio::test]
async fn a_handed_out_handle_counts_until_dropped() -> Result<()> {
    let _guard = GAUGE_LOCK.lock().unwrap();
    let (context, _db) = create_temp_db()?;

    let conn = context.connect().await?;
    assert_eq!(live_connection_count(), 1);
    drop(conn);
    assert_eq!(live_connection_count(), 0);

    Ok(())
}
