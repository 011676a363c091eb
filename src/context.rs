//! The connection-per-operation data access context.

use tokio::task;
use tracing::debug;

use crate::connection::{self, DbConnection};
use crate::error::{DbError, Result};
use crate::query::SqlQuery;
use crate::value::{FromValue, Value};

/// Data access context for one SQLite database.
///
/// Holds nothing but the connection string; every operation opens its own
/// connection and releases it before returning, so a context is cheap to
/// create per unit of work and safe to share across concurrent callers.
pub struct DbContext {
    connection_string: String,
}

impl DbContext {
    /// Create a context. Fails with [`DbError::InvalidConfiguration`] if
    /// the connection string is empty or whitespace-only; no I/O happens
    /// here.
    pub fn new(connection_string: impl Into<String>) -> Result<Self> {
        let connection_string = connection_string.into();
        if connection_string.trim().is_empty() {
            return Err(DbError::InvalidConfiguration);
        }
        Ok(Self { connection_string })
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Open a new connection; the caller owns the returned handle.
    pub async fn connect(&self) -> Result<DbConnection> {
        let connection_string = self.connection_string.clone();
        run_blocking(move || connection::open(&connection_string)).await
    }

    /// Probe the database: open and immediately release a connection.
    /// Returns `false` on any failure instead of propagating it.
    pub async fn test_connection(&self) -> bool {
        self.connect().await.is_ok()
    }

    /// Execute a statement and return the affected-row count.
    ///
    /// Statements that return rows (`INSERT/UPDATE/DELETE ... RETURNING`)
    /// are stepped to completion and the returned-row count is reported.
    pub async fn execute(&self, query: SqlQuery) -> Result<usize> {
        let connection_string = self.connection_string.clone();
        run_blocking(move || {
            let conn = connection::open(&connection_string)?;
            let mut stmt = conn.prepare(&query.statement)?;
            let bindings = query.params.bindings();
            if stmt.column_count() == 0 {
                Ok(stmt.execute(&bindings[..])?)
            } else {
                let mut rows = stmt.query(&bindings[..])?;
                let mut affected = 0;
                while rows.next()?.is_some() {
                    affected += 1;
                }
                Ok(affected)
            }
        })
        .await
    }

    /// Read the first column of the first result row.
    ///
    /// Returns `None` when the statement produces no rows or the cell is
    /// SQL `NULL`; a cell that cannot be decoded as `T` fails with
    /// [`DbError::TypeMismatch`].
    pub async fn query_scalar<T>(&self, query: SqlQuery) -> Result<Option<T>>
    where
        T: FromValue + Send + 'static,
    {
        let connection_string = self.connection_string.clone();
        run_blocking(move || {
            let conn = connection::open(&connection_string)?;
            let mut stmt = conn.prepare(&query.statement)?;
            let bindings = query.params.bindings();
            let mut rows = stmt.query(&bindings[..])?;
            match rows.next()? {
                None => Ok(None),
                Some(row) => match Value::from(row.get_ref(0)?) {
                    Value::Null => Ok(None),
                    value => T::from_value(value).map(Some),
                },
            }
        })
        .await
    }

    /// Read `column_index` from every result row, in row order.
    ///
    /// Zero rows yield an empty vector. The result is fully materialized
    /// before the connection is released.
    pub async fn query_column<T>(&self, query: SqlQuery, column_index: usize) -> Result<Vec<T>>
    where
        T: FromValue + Send + 'static,
    {
        let connection_string = self.connection_string.clone();
        run_blocking(move || {
            let conn = connection::open(&connection_string)?;
            let mut stmt = conn.prepare(&query.statement)?;
            let bindings = query.params.bindings();
            let mut rows = stmt.query(&bindings[..])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                let value = Value::from(row.get_ref(column_index)?);
                results.push(T::from_value(value)?);
            }
            Ok(results)
        })
        .await
    }

    /// Delete every row of `table`, returning how many were removed.
    pub async fn truncate_table(&self, table: &str) -> Result<usize> {
        let table = validate_identifier(table)?;
        self.execute(SqlQuery::new(&format!("DELETE FROM \"{table}\" RETURNING *")))
            .await
    }

    /// Row count of `table`.
    pub async fn record_count(&self, table: &str) -> Result<i64> {
        let table = validate_identifier(table)?;
        let count = self
            .query_scalar::<i64>(SqlQuery::new(&format!("SELECT COUNT(*) FROM \"{table}\"")))
            .await?;
        Ok(count.unwrap_or(0))
    }

    /// All table names in the database, ascending.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        self.query_column(
            SqlQuery::new("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name;"),
            0,
        )
        .await
    }

    /// Whether `table` exists. The name binds as a parameter, so names
    /// that no table can have simply return `false`.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let query = SqlQuery::new("SELECT 1 FROM sqlite_master WHERE type='table' AND name = :name")
            .with_value("name", table);
        Ok(self.query_scalar::<i64>(query).await? == Some(1))
    }

    /// Version string of the underlying engine.
    pub async fn sqlite_version(&self) -> Result<String> {
        let version = self
            .query_scalar::<String>(SqlQuery::new("SELECT sqlite_version()"))
            .await?;
        Ok(version.unwrap_or_default())
    }
}

/// Manufactures [`DbContext`] instances; construct one per logical scope.
#[derive(Debug, Default, Clone)]
pub struct DbContextFactory;

impl DbContextFactory {
    pub fn new() -> Self {
        Self
    }

    /// Pure construction, no I/O; surfaces the context's connection-string
    /// validation.
    pub fn create_context(&self, connection_string: impl Into<String>) -> Result<DbContext> {
        let context = DbContext::new(connection_string)?;
        debug!(database = context.connection_string(), "created db context");
        Ok(context)
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) => Err(DbError::Runtime(err.to_string())),
    }
}

// Table names are interpolated into SQL (identifiers cannot bind as
// parameters), so they must pass a strict allow-list first.
fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_connection_strings() {
        assert!(matches!(
            DbContext::new(""),
            Err(DbError::InvalidConfiguration)
        ));
        assert!(matches!(
            DbContext::new("   \t"),
            Err(DbError::InvalidConfiguration)
        ));
    }

    #[test]
    fn factory_surfaces_the_same_validation() {
        let factory = DbContextFactory::new();
        assert!(matches!(
            factory.create_context("  "),
            Err(DbError::InvalidConfiguration)
        ));
        assert!(factory.create_context(":memory:").is_ok());
    }

    #[test]
    fn context_keeps_its_connection_string() {
        let context = DbContext::new("some.db").unwrap();
        assert_eq!(context.connection_string(), "some.db");
    }

    #[test]
    fn identifier_allow_list() {
        assert!(validate_identifier("widgets").is_ok());
        assert!(validate_identifier("_hidden2").is_ok());
        assert!(validate_identifier("1starts_with_digit").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("users; DROP TABLE users").is_err());
        assert!(validate_identifier("weird\"name").is_err());
    }
}
