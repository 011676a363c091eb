//! Connection-per-operation SQLite data access and table utilities.
//!
//! # Intention
//!
//! - Provide a thin, generic API for executing statements and projecting
//!   scalar/single-column results out of an SQLite database.
//! - Encapsulate SQLite-specific binding, decoding, and error handling.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - No pooling, transactions, migrations, or query building; those stay
//!   with the embedding application or the engine itself.

pub mod connection;
pub mod context;
pub mod error;
pub mod query;
pub mod value;

pub use connection::{ensure_engine_ready, live_connection_count, DbConnection};
pub use context::{DbContext, DbContextFactory};
pub use error::{DbError, Result};
pub use query::{Params, SqlQuery};
pub use value::{FromValue, Value};
