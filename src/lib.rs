//! Parameterized SQL against named databases, with rows mapped straight into
//! typed records.
//!
//! # Intention
//!
//! - Register databases by name; open them on first use.
//! - Write statements as literal SQL interleaved with bound arguments and let
//!   the driver's placeholder syntax be filled in.
//! - Cache one prepared statement per distinct SQL text per connection.
//! - Map result columns onto record fields by name, absorbing the differences
//!   in how drivers return the same value.
//!
//! # Architectural Boundaries
//!
//! - No query builder, migrations, pooling or cross-statement transactions.
//! - The driver owns connection lifecycle and transport.
//!
//! ```
//! use rust_sqlmap::{args, record, with_arg, Registry};
//!
//! record! {
//!     #[derive(Debug, Clone, Default, PartialEq)]
//!     struct Row {
//!         id: i64,
//!         name: String,
//!     }
//! }
//!
//! let registry = Registry::new();
//! registry.register("main", "sqlite", ":memory:");
//! registry.exec("main", &args!["CREATE TABLE t (id INT, name TEXT)"])?;
//! registry.exec(
//!     "main",
//!     &args!["INSERT INTO t VALUES (", with_arg(" ", 1), ", ", with_arg(" ", "alice"), ")"],
//! )?;
//! let rows: Vec<Row> = registry.query_all("main", &args!["SELECT * FROM t"])?;
//! assert_eq!(rows, [Row { id: 1, name: "alice".into() }]);
//! # Ok::<(), rust_sqlmap::Error>(())
//! ```

pub mod binder;
pub mod coerce;
pub mod config;
pub mod driver;
pub mod error;
pub mod params;
pub mod query;
pub mod record;
pub mod registry;
pub mod sqlite;
pub mod value;

pub use binder::{bind, normalize_name, ColumnBinding};
pub use coerce::{coerce, CoercionError};
pub use config::{DatabaseConfig, QueryConfig};
pub use driver::{Driver, DriverConnection, ExecResult, RowVisitor};
pub use error::{Error, Result};
pub use params::{render, with_arg, Arg, Dialect, Rendered, SqlArg};
pub use record::{Accessor, Column, Field, Record, Shape, Slot};
pub use registry::{NamedDatabase, Registry};
pub use sqlite::SqliteDriver;
pub use value::WireValue;
