//! Errors returned by registry and query operations.

use crate::coerce::CoercionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown database: {name}")]
    UnknownDatabase { name: String },

    #[error("unknown driver '{driver}' for database '{database}'")]
    UnknownDriver { database: String, driver: String },

    #[error("failed to open database '{database}': {source}")]
    Open {
        database: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to prepare statement: {source}\nSQL: {sql}")]
    Prepare {
        sql: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("statement failed: {source}\nSQL: {sql}")]
    Execute {
        sql: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "unable to map '{column}' column to a {destination} field, make sure the field is declared \
         (names match case-insensitively, underscores ignored)"
    )]
    UnmatchedColumn {
        column: String,
        destination: &'static str,
    },

    #[error("query returns {count} columns, expecting 1 for {destination}")]
    TooManyColumns {
        count: usize,
        destination: &'static str,
    },

    #[error("column '{column}': {source}\nSQL: {sql}")]
    Coercion {
        sql: String,
        column: String,
        #[source]
        source: CoercionError,
    },

    #[error("query returned {rows} rows, expecting at most one\nSQL: {sql}")]
    Cardinality { sql: String, rows: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
