//! Driver abstraction.
//!
//! A [`Driver`] opens connections; a [`DriverConnection`] owns the transport
//! and the native statement handles. The registry only decides *when* to open
//! and prepare, and serializes access to each connection.

use crate::value::WireValue;
use std::ops::ControlFlow;

/// Summary of an effect-only statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// Receives the rows of an open cursor.
pub trait RowVisitor {
    /// Called once, before the first row.
    fn columns(&mut self, names: &[String]) -> ControlFlow<()>;

    /// Called per row with one value per column.
    fn row(&mut self, values: Vec<WireValue>) -> ControlFlow<()>;
}

pub trait DriverConnection: Send {
    /// Prepares `sql` so later [`query`](Self::query) calls with the same text
    /// reuse the native statement.
    fn prepare(&mut self, sql: &str) -> anyhow::Result<()>;

    /// Runs a statement for its effect, without keeping a prepared handle.
    fn execute(&mut self, sql: &str, args: &[WireValue]) -> anyhow::Result<ExecResult>;

    /// Runs a previously prepared statement and feeds its rows to `visitor`.
    ///
    /// The cursor is closed before returning, including when the visitor
    /// breaks early; errors raised while fetching or closing are returned.
    fn query(
        &mut self,
        sql: &str,
        args: &[WireValue],
        visitor: &mut dyn RowVisitor,
    ) -> anyhow::Result<()>;

    /// Releases prepared statements and the connection.
    fn close(self: Box<Self>) -> anyhow::Result<()>;
}

pub trait Driver: Send + Sync {
    fn open(&self, conn_str: &str) -> anyhow::Result<Box<dyn DriverConnection>>;
}
