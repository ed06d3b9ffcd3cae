//! Statement execution against named databases.

use crate::binder::{bind, ColumnBinding};
use crate::coerce::coerce;
use crate::driver::{ExecResult, RowVisitor};
use crate::error::{Error, Result};
use crate::params::{render, Rendered, SqlArg};
use crate::record::{Column, Record};
use crate::registry::{Bindings, DbState, Registry};
use crate::value::WireValue;
use std::any::TypeId;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const MAX_LOGGED_ARG: usize = 100;

/// Argument values as they appear in debug traces; long values keep their
/// first 90 and last 10 characters.
pub fn args_to_log(args: &[WireValue]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let text = arg.to_string();
            let len = text.chars().count();
            if len <= MAX_LOGGED_ARG {
                return text;
            }
            let head: String = text.chars().take(90).collect();
            let tail: String = text.chars().skip(len - 10).collect();
            format!("{head}...{tail}")
        })
        .collect()
}

impl Registry {
    /// Runs a statement for its effect. The statement is not cached.
    pub fn exec(&self, db_name: &str, args: &[SqlArg]) -> Result<ExecResult> {
        let started = Instant::now();
        self.with_state(db_name, |db, state| {
            let Rendered { sql, args } = render(db.dialect(), args);
            let conn = self.connect(db, &mut state.conn)?;
            let result = conn.execute(&sql, &args).map_err(|source| Error::Execute {
                sql: sql.clone(),
                source,
            })?;
            if self.debug() {
                debug!(
                    sql = %sql,
                    args = ?args_to_log(&args),
                    elapsed = ?started.elapsed(),
                    rows_affected = result.rows_affected,
                    "running SQL"
                );
            }
            Ok(result)
        })
    }

    /// Best-effort [`exec`](Self::exec): failures are logged and an empty
    /// result is returned.
    pub fn try_exec(&self, db_name: &str, args: &[SqlArg]) -> ExecResult {
        self.exec(db_name, args).unwrap_or_else(|e| {
            warn!(database = db_name, error = %e, "ignoring failed statement");
            ExecResult::default()
        })
    }

    /// Runs a query and maps every row into a `T`.
    pub fn query_all<T: Record>(&self, db_name: &str, args: &[SqlArg]) -> Result<Vec<T>> {
        self.fetch(db_name, args).map(|(_, rows)| rows)
    }

    /// Runs a query expected to match at most one row. No rows yields
    /// `T::default()`; more than one is an [`Error::Cardinality`].
    pub fn query_one<T: Record>(&self, db_name: &str, args: &[SqlArg]) -> Result<T> {
        let (sql, mut rows) = self.fetch::<T>(db_name, args)?;
        match rows.len() {
            0 => Ok(T::default()),
            1 => Ok(rows.swap_remove(0)),
            n => Err(Error::Cardinality { sql, rows: n }),
        }
    }

    /// [`query_one`](Self::query_one) for a single-column scalar result.
    pub fn query_scalar<T: Record + Column>(&self, db_name: &str, args: &[SqlArg]) -> Result<T> {
        self.query_one(db_name, args)
    }

    fn fetch<T: Record>(&self, db_name: &str, args: &[SqlArg]) -> Result<(String, Vec<T>)> {
        let started = Instant::now();
        self.with_state(db_name, |db, state| {
            let Rendered { sql, args } = render(db.dialect(), args);
            let DbState {
                conn,
                statements,
                bindings,
                ..
            } = state;
            let conn = self.connect(db, conn)?;
            self.prepare_on(db, conn, statements, &sql)?;

            let mut reader = RowReader::<T>::new(&sql, bindings);
            let fetched = conn.query(&sql, &args, &mut reader);
            let RowReader { rows, error, .. } = reader;
            if let Some(e) = error {
                return Err(e);
            }
            fetched.map_err(|source| Error::Execute {
                sql: sql.clone(),
                source,
            })?;
            let rows = rows.into_vec();
            if self.debug() {
                debug!(
                    sql = %sql,
                    args = ?args_to_log(&args),
                    elapsed = ?started.elapsed(),
                    rows = rows.len(),
                    "running query"
                );
            }
            Ok((sql, rows))
        })
    }
}

/// Result rows, grown 20x on the first overflow and 2x after that.
struct RowBuffer<T> {
    rows: Vec<T>,
    growth: usize,
}

impl<T> RowBuffer<T> {
    const INITIAL_CAPACITY: usize = 10;
    const FIRST_GROWTH: usize = 20;

    fn new() -> Self {
        Self {
            rows: Vec::with_capacity(Self::INITIAL_CAPACITY),
            growth: Self::FIRST_GROWTH,
        }
    }

    fn push(&mut self, row: T) {
        if self.rows.len() == self.rows.capacity() {
            let target = self.rows.len() * self.growth;
            self.rows.reserve_exact(target - self.rows.len());
            self.growth = 2;
        }
        self.rows.push(row);
    }

    fn into_vec(self) -> Vec<T> {
        self.rows
    }
}

/// Maps driver rows into `T` through a cached [`ColumnBinding`].
struct RowReader<'a, T: Record> {
    sql: &'a str,
    bindings: &'a mut Bindings,
    binding: Option<Arc<ColumnBinding<T>>>,
    scratch: T,
    rows: RowBuffer<T>,
    error: Option<Error>,
}

impl<'a, T: Record> RowReader<'a, T> {
    fn new(sql: &'a str, bindings: &'a mut Bindings) -> Self {
        Self {
            sql,
            bindings,
            binding: None,
            scratch: T::default(),
            rows: RowBuffer::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: Error) -> ControlFlow<()> {
        self.error = Some(error);
        ControlFlow::Break(())
    }
}

impl<T: Record> RowVisitor for RowReader<'_, T> {
    fn columns(&mut self, names: &[String]) -> ControlFlow<()> {
        let key = (TypeId::of::<T>(), names.to_vec());
        let cached = self
            .bindings
            .get(&key)
            .and_then(|b| b.downcast_ref::<Arc<ColumnBinding<T>>>())
            .cloned();
        let binding = match cached {
            Some(binding) => binding,
            None => match bind::<T>(names) {
                Ok(binding) => {
                    let binding = Arc::new(binding);
                    self.bindings.insert(key, Box::new(Arc::clone(&binding)));
                    binding
                }
                Err(e) => return self.fail(e),
            },
        };
        self.binding = Some(binding);
        ControlFlow::Continue(())
    }

    fn row(&mut self, values: Vec<WireValue>) -> ControlFlow<()> {
        let Some(binding) = self.binding.clone() else {
            return ControlFlow::Break(());
        };
        for ((value, target), column) in values
            .into_iter()
            .zip(binding.targets())
            .zip(binding.columns())
        {
            if let Err(source) = coerce(value, target.slot(&mut self.scratch)) {
                return self.fail(Error::Coercion {
                    sql: self.sql.to_string(),
                    column: column.clone(),
                    source,
                });
            }
        }
        self.rows.push(self.scratch.clone());
        ControlFlow::Continue(())
    }
}
