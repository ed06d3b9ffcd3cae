//! Parameter rendering.
//!
//! A statement is written as a sequence of [`SqlArg`]s: literal SQL text,
//! bound arguments ([`Arg`], a SQL fragment followed by a placeholder), and
//! groups of bound arguments for optional clauses. [`render`] joins them into
//! driver-specific SQL text plus the ordered argument values.

use crate::value::WireValue;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One placeholder and the value bound to it.
///
/// An `Arg` whose `sql` fragment is empty renders nothing and binds nothing,
/// which is how optional clauses are switched off.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub sql: String,
    pub value: WireValue,
}

impl Arg {
    pub fn new(sql: impl Into<String>, value: impl Into<WireValue>) -> Self {
        Self {
            sql: sql.into(),
            value: value.into(),
        }
    }

    /// Returns this argument, or a disabled one when `enabled` is false.
    pub fn when(self, enabled: bool) -> Self {
        if enabled {
            self
        } else {
            Self {
                sql: String::new(),
                value: WireValue::Null,
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.sql.is_empty()
    }
}

/// Shorthand for [`Arg::new`].
pub fn with_arg(sql: impl Into<String>, value: impl Into<WireValue>) -> Arg {
    Arg::new(sql, value)
}

/// One element of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Literal(String),
    Bound(Arg),
    Group(Vec<Arg>),
}

impl From<&str> for SqlArg {
    fn from(value: &str) -> Self {
        SqlArg::Literal(value.to_string())
    }
}

impl From<String> for SqlArg {
    fn from(value: String) -> Self {
        SqlArg::Literal(value)
    }
}

impl From<Arg> for SqlArg {
    fn from(value: Arg) -> Self {
        SqlArg::Bound(value)
    }
}

impl From<Vec<Arg>> for SqlArg {
    fn from(value: Vec<Arg>) -> Self {
        SqlArg::Group(value)
    }
}

/// Builds a `Vec<SqlArg>` from literals, [`Arg`]s and `Vec<Arg>` groups.
///
/// ```
/// use rust_sqlmap::{args, with_arg};
/// let stmt = args!["SELECT * FROM t WHERE id = ", with_arg("", 1)];
/// assert_eq!(stmt.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        ::std::vec![$($crate::SqlArg::from($arg)),*]
    };
}

/// Placeholder syntax, picked from the driver identifier unless a database
/// is registered with one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `:1 `, `:2 `, ...
    Colon,
    /// `$1 `, `$2 `, ...
    Dollar,
    /// `? `
    Question,
}

impl Dialect {
    pub fn for_driver(driver: &str) -> Self {
        match driver {
            "oracle" => Dialect::Colon,
            "postgres" | "pgx" => Dialect::Dollar,
            _ => Dialect::Question,
        }
    }

    // Trailing space keeps the placeholder from fusing with the next fragment.
    fn write_placeholder(self, out: &mut String, index: usize) {
        match self {
            Dialect::Colon => {
                let _ = write!(out, ":{index} ");
            }
            Dialect::Dollar => {
                let _ = write!(out, "${index} ");
            }
            Dialect::Question => out.push_str("? "),
        }
    }
}

/// SQL text with placeholders substituted, plus its argument values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rendered {
    pub sql: String,
    pub args: Vec<WireValue>,
}

/// Renders a statement for `dialect`.
///
/// Placeholders are numbered from 1 in left-to-right order across the whole
/// call, including inside groups; disabled arguments do not consume a number.
pub fn render(dialect: Dialect, args: &[SqlArg]) -> Rendered {
    let mut rendered = Rendered {
        sql: String::new(),
        args: Vec::with_capacity(args.len()),
    };
    for arg in args {
        match arg {
            SqlArg::Literal(sql) => rendered.sql.push_str(sql),
            SqlArg::Bound(arg) => rendered.push(dialect, arg),
            SqlArg::Group(group) => {
                for arg in group {
                    rendered.push(dialect, arg);
                }
            }
        }
    }
    rendered
}

impl Rendered {
    fn push(&mut self, dialect: Dialect, arg: &Arg) {
        if !arg.is_enabled() {
            return;
        }
        self.sql.push_str(&arg.sql);
        dialect.write_placeholder(&mut self.sql, self.args.len() + 1);
        self.args.push(arg.value.clone());
    }
}
