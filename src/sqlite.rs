//! Built-in SQLite driver on top of rusqlite.

use crate::driver::{Driver, DriverConnection, ExecResult, RowVisitor};
use crate::value::WireValue;
use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::ops::ControlFlow;

/// Connection string that opens a private in-memory database.
pub const MEMORY: &str = ":memory:";

// rusqlite's default statement cache size.
const INITIAL_CACHE_CAPACITY: usize = 16;

/// Opens SQLite databases. The connection string is a file path, a `file:`
/// URI, or [`MEMORY`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn open(&self, conn_str: &str) -> anyhow::Result<Box<dyn DriverConnection>> {
        let conn = if conn_str == MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(conn_str)?
        };
        conn.set_prepared_statement_cache_capacity(INITIAL_CACHE_CAPACITY);
        Ok(Box::new(SqliteConnection {
            conn,
            prepared: 0,
            capacity: INITIAL_CACHE_CAPACITY,
        }))
    }
}

/// Prepared statements live in rusqlite's statement cache, which is grown
/// ahead of the number of prepared texts so none is ever evicted.
pub struct SqliteConnection {
    conn: Connection,
    prepared: usize,
    capacity: usize,
}

impl DriverConnection for SqliteConnection {
    fn prepare(&mut self, sql: &str) -> anyhow::Result<()> {
        if self.prepared >= self.capacity {
            self.capacity *= 2;
            self.conn
                .set_prepared_statement_cache_capacity(self.capacity);
        }
        self.conn.prepare_cached(sql)?;
        self.prepared += 1;
        Ok(())
    }

    fn execute(&mut self, sql: &str, args: &[WireValue]) -> anyhow::Result<ExecResult> {
        let changed = self.conn.execute(sql, params_from_iter(args.iter()))?;
        Ok(ExecResult {
            rows_affected: changed as u64,
            last_insert_id: Some(self.conn.last_insert_rowid()),
        })
    }

    fn query(
        &mut self,
        sql: &str,
        args: &[WireValue],
        visitor: &mut dyn RowVisitor,
    ) -> anyhow::Result<()> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let affinities: Vec<Affinity> = stmt
            .columns()
            .iter()
            .map(|column| Affinity::from_decl_type(column.decl_type()))
            .collect();
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        if visitor.columns(&columns).is_break() {
            return Ok(());
        }
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, affinity) in affinities.iter().enumerate() {
                values.push(to_wire(row.get_ref(i)?, *affinity));
            }
            if let ControlFlow::Break(()) = visitor.row(values) {
                break;
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.conn.flush_prepared_statement_cache();
        self.conn
            .close()
            .map_err(|(_, e)| anyhow!("closing sqlite connection: {e}"))
    }
}

/// Wire shape implied by a column's declared type. SQLite has no boolean or
/// time storage class, so BOOLEAN and DATE/DATETIME/TIMESTAMP columns are
/// recognised by declaration only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Plain,
    Boolean,
    Time,
}

impl Affinity {
    fn from_decl_type(decl_type: Option<&str>) -> Self {
        let Some(decl_type) = decl_type else {
            return Affinity::Plain;
        };
        let base = decl_type.split('(').next().unwrap_or_default().trim();
        match base.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Affinity::Boolean,
            "date" | "datetime" | "timestamp" => Affinity::Time,
            _ => Affinity::Plain,
        }
    }
}

// Besides RFC 3339, which is how timestamps are bound.
const TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

fn to_wire(value: ValueRef<'_>, affinity: Affinity) -> WireValue {
    match value {
        ValueRef::Null => WireValue::Null,
        ValueRef::Integer(i) => match affinity {
            Affinity::Boolean => WireValue::Bool(i != 0),
            Affinity::Time => DateTime::from_timestamp(i, 0)
                .map_or(WireValue::Int(i), WireValue::Timestamp),
            Affinity::Plain => WireValue::Int(i),
        },
        ValueRef::Real(f) => WireValue::Float(f),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(s) => match affinity {
                Affinity::Time => parse_time(s)
                    .map_or_else(|| WireValue::Text(s.to_string()), WireValue::Timestamp),
                _ => WireValue::Text(s.to_string()),
            },
            Err(_) => WireValue::Bytes(t.to_vec()),
        },
        ValueRef::Blob(b) => WireValue::Bytes(b.to_vec()),
    }
}

impl ToSql for WireValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            WireValue::Null => ToSqlOutput::Owned(Value::Null),
            WireValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            WireValue::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            WireValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            WireValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            WireValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            WireValue::Timestamp(t) => ToSqlOutput::Owned(Value::Text(t.to_rfc3339())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect {
        columns: Vec<String>,
        rows: Vec<Vec<WireValue>>,
        limit: usize,
    }

    impl RowVisitor for Collect {
        fn columns(&mut self, names: &[String]) -> ControlFlow<()> {
            self.columns = names.to_vec();
            ControlFlow::Continue(())
        }

        fn row(&mut self, values: Vec<WireValue>) -> ControlFlow<()> {
            self.rows.push(values);
            if self.rows.len() >= self.limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    fn collect(limit: usize) -> Collect {
        Collect {
            columns: Vec::new(),
            rows: Vec::new(),
            limit,
        }
    }

    #[test]
    fn test_sqlite_cells_map_to_wire_values() -> anyhow::Result<()> {
        let mut conn = SqliteDriver.open(MEMORY)?;
        let sql = "SELECT NULL AS a, 1 AS b, 2.5 AS c, 'x' AS d, X'0102' AS e, ? AS f";
        conn.prepare(sql)?;
        let mut rows = collect(usize::MAX);
        conn.query(sql, &[WireValue::Bool(true)], &mut rows)?;
        assert_eq!(rows.columns, ["a", "b", "c", "d", "e", "f"]);
        assert_eq!(
            rows.rows,
            vec![vec![
                WireValue::Null,
                WireValue::Int(1),
                WireValue::Float(2.5),
                WireValue::Text("x".into()),
                WireValue::Bytes(vec![1, 2]),
                WireValue::Int(1),
            ]]
        );
        conn.close()
    }

    #[test]
    fn test_declared_types_shape_cells() -> anyhow::Result<()> {
        let mut conn = SqliteDriver.open(MEMORY)?;
        conn.execute(
            "CREATE TABLE t (flag BOOLEAN, at TIMESTAMP, day DATE, n INTEGER, note DATETIME)",
            &[],
        )?;
        let at = DateTime::from_timestamp(1_704_164_645, 0).unwrap();
        conn.execute(
            "INSERT INTO t VALUES (?, ?, '2024-01-02', 0, 'soon'), (0, 1704164645, NULL, 1, '2024-01-02 03:04:05')",
            &[WireValue::Bool(true), WireValue::Timestamp(at)],
        )?;
        let sql = "SELECT flag, at, day, n, note FROM t";
        conn.prepare(sql)?;
        let mut rows = collect(usize::MAX);
        conn.query(sql, &[], &mut rows)?;
        let day = DateTime::from_timestamp(1_704_153_600, 0).unwrap();
        assert_eq!(
            rows.rows,
            vec![
                vec![
                    WireValue::Bool(true),
                    WireValue::Timestamp(at),
                    WireValue::Timestamp(day),
                    WireValue::Int(0),
                    WireValue::Text("soon".into()),
                ],
                vec![
                    WireValue::Bool(false),
                    WireValue::Timestamp(at),
                    WireValue::Null,
                    WireValue::Int(1),
                    WireValue::Timestamp(at),
                ],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_affinity_from_decl_type() {
        assert_eq!(Affinity::from_decl_type(Some("Boolean")), Affinity::Boolean);
        assert_eq!(Affinity::from_decl_type(Some("TIMESTAMP(6)")), Affinity::Time);
        assert_eq!(Affinity::from_decl_type(Some("datetime")), Affinity::Time);
        assert_eq!(Affinity::from_decl_type(Some("INTEGER")), Affinity::Plain);
        assert_eq!(Affinity::from_decl_type(None), Affinity::Plain);
    }

    #[test]
    fn test_execute_reports_changes() -> anyhow::Result<()> {
        let mut conn = SqliteDriver.open(MEMORY)?;
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])?;
        let result = conn.execute(
            "INSERT INTO t (v) VALUES (?), (?)",
            &[WireValue::from("a"), WireValue::from("b")],
        )?;
        assert_eq!(result.rows_affected, 2);
        assert_eq!(result.last_insert_id, Some(2));
        Ok(())
    }

    #[test]
    fn test_visitor_break_stops_iteration() -> anyhow::Result<()> {
        let mut conn = SqliteDriver.open(MEMORY)?;
        let sql = "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 100) SELECT x FROM n";
        conn.prepare(sql)?;
        let mut rows = collect(3);
        conn.query(sql, &[], &mut rows)?;
        assert_eq!(rows.rows.len(), 3);
        Ok(())
    }

    #[test]
    fn test_cache_grows_past_initial_capacity() -> anyhow::Result<()> {
        let mut conn = SqliteDriver.open(MEMORY)?;
        for i in 0..(INITIAL_CACHE_CAPACITY * 3) {
            conn.prepare(&format!("SELECT {i}"))?;
        }
        let mut rows = collect(usize::MAX);
        conn.query("SELECT 0", &[], &mut rows)?;
        assert_eq!(rows.rows, vec![vec![WireValue::Int(0)]]);
        Ok(())
    }

    #[test]
    fn test_prepare_error() {
        let mut conn = SqliteDriver.open(MEMORY).unwrap();
        assert!(conn.prepare("SELEC nothing").is_err());
    }
}
