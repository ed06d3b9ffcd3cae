//! Runs the executor against an in-process driver that returns canned
//! results, to cover wire shapes SQLite never produces (native timestamps,
//! booleans, numerics as text or bytes) and to observe what reaches the driver.

use chrono::{DateTime, TimeZone, Utc};
use rust_sqlmap::{
    args, record, with_arg, Column, Driver, DriverConnection, Error, ExecResult, Field, Record,
    Registry, RowVisitor, Shape, WireValue,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
struct Log {
    opened: usize,
    prepared: Vec<String>,
    executed: Vec<(String, Vec<WireValue>)>,
    queried: Vec<(String, Vec<WireValue>)>,
    closed: usize,
}

/// Answers every query whose SQL starts with a key with that key's columns and rows.
#[derive(Clone, Default)]
struct ScriptedDriver {
    results: Arc<HashMap<String, (Vec<String>, Vec<Vec<WireValue>>)>>,
    log: Arc<Mutex<Log>>,
    fail_open: bool,
}

impl ScriptedDriver {
    fn new(results: Vec<(&str, Vec<&str>, Vec<Vec<WireValue>>)>) -> Self {
        let results = results
            .into_iter()
            .map(|(sql, columns, rows)| {
                (
                    sql.to_string(),
                    (columns.into_iter().map(String::from).collect(), rows),
                )
            })
            .collect();
        Self {
            results: Arc::new(results),
            ..Default::default()
        }
    }

    fn log(&self) -> Log {
        self.log.lock().unwrap().clone()
    }
}

struct ScriptedConnection(ScriptedDriver);

impl Driver for ScriptedDriver {
    fn open(&self, _conn_str: &str) -> anyhow::Result<Box<dyn DriverConnection>> {
        if self.fail_open {
            anyhow::bail!("connection refused");
        }
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(ScriptedConnection(self.clone())))
    }
}

impl DriverConnection for ScriptedConnection {
    fn prepare(&mut self, sql: &str) -> anyhow::Result<()> {
        self.0.log.lock().unwrap().prepared.push(sql.to_string());
        Ok(())
    }

    fn execute(&mut self, sql: &str, args: &[WireValue]) -> anyhow::Result<ExecResult> {
        self.0
            .log
            .lock()
            .unwrap()
            .executed
            .push((sql.to_string(), args.to_vec()));
        Ok(ExecResult {
            rows_affected: args.len() as u64,
            last_insert_id: None,
        })
    }

    fn query(
        &mut self,
        sql: &str,
        args: &[WireValue],
        visitor: &mut dyn RowVisitor,
    ) -> anyhow::Result<()> {
        self.0
            .log
            .lock()
            .unwrap()
            .queried
            .push((sql.to_string(), args.to_vec()));
        let (columns, rows) = self
            .0
            .results
            .iter()
            .find(|(key, _)| sql.starts_with(key.as_str()))
            .map(|(_, result)| result.clone())
            .ok_or_else(|| anyhow::anyhow!("no scripted result for {sql}"))?;
        if visitor.columns(&columns).is_break() {
            return Ok(());
        }
        for row in rows {
            if visitor.row(row).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.0.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

fn text(s: &str) -> WireValue {
    WireValue::Text(s.to_string())
}

record! {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Event {
        event_id: i64,
        title: String,
        price: f64,
        ratio: f32,
        active: bool,
        payload: Vec<u8>,
        starts_at: DateTime<Utc>,
        seats: u16,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Account {
    user_id: i64,
    display_name: String,
}

impl Record for Account {
    fn shape() -> Shape<Self> {
        Shape::Record(vec![
            Field::<Self>::new("UserID", |a| a.user_id.slot()),
            Field::<Self>::new("DisplayName", |a| a.display_name.slot()),
        ])
    }
}

fn setup(driver: &ScriptedDriver, id: &str) -> Registry {
    let registry = Registry::without_drivers();
    registry.register_driver(id, Arc::new(driver.clone()));
    registry.register("main", id, "scripted://main");
    registry
}

#[test]
fn test_heterogeneous_wire_values() {
    let starts = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
    let driver = ScriptedDriver::new(vec![(
        "SELECT",
        vec![
            "EVENT_ID", "title", "price", "ratio", "active", "payload", "starts_at", "seats",
        ],
        vec![
            vec![
                text("7"),
                WireValue::Bytes(b"Launch".to_vec()),
                WireValue::Bytes(b"19.99".to_vec()),
                WireValue::Float(0.5),
                text("Y"),
                WireValue::Bytes(vec![0xde, 0xad]),
                WireValue::Timestamp(starts),
                WireValue::Int(120),
            ],
            vec![
                WireValue::Int(8),
                WireValue::Null,
                WireValue::Float(5.0),
                text("0.25"),
                WireValue::Bool(false),
                WireValue::Null,
                WireValue::Null,
                text("30"),
            ],
        ],
    )]);
    let registry = setup(&driver, "pgx");

    let events: Vec<Event> = registry
        .query_all("main", &args!["SELECT * FROM events WHERE ", with_arg("id > ", 0)])
        .unwrap();
    assert_eq!(
        events,
        vec![
            Event {
                event_id: 7,
                title: "Launch".into(),
                price: 19.99,
                ratio: 0.5,
                active: true,
                payload: vec![0xde, 0xad],
                starts_at: starts,
                seats: 120,
            },
            Event {
                event_id: 8,
                title: String::new(),
                price: 5.0,
                ratio: 0.25,
                active: false,
                payload: Vec::new(),
                starts_at: DateTime::<Utc>::default(),
                seats: 30,
            },
        ]
    );

    let log = driver.log();
    assert_eq!(log.prepared, ["SELECT * FROM events WHERE id > $1 "]);
    assert_eq!(log.queried[0].1, [WireValue::Int(0)]);
}

#[test]
fn test_underscore_and_case_insensitive_binding() {
    let driver = ScriptedDriver::new(vec![
        (
            "SELECT user_id",
            vec!["user_id", "DISPLAY_NAME"],
            vec![vec![WireValue::Int(3), text("Ann")]],
        ),
        (
            "SELECT extra",
            vec!["user_id", "extra"],
            vec![vec![WireValue::Int(3), text("x")]],
        ),
    ]);
    let registry = setup(&driver, "oracle");

    let account: Account = registry
        .query_one("main", &args!["SELECT user_id, display_name FROM accounts"])
        .unwrap();
    assert_eq!(
        account,
        Account {
            user_id: 3,
            display_name: "Ann".into()
        }
    );

    let err = registry
        .query_one::<Account>("main", &args!["SELECT extra FROM accounts"])
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("extra"), "{message}");
    assert!(message.contains("Account"), "{message}");
}

#[test]
fn test_numbers_into_strings() {
    let driver = ScriptedDriver::new(vec![(
        "SELECT",
        vec!["v"],
        vec![
            vec![WireValue::Int(-42)],
            vec![WireValue::Float(1e21)],
            vec![WireValue::Float(0.000001)],
        ],
    )]);
    let registry = setup(&driver, "sqlite");
    let values: Vec<String> = registry.query_all("main", &args!["SELECT v"]).unwrap();
    assert_eq!(values, ["-42", "1000000000000000000000", "0.000001"]);
}

#[test]
fn test_coercion_error_stops_iteration() {
    let driver = ScriptedDriver::new(vec![(
        "SELECT",
        vec!["flag"],
        vec![vec![text("N")], vec![text("maybe")], vec![text("Y")]],
    )]);
    let registry = setup(&driver, "sqlite");
    let err = registry
        .query_all::<bool>("main", &args!["SELECT flag"])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "column 'flag': can't convert 'maybe' text to bool\nSQL: SELECT flag"
    );
}

#[test]
fn test_lazy_open_and_statement_reuse() {
    let driver = ScriptedDriver::new(vec![("SELECT", vec!["n"], vec![vec![WireValue::Int(1)]])]);
    let registry = setup(&driver, "postgres");
    assert_eq!(driver.log().opened, 0);

    for _ in 0..3 {
        let n: i64 = registry
            .query_scalar("main", &args!["SELECT n FROM t WHERE ", with_arg("a = ", 1)])
            .unwrap();
        assert_eq!(n, 1);
    }
    registry
        .exec("main", &args!["UPDATE t SET ", with_arg("a = ", 2)])
        .unwrap();

    let log = driver.log();
    assert_eq!(log.opened, 1);
    assert_eq!(log.prepared.len(), 1);
    assert_eq!(log.queried.len(), 3);
    assert_eq!(log.executed, [("UPDATE t SET a = $1 ".to_string(), vec![WireValue::Int(2)])]);

    registry.reset();
    assert_eq!(driver.log().closed, 1);
}

#[test]
fn test_open_failure() {
    let driver = ScriptedDriver {
        fail_open: true,
        ..Default::default()
    };
    let registry = setup(&driver, "sqlite");
    let err = registry.exec("main", &args!["SELECT 1"]).unwrap_err();
    assert!(matches!(err, Error::Open { ref database, .. } if database == "main"));
    assert!(err.to_string().contains("connection refused"));
    // nothing was cached, so the next call tries to open again
    assert!(matches!(registry.get("main").err(), Some(Error::Open { .. })));
    assert_eq!(driver.log().opened, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_connection() {
    let driver = ScriptedDriver::new(vec![("SELECT", vec!["n"], vec![vec![WireValue::Int(5)]])]);
    let registry = Arc::new(setup(&driver, "sqlite"));

    let mut handles = Vec::new();
    for i in 0..32 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::task::spawn_blocking(move || {
            registry.query_scalar::<i64>(
                "main",
                &args!["SELECT n FROM t WHERE ", with_arg("k = ", i % 4)],
            )
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 5);
    }

    let log = driver.log();
    assert_eq!(log.opened, 1);
    assert_eq!(log.prepared.len(), 1);
    assert_eq!(log.queried.len(), 32);
}
