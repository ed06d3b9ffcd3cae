//! Named databases and their prepared-statement caches.
//!
//! # Intention
//!
//! - Register a database once by name, use it everywhere by name.
//! - Open the connection on first use and prepare each distinct SQL text once.
//!
//! # Locking
//!
//! The name map sits behind an `RwLock`; each [`NamedDatabase`] owns a
//! `Mutex` around its connection, statement cache and binding cache. Opening,
//! preparing and running a query all happen under that mutex, so concurrent
//! callers never race on first open or first prepare, and the driver
//! connection is used by one caller at a time.

use crate::driver::{Driver, DriverConnection};
use crate::error::{Error, Result};
use crate::params::Dialect;
use crate::sqlite::SqliteDriver;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, warn};

pub(crate) type BindingKey = (TypeId, Vec<String>);
pub(crate) type Bindings = HashMap<BindingKey, Box<dyn Any + Send>>;

/// Connection state of one named database.
#[derive(Default)]
pub(crate) struct DbState {
    pub(crate) conn: Option<Box<dyn DriverConnection>>,
    /// SQL texts prepared on `conn`. Only ever grows while `conn` is open.
    pub(crate) statements: HashSet<String>,
    /// `ColumnBinding<T>` per destination type and column tuple.
    pub(crate) bindings: Bindings,
    /// Set once the database is replaced or reset; it never reopens.
    retired: bool,
}

impl DbState {
    fn close(&mut self, name: &str) {
        self.retired = true;
        self.statements.clear();
        self.bindings.clear();
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close() {
                warn!(database = name, error = %e, "error closing database");
            }
        }
    }
}

/// A registered database: driver, connection string and lazily opened
/// connection.
pub struct NamedDatabase {
    name: String,
    driver: String,
    conn_str: String,
    dialect: Dialect,
    state: Mutex<DbState>,
}

impl NamedDatabase {
    fn new(name: &str, driver: &str, conn_str: &str, dialect: Dialect) -> Self {
        Self {
            name: name.to_string(),
            driver: driver.to_string(),
            conn_str: conn_str.to_string(),
            dialect,
            state: Mutex::new(DbState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn is_open(&self) -> bool {
        self.lock().conn.is_some()
    }

    /// Number of prepared statements cached on the open connection.
    pub fn cached_statements(&self) -> usize {
        self.lock().statements.len()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DbState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide set of named databases.
pub struct Registry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    databases: RwLock<HashMap<String, Arc<NamedDatabase>>>,
    debug: AtomicBool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry with the SQLite driver available as `sqlite` and `sqlite3`.
    pub fn new() -> Self {
        let registry = Self::without_drivers();
        registry.register_driver("sqlite", Arc::new(SqliteDriver));
        registry.register_driver("sqlite3", Arc::new(SqliteDriver));
        registry
    }

    pub fn without_drivers() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
            databases: RwLock::new(HashMap::new()),
            debug: AtomicBool::new(false),
        }
    }

    /// Makes `driver` available under the identifier `id`.
    ///
    /// Databases registered with [`register`](Self::register) take their
    /// placeholder syntax from the identifier; other identifiers can pick one
    /// through [`register_with_dialect`](Self::register_with_dialect).
    pub fn register_driver(&self, id: &str, driver: Arc<dyn Driver>) {
        self.drivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), driver);
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Registers `name`, closing whatever was registered under it before.
    /// Nothing is opened until first use.
    pub fn register(&self, name: &str, driver: &str, conn_str: &str) {
        self.register_with_dialect(name, driver, conn_str, Dialect::for_driver(driver));
    }

    /// [`register`](Self::register) with an explicit placeholder syntax.
    pub fn register_with_dialect(
        &self,
        name: &str,
        driver: &str,
        conn_str: &str,
        dialect: Dialect,
    ) {
        if self.debug() {
            debug!(database = name, driver, ?dialect, "registering database");
        }
        let previous = self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.to_string(),
                Arc::new(NamedDatabase::new(name, driver, conn_str, dialect)),
            );
        if let Some(previous) = previous {
            previous.lock().close(name);
        }
    }

    /// Returns the database registered as `name`, opening its connection if
    /// this is the first use. A failed open leaves it closed so a later call
    /// retries.
    pub fn get(&self, name: &str) -> Result<Arc<NamedDatabase>> {
        self.with_state(name, |db, state| {
            self.connect(db, &mut state.conn)?;
            Ok(Arc::clone(db))
        })
    }

    /// Prepares `sql` on `name`'s connection unless it is already cached.
    pub fn prepare(&self, name: &str, sql: &str) -> Result<()> {
        self.with_state(name, |db, state| {
            let DbState {
                conn, statements, ..
            } = state;
            let conn = self.connect(db, conn)?;
            self.prepare_on(db, conn, statements, sql)
        })
    }

    /// Closes every connection and statement and forgets all databases.
    /// Registered drivers are kept.
    pub fn reset(&self) {
        if self.debug() {
            debug!("resetting database registry");
        }
        let databases: Vec<_> = self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (name, db) in databases {
            db.lock().close(&name);
        }
    }

    /// Names of all registered databases, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<Arc<NamedDatabase>> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDatabase {
                name: name.to_string(),
            })
    }

    /// Runs `f` on the database currently registered as `name`, with its
    /// state locked.
    pub(crate) fn with_state<R>(
        &self,
        name: &str,
        f: impl FnOnce(&Arc<NamedDatabase>, &mut DbState) -> Result<R>,
    ) -> Result<R> {
        self.with_state_from(name, self.lookup(name)?, f)
    }

    /// [`with_state`](Self::with_state) starting from an already looked-up
    /// entry. An entry replaced before its lock was taken is retired, and
    /// the name is looked up again rather than reopening the old one.
    fn with_state_from<R>(
        &self,
        name: &str,
        mut db: Arc<NamedDatabase>,
        f: impl FnOnce(&Arc<NamedDatabase>, &mut DbState) -> Result<R>,
    ) -> Result<R> {
        loop {
            let mut state = db.lock();
            if !state.retired {
                return f(&db, &mut *state);
            }
            drop(state);
            db = self.lookup(name)?;
        }
    }

    /// Opens `db`'s connection into `slot` unless it is already open.
    pub(crate) fn connect<'c>(
        &self,
        db: &NamedDatabase,
        slot: &'c mut Option<Box<dyn DriverConnection>>,
    ) -> Result<&'c mut Box<dyn DriverConnection>> {
        let conn = match slot.take() {
            Some(conn) => conn,
            None => {
                let driver = self
                    .drivers
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&db.driver)
                    .cloned()
                    .ok_or_else(|| Error::UnknownDriver {
                        database: db.name.clone(),
                        driver: db.driver.clone(),
                    })?;
                if self.debug() {
                    debug!(database = %db.name, driver = %db.driver, "opening database");
                }
                driver.open(&db.conn_str).map_err(|source| Error::Open {
                    database: db.name.clone(),
                    source,
                })?
            }
        };
        Ok(slot.insert(conn))
    }

    pub(crate) fn prepare_on(
        &self,
        db: &NamedDatabase,
        conn: &mut Box<dyn DriverConnection>,
        statements: &mut HashSet<String>,
        sql: &str,
    ) -> Result<()> {
        if statements.contains(sql) {
            return Ok(());
        }
        if self.debug() {
            debug!(database = %db.name, sql, "preparing statement");
        }
        conn.prepare(sql).map_err(|source| Error::Prepare {
            sql: sql.to_string(),
            source,
        })?;
        statements.insert(sql.to_string());
        Ok(())
    }
}
