//! Registry configuration.
//!
//! ```json
//! {
//!   "debug": true,
//!   "databases": [
//!     { "name": "main", "driver": "sqlite", "connection": "./app.sqlite" },
//!     { "name": "ledger", "driver": "godror", "connection": "ora/ledger", "placeholders": "colon" }
//!   ]
//! }
//! ```

use crate::params::Dialect;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};

/// One named database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    /// Driver identifier; also selects the placeholder syntax.
    pub driver: String,
    /// Driver-specific connection string.
    pub connection: String,
    /// Overrides the placeholder syntax implied by `driver`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholders: Option<Dialect>,
}

impl DatabaseConfig {
    pub fn new(
        name: impl Into<String>,
        driver: impl Into<String>,
        connection: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
            connection: connection.into(),
            placeholders: None,
        }
    }

    pub fn with_placeholders(mut self, dialect: Dialect) -> Self {
        self.placeholders = Some(dialect);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Trace every statement with its SQL, arguments and timing.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

impl QueryConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.databases.push(database);
        self
    }
}

impl Registry {
    /// A registry with the built-in drivers and every configured database
    /// registered. Connections open on first use.
    pub fn from_config(config: &QueryConfig) -> Self {
        let registry = Registry::new();
        registry.set_debug(config.debug);
        for db in &config.databases {
            let dialect = db
                .placeholders
                .unwrap_or_else(|| Dialect::for_driver(&db.driver));
            registry.register_with_dialect(&db.name, &db.driver, &db.connection, dialect);
        }
        registry
    }
}
