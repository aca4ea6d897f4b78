//! Connection settings and pool bootstrap.
//!
//! Settings come from the `db` section of a YAML file, then `DB_*`
//! environment variables (after loading `.env`) override individual keys:
//!
//! ```yaml
//! db:
//!   engine: postgres
//!   host: 127.0.0.1
//!   port: 5432
//!   user: app
//!   password: secret
//!   database: app
//!   show_sql: false
//!   pool:
//!     max_open: 50
//!   plain_tables: [audit]
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use fpm_orm_data::{DataError, DataResult};
use serde::{Deserialize, Serialize};
use sqlx::pool::PoolOptions;
use sqlx::ConnectOptions;
use tokio::sync::Mutex;
use url::Url;

use crate::backend::{Db, DbConnectOptions, ENGINE};
use crate::engine::{AffectedRows, Engine, EngineOptions, DEFAULT_MIGRATIONS_DIR};
use crate::error::SqlxErrorExt;

/// Serializes pool construction across the process.
static CONNECT_LOCK: Mutex<()> = Mutex::const_new(());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSetting {
    pub max_open: u32,
    pub min_idle: u32,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for PoolSetting {
    fn default() -> Self {
        Self {
            max_open: 50,
            min_idle: 0,
            max_lifetime_secs: 30 * 60,
            idle_timeout_secs: 10 * 60,
        }
    }
}

impl PoolSetting {
    fn pool_options(&self) -> PoolOptions<Db> {
        PoolOptions::<Db>::new()
            .max_connections(self.max_open.max(1))
            .min_connections(self.min_idle)
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbSetting {
    /// `sqlite`, `postgres` or `mysql`; must match the compiled backend to
    /// connect.
    pub engine: String,
    pub user: String,
    pub password: String,
    pub host: String,
    /// `0` picks the engine's default port.
    pub port: u16,
    pub database: String,
    pub charset: String,
    pub show_sql: bool,
    pub pool: PoolSetting,
    pub plain_tables: Vec<String>,
    pub affected_rows: AffectedRows,
    pub migrations_dir: PathBuf,
}

impl Default for DbSetting {
    fn default() -> Self {
        Self {
            engine: ENGINE.to_string(),
            user: String::new(),
            password: String::new(),
            host: "127.0.0.1".to_string(),
            port: 0,
            database: String::new(),
            charset: "utf8mb4".to_string(),
            show_sql: false,
            pool: PoolSetting::default(),
            plain_tables: Vec::new(),
            affected_rows: AffectedRows::default(),
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
        }
    }
}

impl DbSetting {
    /// Load from the `db` section of a YAML file (skipped when the file
    /// does not exist), then apply `.env` and `DB_*` overrides.
    pub fn load(path: impl AsRef<Path>) -> DataResult<Self> {
        let path = path.as_ref();
        let mut setting = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| DataError::Config(format!("{}: {e}", path.display())))?;
            Self::from_yaml_str(&content)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        let _ = dotenvy::dotenv();
        setting.apply_env()?;
        Ok(setting)
    }

    /// Parse the `db` section of a YAML document. A document without one
    /// yields the defaults.
    pub fn from_yaml_str(content: &str) -> DataResult<Self> {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| DataError::Config(e.to_string()))?;
        match yaml.get("db") {
            Some(section) => serde_yaml::from_value(section.clone())
                .map_err(|e| DataError::Config(format!("db: {e}"))),
            None => Ok(Self::default()),
        }
    }

    /// Override keys from `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`,
    /// `DB_DATABASE`, `DB_ENGINE` and `DB_SHOW_SQL`.
    pub fn apply_env(&mut self) -> DataResult<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> DataResult<()> {
        if let Some(engine) = lookup("DB_ENGINE") {
            self.engine = engine;
        }
        if let Some(host) = lookup("DB_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.port = port
                .parse()
                .map_err(|_| DataError::Config(format!("DB_PORT is not a port: {port}")))?;
        }
        if let Some(user) = lookup("DB_USER") {
            self.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.password = password;
        }
        if let Some(database) = lookup("DB_DATABASE") {
            self.database = database;
        }
        if let Some(show_sql) = lookup("DB_SHOW_SQL") {
            self.show_sql = matches!(show_sql.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    fn default_port(&self) -> u16 {
        match self.engine.to_ascii_lowercase().as_str() {
            "mysql" => 3306,
            _ => 5432,
        }
    }

    /// The driver URL for these settings.
    pub fn url(&self) -> DataResult<String> {
        if self.database.trim().is_empty() {
            return Err(DataError::Config("database is required".into()));
        }
        let engine = self.engine.to_ascii_lowercase();
        let (scheme, query) = match engine.as_str() {
            "sqlite" => return Ok(format!("sqlite:{}", self.database)),
            "postgres" | "postgresql" => ("postgres", "sslmode=disable".to_string()),
            "mysql" => ("mysql", format!("charset={}", self.charset)),
            other => return Err(DataError::Config(format!("unsupported engine: {other}"))),
        };

        let port = if self.port == 0 { self.default_port() } else { self.port };
        let mut url = Url::parse(&format!("{scheme}://{}:{port}", self.host))
            .map_err(|e| DataError::Config(format!("invalid host {}: {e}", self.host)))?;
        if !self.user.is_empty() {
            url.set_username(&self.user)
                .map_err(|_| DataError::Config("cannot set user on url".into()))?;
        }
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| DataError::Config("cannot set password on url".into()))?;
        }
        url.set_path(&self.database);
        url.set_query(Some(&query));
        Ok(url.into())
    }

    /// The engine behavior carried by these settings.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            plain_tables: self.plain_tables.iter().cloned().collect(),
            affected_rows: self.affected_rows,
            show_sql: self.show_sql,
            migrations_dir: self.migrations_dir.clone(),
        }
    }

    fn check_engine(&self) -> DataResult<()> {
        let engine = match self.engine.to_ascii_lowercase().as_str() {
            "postgresql" => "postgres".to_string(),
            other => other.to_string(),
        };
        if engine != ENGINE {
            return Err(DataError::Config(format!(
                "engine {} is not available; this build supports {ENGINE}",
                self.engine
            )));
        }
        Ok(())
    }

    fn connect_options(&self) -> DataResult<DbConnectOptions> {
        let url = self.url()?;
        let options = DbConnectOptions::from_str(&url).map_err(SqlxErrorExt::into_data_error)?;
        #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
        let options = options.create_if_missing(true);
        Ok(if self.show_sql {
            options
        } else {
            options.disable_statement_logging()
        })
    }
}

impl Engine {
    /// Build a pool from `setting` and wrap it in an engine.
    pub async fn connect(setting: &DbSetting) -> DataResult<Engine> {
        let _guard = CONNECT_LOCK.lock().await;
        setting.check_engine()?;
        let options = setting.connect_options()?;
        let pool = setting
            .pool
            .pool_options()
            .connect_with(options)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        tracing::info!(engine = ENGINE, database = %setting.database, max_open = setting.pool.max_open, "Database pool ready");
        Ok(Engine::with_options(pool, setting.engine_options()))
    }
}
