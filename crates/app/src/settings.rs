//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and from `RELIEF_*` environment variables
//! (`RELIEF_FUND__ADMIN=admin`, `RELIEF_SERVER__PORT=3000`, ...).
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [server]
//! database = { sqlite = "relief.db" }
//! port = 3000
//!
//! [fund]
//! admin = "admin"
//! min_donation = "0.001"
//! withdrawal_limit = "1"
//! ```

use config::{Config, ConfigError, Environment, File};
use engine::{Amount, PoolConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub database: Database,
    /// Where funding requests live; defaults to the ledger database.
    pub requests_database: Option<Database>,
    pub bind: Option<String>,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Fund {
    pub admin: String,
    pub min_donation: String,
    pub withdrawal_limit: String,
    pub auto_ceiling: Option<String>,
    pub auto_cooldown_secs: Option<i64>,
}

impl Fund {
    /// Pool parameters used when the ledger has not been initialized yet.
    pub fn pool_config(&self) -> Result<PoolConfig, engine::EngineError> {
        let mut config = PoolConfig::new(
            self.admin.clone(),
            self.min_donation.parse::<Amount>()?,
            self.withdrawal_limit.parse::<Amount>()?,
        );
        if let Some(ceiling) = &self.auto_ceiling {
            config = config.auto_ceiling(ceiling.parse::<Amount>()?);
        }
        if let Some(secs) = self.auto_cooldown_secs {
            config = config.auto_cooldown_secs(secs);
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Option<Server>,
    pub fund: Fund,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("RELIEF").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
