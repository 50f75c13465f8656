use std::collections::BTreeMap;
use std::time::Duration;

/// Default timeout for tool operations (30 seconds).
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Default SQL Server TDS port.
const DEFAULT_SQL_PORT: u16 = 1433;

/// Profile key for the primary (dev) database.
pub const DEFAULT_DATABASE_KEY: &str = "default";

/// Profile key for the integration database. The key doubles as the database
/// name, and `create_report` sniffs query text for it when no explicit key is
/// given.
pub const INTEGRATION_DATABASE_KEY: &str = "INTEGRACION_CW_20_DEV";

/// Connection settings for one SQL Server database.
#[derive(Debug, Clone)]
pub struct DatabaseProfile {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database profiles keyed by `database_key`. A sorted map, so tools that
    /// walk every database do so in a deterministic order.
    pub databases: BTreeMap<String, DatabaseProfile>,
    pub tool_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment.
    ///
    /// - `DEV_SERVER` (required) — SQL Server host
    /// - `DEV_DATABASE` (required) — primary database name
    /// - `DEV_USERNAME` / `DEV_PASSWORD` (required) — SQL authentication
    /// - `DEV_PORT` (optional, default 1433)
    /// - `REPORT_TOOL_TIMEOUT_SECS` (optional, default 30) — max seconds per tool call
    ///
    /// Two profiles are always registered: `default` (the dev database) and
    /// `INTEGRACION_CW_20_DEV` (same server and credentials, fixed database
    /// name).
    pub fn from_env() -> Result<Self, String> {
        let host = require_env("DEV_SERVER")?;
        let database = require_env("DEV_DATABASE")?;
        let username = require_env("DEV_USERNAME")?;
        let password = require_env("DEV_PASSWORD")?;

        let port = match std::env::var("DEV_PORT") {
            Ok(val) => val
                .parse::<u16>()
                .map_err(|_| "DEV_PORT must be a valid port number".to_string())?,
            Err(_) => DEFAULT_SQL_PORT,
        };

        let tool_timeout_secs = match std::env::var("REPORT_TOOL_TIMEOUT_SECS") {
            Ok(val) => val
                .parse::<u64>()
                .map_err(|_| "REPORT_TOOL_TIMEOUT_SECS must be a positive integer".to_string())?,
            Err(_) => DEFAULT_TOOL_TIMEOUT_SECS,
        };

        let mut databases = BTreeMap::new();
        databases.insert(
            DEFAULT_DATABASE_KEY.to_string(),
            DatabaseProfile {
                host: host.clone(),
                port,
                database,
                username: username.clone(),
                password: password.clone(),
            },
        );
        databases.insert(
            INTEGRATION_DATABASE_KEY.to_string(),
            DatabaseProfile {
                host,
                port,
                database: INTEGRATION_DATABASE_KEY.to_string(),
                username,
                password,
            },
        );

        Ok(Self {
            databases,
            tool_timeout: Duration::from_secs(tool_timeout_secs),
        })
    }

    /// Look up a database profile by key.
    pub fn profile(&self, key: &str) -> Option<&DatabaseProfile> {
        self.databases.get(key)
    }

    /// All configured profile keys, sorted ascending.
    pub fn database_keys(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }
}

fn require_env(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{name} environment variable is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(database: &str) -> DatabaseProfile {
        DatabaseProfile {
            host: "127.0.0.1".into(),
            port: DEFAULT_SQL_PORT,
            database: database.into(),
            username: "sa".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn profile_lookup_and_key_order() {
        let mut databases = BTreeMap::new();
        databases.insert(DEFAULT_DATABASE_KEY.to_string(), profile("ECOSYSTEM_DEV"));
        databases.insert(
            INTEGRATION_DATABASE_KEY.to_string(),
            profile(INTEGRATION_DATABASE_KEY),
        );
        let config = ServerConfig {
            databases,
            tool_timeout: Duration::from_secs(5),
        };

        assert!(config.profile(DEFAULT_DATABASE_KEY).is_some());
        assert!(config.profile("nope").is_none());
        // BTreeMap: uppercase sorts before lowercase in byte order.
        assert_eq!(
            config.database_keys(),
            vec![
                INTEGRATION_DATABASE_KEY.to_string(),
                DEFAULT_DATABASE_KEY.to_string()
            ]
        );
    }
}
