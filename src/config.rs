use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chores::BULK_ROW_COUNT;
use crate::db::ConnectionString;
use crate::error::{HarnessError, Result};

/// Where and how the suite connects, and how big the bulk case is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Full connection string; when set it wins over the individual fields.
    pub connection_string: Option<String>,
    pub server: String,
    /// Database holding the chores fixture.
    pub database: String,
    /// Database used by the bare-server query.
    pub bare_database: String,
    pub trusted_connection: bool,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bulk_rows: usize,
    /// Minimum `dbo.Chores` row count after the bulk insert.
    pub bulk_count_threshold: i64,
    /// Create or refresh the stored procedure and function during setup.
    pub install_routines: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            server: "localhost\\sql2025ed".to_string(),
            database: "Household".to_string(),
            bare_database: "master".to_string(),
            trusted_connection: true,
            encrypt: true,
            trust_server_certificate: true,
            username: None,
            password: None,
            bulk_rows: BULK_ROW_COUNT,
            bulk_count_threshold: BULK_ROW_COUNT as i64,
            install_routines: true,
        }
    }
}

impl HarnessConfig {
    /// Defaults, then the JSON file named by `CHORES_CONFIG`, then `CHORES_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("CHORES_CONFIG").filter(|p| !p.is_empty()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(&lookup)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        log::debug!("Loaded harness config from {}", path.as_ref().display());
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("CHORES_CONNECTION_STRING") {
            self.connection_string = Some(v);
        }
        if let Some(v) = get("CHORES_SERVER") {
            self.server = v;
        }
        if let Some(v) = get("CHORES_DATABASE") {
            self.database = v;
        }
        if let Some(v) = get("CHORES_BARE_DATABASE") {
            self.bare_database = v;
        }
        if let Some(v) = get("CHORES_USER") {
            self.username = Some(v);
        }
        if let Some(v) = get("CHORES_PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = get("CHORES_TRUSTED") {
            self.trusted_connection = parse_bool("CHORES_TRUSTED", &v)?;
        }
        if let Some(v) = get("CHORES_ENCRYPT") {
            self.encrypt = parse_bool("CHORES_ENCRYPT", &v)?;
        }
        if let Some(v) = get("CHORES_TRUST_CERT") {
            self.trust_server_certificate = parse_bool("CHORES_TRUST_CERT", &v)?;
        }
        if let Some(v) = get("CHORES_BULK_ROWS") {
            self.bulk_rows = parse_value("CHORES_BULK_ROWS", &v)?;
        }
        if let Some(v) = get("CHORES_BULK_THRESHOLD") {
            self.bulk_count_threshold = parse_value("CHORES_BULK_THRESHOLD", &v)?;
        }
        if let Some(v) = get("CHORES_INSTALL_ROUTINES") {
            self.install_routines = parse_bool("CHORES_INSTALL_ROUTINES", &v)?;
        }
        Ok(())
    }

    /// Connection string for `database`, keeping every security option.
    pub fn connection_string_for(&self, database: &str) -> Result<ConnectionString> {
        let base = match self.connection_string {
            Some(ref raw) => raw.parse::<ConnectionString>()?,
            None => {
                let mut cs = ConnectionString::new(&self.server)?;
                cs.trusted_connection = self.trusted_connection;
                cs.encrypt = self.encrypt;
                cs.trust_server_certificate = self.trust_server_certificate;
                cs.user = self.username.clone();
                cs.password = self.password.clone();
                cs
            }
        };
        Ok(base.with_database(database))
    }

    pub fn household(&self) -> Result<ConnectionString> {
        self.connection_string_for(&self.database)
    }

    pub fn bare(&self) -> Result<ConnectionString> {
        self.connection_string_for(&self.bare_database)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| HarnessError::Config(format!("{} has invalid value '{}'", key, raw)))
}

/// Same spellings the connection string accepts for its yes/no keys.
fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "on" | "true" | "1" => Ok(true),
        "no" | "off" | "false" | "0" => Ok(false),
        _ => Err(HarnessError::Config(format!(
            "{} expects yes/no, got '{}'",
            key, raw
        ))),
    }
}
