use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tiberius::{AuthMethod, Config, EncryptionLevel};

use crate::error::{HarnessError, Result};

const DEFAULT_PORT: u16 = 1433;

/// Where the server lives: `host`, `host\instance` or `host,port`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub instance: Option<String>,
    pub port: Option<u16>,
}

impl ServerAddress {
    fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let raw = match raw.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("tcp:") => &raw[4..],
            _ => raw,
        };

        let (rest, port) = match raw.rsplit_once(',') {
            Some((rest, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    HarnessError::InvalidConnectionString(format!("invalid port '{}'", port))
                })?;
                (rest, Some(port))
            }
            None => (raw, None),
        };

        let (host, instance) = match rest.split_once('\\') {
            Some((host, instance)) if !instance.trim().is_empty() => {
                (host.trim(), Some(instance.trim().to_string()))
            }
            Some((host, _)) => (host.trim(), None),
            None => (rest.trim(), None),
        };

        if host.is_empty() {
            return Err(HarnessError::InvalidConnectionString(
                "SERVER has no host".to_string(),
            ));
        }

        let host = match host {
            "." | "(local)" => "localhost",
            other => other,
        };

        Ok(Self {
            host: host.to_string(),
            instance,
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)?;
        if let Some(ref instance) = self.instance {
            write!(f, "\\{}", instance)?;
        }
        if let Some(port) = self.port {
            write!(f, ",{}", port)?;
        }
        Ok(())
    }
}

/// Semicolon-delimited `key=value` connection string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionString {
    pub server: ServerAddress,
    pub database: Option<String>,
    pub trusted_connection: bool,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub autocommit: bool,
    /// Keys the harness does not interpret, kept in order.
    pub extra: Vec<(String, String)>,
}

impl ConnectionString {
    pub fn new(server: &str) -> Result<Self> {
        Ok(Self {
            server: ServerAddress::parse(server)?,
            database: None,
            trusted_connection: false,
            encrypt: true,
            trust_server_certificate: false,
            user: None,
            password: None,
            autocommit: false,
            extra: Vec::new(),
        })
    }

    /// Same settings against another database.
    pub fn with_database(&self, database: &str) -> Self {
        Self {
            database: Some(database.to_string()),
            ..self.clone()
        }
    }

    /// Rendering with the password masked, for logs.
    pub fn redacted(&self) -> String {
        let mut masked = self.clone();
        if masked.password.is_some() {
            masked.password = Some("****".to_string());
        }
        masked.to_string()
    }

    /// Build the driver configuration for this connection string.
    pub fn to_tiberius_config(&self) -> Result<Config> {
        let mut config = Config::new();
        config.host(&self.server.host);
        config.port(self.server.port.unwrap_or(DEFAULT_PORT));
        if let Some(ref instance) = self.server.instance {
            config.instance_name(instance);
        }
        if let Some(ref db) = self.database {
            config.database(db);
        }
        config.application_name("household");

        match (&self.user, &self.password) {
            (Some(user), Some(pass)) => {
                config.authentication(AuthMethod::sql_server(user, pass));
            }
            (Some(user), None) => {
                return Err(HarnessError::InvalidConnectionString(format!(
                    "UID '{}' given without PWD",
                    user
                )));
            }
            _ if self.trusted_connection => {
                config.authentication(integrated_auth()?);
            }
            _ => {
                return Err(HarnessError::InvalidConnectionString(
                    "no credentials: set Trusted_Connection=yes or UID/PWD".to_string(),
                ));
            }
        }

        if self.encrypt {
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::Off);
        }
        if self.trust_server_certificate {
            config.trust_cert();
        }

        Ok(config)
    }
}

#[cfg(windows)]
fn integrated_auth() -> Result<AuthMethod> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(windows))]
fn integrated_auth() -> Result<AuthMethod> {
    Err(HarnessError::Connection(
        "Trusted_Connection=yes needs Windows integrated authentication; supply UID and PWD on this platform"
            .to_string(),
    ))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "sspi" | "mandatory" | "strict" => Ok(true),
        "no" | "false" | "0" | "optional" => Ok(false),
        _ => Err(HarnessError::InvalidConnectionString(format!(
            "{} expects yes/no, got '{}'",
            key, value
        ))),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Split into trimmed `(key, value)` pairs. A value wrapped in `{...}` may
/// contain `;` and `=`; inside it `}}` stands for one `}`.
fn split_pairs(s: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut rest = s;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        if rest.is_empty() {
            return Ok(pairs);
        }

        let segment_end = rest.find(';').unwrap_or(rest.len());
        let eq = match rest[..segment_end].find('=') {
            Some(eq) => eq,
            None => {
                return Err(HarnessError::InvalidConnectionString(format!(
                    "segment '{}' is not key=value",
                    rest[..segment_end].trim()
                )))
            }
        };
        let key = rest[..eq].trim().to_string();
        let after = rest[eq + 1..].trim_start();

        if let Some(braced) = after.strip_prefix('{') {
            let mut value = String::new();
            let mut chars = braced.char_indices().peekable();
            let mut close = None;
            while let Some((i, c)) = chars.next() {
                if c == '}' {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        value.push('}');
                        continue;
                    }
                    close = Some(i);
                    break;
                }
                value.push(c);
            }
            let close = close.ok_or_else(|| {
                HarnessError::InvalidConnectionString(format!("unterminated '{{' in value of {}", key))
            })?;
            let tail = &braced[close + 1..];
            let tail_end = tail.find(';').unwrap_or(tail.len());
            if !tail[..tail_end].trim().is_empty() {
                return Err(HarnessError::InvalidConnectionString(format!(
                    "unexpected text after '}}' in value of {}",
                    key
                )));
            }
            pairs.push((key, value));
            rest = &tail[tail_end..];
        } else {
            let value_end = after.find(';').unwrap_or(after.len());
            pairs.push((key, after[..value_end].trim().to_string()));
            rest = &after[value_end..];
        }
    }
}

/// Brace a value when it would not survive `split_pairs` bare.
fn quote(value: &str) -> Cow<'_, str> {
    let trimmed = value.trim();
    if value.contains(';') || value.starts_with('{') || trimmed.len() != value.len() {
        Cow::Owned(format!("{{{}}}", value.replace('}', "}}")))
    } else {
        Cow::Borrowed(value)
    }
}

impl FromStr for ConnectionString {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        if s.contains('\0') {
            return Err(HarnessError::InvalidConnectionString(
                "contains null bytes".to_string(),
            ));
        }

        let mut server = None;
        let mut database = None;
        let mut trusted_connection = false;
        let mut encrypt = true;
        let mut trust_server_certificate = false;
        let mut user = None;
        let mut password = None;
        let mut autocommit = false;
        let mut extra = Vec::new();

        for (key, value) in split_pairs(s)? {
            let key = key.as_str();
            let value = value.as_str();

            match key.to_ascii_lowercase().as_str() {
                "server" | "data source" | "address" => {
                    server = Some(ServerAddress::parse(value)?)
                }
                "database" | "initial catalog" => database = Some(value.to_string()),
                "trusted_connection" | "integrated security" => {
                    trusted_connection = parse_flag(key, value)?
                }
                "encrypt" => encrypt = parse_flag(key, value)?,
                "trustservercertificate" => trust_server_certificate = parse_flag(key, value)?,
                "uid" | "user id" | "user" => user = Some(value.to_string()),
                "pwd" | "password" => password = Some(value.to_string()),
                "autocommit" => autocommit = parse_flag(key, value)?,
                _ => extra.push((key.to_string(), value.to_string())),
            }
        }

        let server = server.ok_or_else(|| {
            HarnessError::InvalidConnectionString("missing SERVER".to_string())
        })?;

        Ok(Self {
            server,
            database,
            trusted_connection,
            encrypt,
            trust_server_certificate,
            user,
            password,
            autocommit,
            extra,
        })
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SERVER={}", self.server)?;
        if let Some(ref db) = self.database {
            write!(f, ";DATABASE={}", quote(db))?;
        }
        write!(
            f,
            ";Trusted_Connection={};Encrypt={};TrustServerCertificate={}",
            yes_no(self.trusted_connection),
            yes_no(self.encrypt),
            yes_no(self.trust_server_certificate)
        )?;
        if let Some(ref user) = self.user {
            write!(f, ";UID={}", quote(user))?;
        }
        if let Some(ref pass) = self.password {
            write!(f, ";PWD={}", quote(pass))?;
        }
        if self.autocommit {
            write!(f, ";Autocommit=yes")?;
        }
        for (key, value) in &self.extra {
            write!(f, ";{}={}", key, quote(value))?;
        }
        Ok(())
    }
}
