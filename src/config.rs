//! Server configuration loaded from a TOML file.
//!
//! ```toml
//! name = "prod-db1"
//! host = "10.0.0.5"
//! port = 27017
//! user = "backup"
//! password = "secret"
//! auth_db = "admin"
//! auth_mech = "SCRAM-SHA-1"
//!
//! [tls]
//! ca_certs = "/etc/ssl/mongo-ca.pem"
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Connection parameters for one MongoDB server
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Logical server name, used in mail subjects
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Whether the server requires authentication
    #[serde(default = "default_auth")]
    pub auth: bool,
    #[serde(default = "default_auth_db")]
    pub auth_db: Option<String>,
    #[serde(default)]
    pub auth_mech: Option<String>,
    /// Directory holding the server's data files, discovered at connect time
    /// when not set
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Replica set name
    #[serde(default)]
    pub repset: Option<String>,
    /// Comma separated `host:port` list of replica set members
    #[serde(default)]
    pub repset_hosts: Option<String>,
    /// Mongo shell used for lock control
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub ssl: Option<SslConfig>,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub ca_certs: Option<String>,
    pub certkey: Option<String>,
    pub certkey_phrase: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SslConfig {
    pub client_ca: Option<String>,
    pub client_key: Option<String>,
    pub client_cert: Option<String>,
    pub client_phrase: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Mail program the notification body is piped into
    #[serde(default = "default_mail_program")]
    pub program: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            program: default_mail_program(),
        }
    }
}

fn default_port() -> u16 {
    27017
}

fn default_auth() -> bool {
    true
}

fn default_auth_db() -> Option<String> {
    Some("admin".to_string())
}

fn default_shell() -> String {
    "mongosh".to_string()
}

fn default_mail_program() -> String {
    "mailx".to_string()
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth", &self.auth)
            .field("auth_db", &self.auth_db)
            .field("auth_mech", &self.auth_mech)
            .field("db_path", &self.db_path)
            .field("repset", &self.repset)
            .field("repset_hosts", &self.repset_hosts)
            .field("tls", &self.tls)
            .field("ssl", &self.ssl)
            .finish()
    }
}

impl ServerConfig {
    /// Minimal configuration for a server reachable without authentication
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: default_port(),
            user: None,
            password: None,
            auth: false,
            auth_db: None,
            auth_mech: None,
            db_path: None,
            repset: None,
            repset_hosts: None,
            shell: default_shell(),
            tls: None,
            ssl: None,
            mail: MailConfig::default(),
        }
    }

    /// Load `<dir>/<name>`, appending `.toml` when the name has no extension
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = Self::config_path(dir, name);
        if !path.exists() {
            return Err(Error::ConfigNotFound { path });
        }

        debug!("Loading server config from {}", path.display());
        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path(dir: &Path, name: &str) -> PathBuf {
        let file = Path::new(name);
        if file.extension().is_some() {
            dir.join(file)
        } else {
            dir.join(format!("{}.toml", name))
        }
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() && self.repset_hosts.is_none() {
            return Err(Error::Configuration {
                reason: "host must be set".to_string(),
            });
        }
        if self.auth && self.user.is_none() {
            return Err(Error::Configuration {
                reason: "auth is enabled but no user is set".to_string(),
            });
        }
        Ok(())
    }

    /// Password to feed on stdin, when authentication is in use
    pub fn credential(&self) -> Option<Credential> {
        match (&self.password, self.auth) {
            (Some(password), true) => Some(Credential::new(password.clone())),
            _ => None,
        }
    }
}

/// Secret handed to a child process on stdin; wiped on drop and never
/// printed by `Debug`.
#[derive(Clone)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(secret: String) -> Self {
        Self(Zeroizing::new(secret))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
