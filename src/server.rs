//! Server handle used by the dump actions.
//!
//! Connection checks and fsync lock control go through the mongo shell with
//! the same connection flags and stdin credential as the dump tools.

use crate::command::{connection_args, required_options, DumpCommand, PasswordMode, REQUIRED_OPTIONS};
use crate::config::ServerConfig;
use crate::runner::run_capture;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Operations the dispatcher and actions need from a database server
#[async_trait]
pub trait Database: Send {
    fn config(&self) -> &ServerConfig;

    /// Directory of the server's data files, known after connecting
    fn db_path(&self) -> Option<&Path>;

    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self);

    /// Query the server's fsync lock state
    async fn is_locked(&mut self) -> Result<bool>;

    /// Request the fsync lock. Callers confirm with [`Database::is_locked`].
    async fn lock_db(&mut self) -> Result<()>;

    async fn unlock_db(&mut self) -> Result<()>;

    fn name(&self) -> &str {
        &self.config().name
    }
}

const PING: &str = "print(db.adminCommand({ ping: 1 }).ok)";
const DB_PATH: &str = "print(db.adminCommand({ getCmdLineOpts: 1 }).parsed.storage.dbPath)";
const LOCK_STATE: &str = "print(db.currentOp().fsyncLock === true)";
const LOCK: &str = "print(db.fsyncLock().ok)";
const UNLOCK: &str = "print(db.fsyncUnlock().ok)";

/// MongoDB server driven through `mongosh`
#[derive(Debug)]
pub struct MongoServer {
    config: ServerConfig,
    bin_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    connected: bool,
    locked: bool,
}

impl MongoServer {
    pub fn new(config: ServerConfig, bin_dir: Option<PathBuf>) -> Self {
        let db_path = config.db_path.clone();
        Self {
            config,
            bin_dir,
            db_path,
            connected: false,
            locked: false,
        }
    }

    /// Lock state as of the last query
    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn shell_command(&self, script: &str) -> DumpCommand {
        let program = match &self.bin_dir {
            Some(dir) => dir.join(&self.config.shell).display().to_string(),
            None => self.config.shell.clone(),
        };

        let mut argv = vec![program, "--quiet".to_string()];
        argv.extend(connection_args(&self.config, PasswordMode::Stdin));
        argv.extend(required_options(&self.config, REQUIRED_OPTIONS));
        argv.push("--eval".to_string());
        argv.push(script.to_string());

        DumpCommand {
            argv,
            credential: self.config.credential(),
        }
    }

    /// Run `script` in the shell and return its trimmed stdout
    async fn eval(&self, script: &str) -> Result<String> {
        let output = run_capture(&self.shell_command(script)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Shell {
                reason: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // The last line holds the printed value; earlier lines may be prompts.
        Ok(stdout.lines().last().unwrap_or_default().trim().to_string())
    }

    async fn eval_ok(&self, script: &str) -> Result<()> {
        match self.eval(script).await?.as_str() {
            "1" => Ok(()),
            other => Err(Error::Shell {
                reason: format!("unexpected reply: {}", other),
            }),
        }
    }
}

#[async_trait]
impl Database for MongoServer {
    fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    async fn connect(&mut self) -> Result<()> {
        debug!("Connecting to {}:{}", self.config.host, self.config.port);
        self.eval_ok(PING).await.map_err(|e| Error::Connection {
            reason: e.to_string(),
        })?;
        self.connected = true;
        info!("Connected to {}", self.config.name);

        if self.db_path.is_none() {
            match self.eval(DB_PATH).await {
                Ok(path) if !path.is_empty() && path != "undefined" => {
                    debug!("Server data path is {}", path);
                    self.db_path = Some(PathBuf::from(path));
                }
                Ok(_) => warn!("Server did not report a data path"),
                Err(e) => warn!("Unable to read server data path: {}", e),
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connected {
            debug!("Disconnecting from {}", self.config.name);
        }
        self.connected = false;
    }

    async fn is_locked(&mut self) -> Result<bool> {
        self.locked = self.eval(LOCK_STATE).await? == "true";
        Ok(self.locked)
    }

    async fn lock_db(&mut self) -> Result<()> {
        info!("Requesting fsync lock on {}", self.config.name);
        self.eval_ok(LOCK).await
    }

    async fn unlock_db(&mut self) -> Result<()> {
        info!("Releasing fsync lock on {}", self.config.name);
        self.eval_ok(UNLOCK).await
    }
}
