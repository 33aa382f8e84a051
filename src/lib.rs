//! # mongo_db_dump
//!
//! Backups of a MongoDB server by running `mongodump` or `mongoexport`, or by
//! copying the server's data files while it holds an fsync lock.
//!
//! ## Flow
//!
//! - **Validation**: command-line flags are checked against declarative
//!   rules before anything runs ([`validate::Rules`])
//! - **Dispatch**: connect, run the selected [`actions::Action`], disconnect
//! - **Tool runs**: the dump tool's stderr goes to a log file and its stdout
//!   to an error file; a non-empty error file marks the run as failed
//! - **Notification**: with `-e`, output is mailed through `mailx`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mongo_db_dump::{run_program, FlagSet, MailxTransport, MongoServer, ServerConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let config = ServerConfig::load(Path::new("config"), "mongo")?;
//! let flags = FlagSet::new().with_switch("-M").with_value("-o", "/db_dump");
//! let mut server = MongoServer::new(config, None);
//!
//! let report = run_program(&flags, &mut server, Arc::new(MailxTransport::default())).await?;
//! println!("Dump failed: {}", report.is_failed());
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod cli;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flags;
pub mod lock;
pub mod logging;
pub mod mail;
pub mod output;
pub mod runner;
pub mod server;
pub mod validate;

// Re-export commonly used types
pub use actions::{Action, ActionReport};
pub use config::ServerConfig;
pub use dispatch::run_program;
pub use error::{Error, Result};
pub use flags::FlagSet;
pub use mail::MailxTransport;
pub use server::{Database, MongoServer};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
