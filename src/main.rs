//! mongo_db_dump - MongoDB dump orchestrator
//!
//! Main binary entry point for the command-line interface.

use anyhow::Context;
use mongo_db_dump::cli;
use mongo_db_dump::lock::ProgramLock;
use mongo_db_dump::{logging, run_program, Error, MailxTransport, MongoServer, ServerConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    logging::init_logging();
    let (cli, flags) = cli::parse_args();

    if cli.version {
        println!("mongo_db_dump {}", mongo_db_dump::VERSION);
        return Ok(ExitCode::SUCCESS);
    }

    if let Err(e) = cli::rules().check(&flags) {
        eprintln!("Error: {}", e);
        eprintln!("{}", cli::usage());
        return Ok(ExitCode::from(2));
    }

    let flavor = cli.flavor.clone().unwrap_or_default();
    let _lock = match ProgramLock::acquire(&flavor) {
        Ok(lock) => lock,
        Err(Error::LockHeld { .. }) => {
            println!("WARNING: Lock in place for mongo_db_dump with id: {}", flavor);
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e).context("Unable to take the program lock"),
    };

    // Presence of both is guaranteed by the option rules.
    let config_dir = cli.config_dir.as_deref().unwrap_or(".");
    let config_name = cli.config.as_deref().unwrap_or_default();
    let config = ServerConfig::load(Path::new(config_dir), config_name)
        .context("Unable to load the server configuration")?;

    let transport = Arc::new(MailxTransport::new(config.mail.program.clone()));
    let mut server = MongoServer::new(config, cli.bin_dir.as_ref().map(PathBuf::from));

    match run_program(&flags, &mut server, transport).await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(Error::Connection { reason }) => {
            println!("Connection failure: {}", reason);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("Dump run failed"),
    }
}
