//! Runs external mongo tools as child processes.

use crate::command::DumpCommand;
use crate::config::Credential;
use crate::{Error, Result};
use std::fs::File;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Log and error capture files for one tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    /// Receives the tool's stderr, where mongo tools write progress
    pub log: PathBuf,
    /// Receives the tool's stdout
    pub err: PathBuf,
}

/// Run `cmd` with stderr going to the log file and stdout to the error file,
/// both truncated first. The exit status is returned for logging only;
/// success is judged from the files.
pub async fn run_command(cmd: &DumpCommand, files: &OutputFiles) -> Result<Option<i32>> {
    let err_file = File::create(&files.err)?;
    let log_file = File::create(&files.log)?;

    info!("Running {} {}", cmd.program(), cmd.args().join(" "));

    let mut command = Command::new(cmd.program());
    command
        .args(cmd.args())
        .stdout(Stdio::from(err_file))
        .stderr(Stdio::from(log_file));

    let mut child = spawn(&mut command, cmd)?;
    feed_credential(&mut child, cmd.credential.as_ref()).await;

    let status = child.wait().await?;
    debug!("{} exited with {:?}", cmd.program(), status.code());
    Ok(status.code())
}

/// Run `cmd` and collect its stdout and stderr
pub async fn run_capture(cmd: &DumpCommand) -> Result<Output> {
    debug!("Running {} {}", cmd.program(), cmd.args().join(" "));

    let mut command = Command::new(cmd.program());
    command
        .args(cmd.args())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = spawn(&mut command, cmd)?;
    feed_credential(&mut child, cmd.credential.as_ref()).await;

    Ok(child.wait_with_output().await?)
}

fn spawn(command: &mut Command, cmd: &DumpCommand) -> Result<Child> {
    let stdin = if cmd.credential.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    command
        .stdin(stdin)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::Launch {
            program: cmd.program().to_string(),
            source,
        })
}

/// Write the secret to the child's stdin and close it. The handle is
/// dropped on every path so the child sees EOF.
async fn feed_credential(child: &mut Child, credential: Option<&Credential>) {
    let (Some(credential), Some(mut stdin)) = (credential, child.stdin.take()) else {
        return;
    };

    let line = Zeroizing::new(format!("{}\n", credential.expose()));
    let written = stdin.write_all(line.as_bytes()).await;
    drop(stdin);

    match written {
        Ok(()) => {}
        // The tool may exit before reading its stdin.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Err(e) => warn!("Failed to pass credential on stdin: {}", e),
    }
}
