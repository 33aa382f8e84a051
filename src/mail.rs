//! Notification buffer and the mail program it is sent through.

use crate::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

/// Delivers a finished message
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<()>;
}

/// Pipes the body into `mailx -s <subject> <to...>`
#[derive(Debug, Clone)]
pub struct MailxTransport {
    program: String,
}

impl MailxTransport {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for MailxTransport {
    fn default() -> Self {
        Self::new("mailx")
    }
}

#[async_trait]
impl MailTransport for MailxTransport {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-s")
            .arg(subject)
            .args(to)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Launch {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(body.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::Mail {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Lines collected during a run, sent as one message
pub struct Mail {
    to: Vec<String>,
    subject: String,
    lines: Vec<String>,
    transport: Arc<dyn MailTransport>,
}

impl Mail {
    pub fn new(to: Vec<String>, subject: impl Into<String>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            to,
            subject: subject.into(),
            lines: Vec::new(),
            transport,
        }
    }

    pub fn add_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Send the buffered lines and clear them. Nothing is sent when empty.
    pub async fn send(&mut self) -> Result<()> {
        if self.lines.is_empty() {
            return Ok(());
        }

        let body = self.lines.join("\n");
        self.transport.send(&self.to, &self.subject, &body).await?;
        info!("Mailed {} lines to {}", self.lines.len(), self.to.join(", "));
        self.lines.clear();
        Ok(())
    }

    /// Like [`Mail::send`], but a delivery failure is only logged
    pub async fn flush(&mut self) {
        if let Err(e) = self.send().await {
            warn!("Unable to send notification: {}", e);
        }
    }
}

impl std::fmt::Debug for Mail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mail")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("lines", &self.lines.len())
            .finish()
    }
}
