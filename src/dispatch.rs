//! Top level run: connect, run the selected action, disconnect.

use crate::actions::{Action, ActionReport, RunContext};
use crate::command::{required_options, REQUIRED_OPTIONS};
use crate::flags::{FlagSet, FlagValue};
use crate::mail::{Mail, MailTransport};
use crate::server::Database;
use crate::Result;
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use tracing::{info, warn};

/// Run the action selected in `flags` against `server`. The server is
/// always disconnected before returning, whatever the outcome.
pub async fn run_program(
    flags: &FlagSet,
    server: &mut dyn Database,
    transport: Arc<dyn MailTransport>,
) -> Result<ActionReport> {
    run_program_at(flags, server, transport, Local::now().naive_local()).await
}

/// [`run_program`] with an explicit start time
pub async fn run_program_at(
    flags: &FlagSet,
    server: &mut dyn Database,
    transport: Arc<dyn MailTransport>,
    now: NaiveDateTime,
) -> Result<ActionReport> {
    let result = dispatch(flags, server, transport, now).await;
    server.disconnect().await;
    result
}

async fn dispatch(
    flags: &FlagSet,
    server: &mut dyn Database,
    transport: Arc<dyn MailTransport>,
    now: NaiveDateTime,
) -> Result<ActionReport> {
    server.connect().await?;

    let req_args = required_options(server.config(), REQUIRED_OPTIONS);
    let mail = setup_mail(flags, server.name(), now, transport);
    let mut ctx = RunContext::new(flags, now)
        .with_req_args(req_args)
        .with_mail(mail);

    let Some(action) = Action::from_flags(flags) else {
        warn!("No dump action selected");
        return Ok(ActionReport::Completed);
    };

    info!("Running {:?} on {}", action, server.name());
    let report = match action.run(server, &mut ctx).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(mail) = ctx.mail.as_mut() {
                mail.add_line(format!("Error: {}", e));
                mail.flush().await;
            }
            return Err(e);
        }
    };
    if let ActionReport::Failed(message) = &report {
        println!("{}", message);
    }
    Ok(report)
}

/// Mail buffer for `-e`, with the `-s` subject or a default naming the server
fn setup_mail(
    flags: &FlagSet,
    server_name: &str,
    now: NaiveDateTime,
    transport: Arc<dyn MailTransport>,
) -> Option<Mail> {
    let to: Vec<String> = flags
        .get("-e")?
        .values()
        .into_iter()
        .map(str::to_string)
        .collect();

    let subject = match flags.get("-s") {
        Some(FlagValue::Present) | None => default_subject(server_name, now),
        Some(subject) => subject.to_string(),
    };
    Some(Mail::new(to, subject, transport))
}

pub fn default_subject(server_name: &str, now: NaiveDateTime) -> String {
    format!("{}: mongo_db_dump: {}", server_name, now.format("%Y%m%d_%H%M%S"))
}
