//! `mongodump` and `mongoexport` runs.

use super::{Action, ActionReport, RunContext, MISSING_OUTPUT};
use crate::command::{CommandBuilder, DumpCommand};
use crate::output::process_outputs;
use crate::runner::{run_command, OutputFiles};
use crate::server::Database;
use crate::Result;
use tracing::debug;

/// Reported when an export is missing its database or collection
pub const MISSING_COLLECTION: &str = "Error: Missing -b or -t option or value.";

/// Dump the server into the `-o` directory with `mongodump`
pub async fn mongo_dump(server: &dyn Database, ctx: &mut RunContext<'_>) -> Result<ActionReport> {
    let Some(out_dir) = ctx.output_dir() else {
        return Ok(ActionReport::Failed(MISSING_OUTPUT.to_string()));
    };

    let stem = format!("dump_{}", ctx.now.format("%Y%m%d_%H%M%S"));
    let files = OutputFiles {
        log: out_dir.join(format!("{}.log", stem)),
        err: out_dir.join(format!("{}.err", stem)),
    };

    let cmd = command_for(Action::MongoDump, server, ctx).build(ctx.flags);
    mongo_generic(&cmd, &files, ctx).await
}

/// Export one collection to `export_<db>_<coll>.json` in the `-o` directory
pub async fn mongo_export(server: &dyn Database, ctx: &mut RunContext<'_>) -> Result<ActionReport> {
    let Some(out_dir) = ctx.output_dir() else {
        return Ok(ActionReport::Failed(MISSING_OUTPUT.to_string()));
    };
    let (Some(db), Some(coll)) = (ctx.flags.value("-b"), ctx.flags.value("-t")) else {
        return Ok(ActionReport::Failed(MISSING_COLLECTION.to_string()));
    };

    let name = format!("export_{}_{}", db, coll);
    let stem = format!("{}_{}", name, ctx.now.format("%Y%m%d_%H%M%S"));
    let files = OutputFiles {
        log: out_dir.join(format!("{}.log", stem)),
        err: out_dir.join(format!("{}.err", stem)),
    };
    let out_file = out_dir.join(format!("{}.json", name));

    let cmd = command_for(Action::MongoExport, server, ctx)
        .with_override("-o", out_file.display().to_string())
        .build(ctx.flags);
    mongo_generic(&cmd, &files, ctx).await
}

fn command_for<'a>(
    action: Action,
    server: &'a dyn Database,
    ctx: &RunContext<'a>,
) -> CommandBuilder<'a> {
    CommandBuilder::new(action.program().unwrap_or_default(), server.config())
        .with_bin_dir(ctx.bin_dir())
        .with_table(action.table())
        .with_extra(ctx.req_args.iter().cloned())
}

/// Run a built tool command and judge the result from its output files.
/// A tool that cannot be started is an `Err`, not a failed report.
pub async fn mongo_generic(
    cmd: &DumpCommand,
    files: &OutputFiles,
    ctx: &mut RunContext<'_>,
) -> Result<ActionReport> {
    let code = run_command(cmd, files).await?;
    debug!("{} finished with exit code {:?}", cmd.program(), code);

    let suppress = ctx.suppress();
    let failure = process_outputs(files, suppress, ctx.mail.as_mut()).await?;
    Ok(ActionReport::from(failure))
}
