//! Filesystem level backup: fsync lock the server, copy its data files,
//! unlock.

use super::{ActionReport, RunContext, MISSING_OUTPUT};
use crate::server::Database;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const PREVIOUSLY_LOCKED: &str = "Error: Database previously locked, unable to dump.";
pub const UNABLE_TO_LOCK: &str = "Error: Unable to lock the database for dump to occur.";
pub const STILL_LOCKED: &str = "Warning: Database still locked after dump.";
pub const NO_DB_PATH: &str = "Error: Database data path is not known.";
pub const LOCK_STATE_UNKNOWN: &str = "Error: Unable to read the database lock state.";

/// Notification line placed before the failure message
pub const SYNC_HEADER: &str = "Error/Warning detected in database dump.";

/// Copy the data files while holding the server's fsync lock. Failures are
/// mailed straight away rather than at the end of the run.
pub async fn sync_cp_dump(server: &mut dyn Database, ctx: &mut RunContext<'_>) -> Result<ActionReport> {
    let report = lock_and_copy(server, ctx).await;

    if let (ActionReport::Failed(message), Some(mail)) = (&report, ctx.mail.as_mut()) {
        mail.add_line(SYNC_HEADER);
        mail.add_line(message.clone());
        mail.flush().await;
    }
    Ok(report)
}

async fn lock_and_copy(server: &mut dyn Database, ctx: &RunContext<'_>) -> ActionReport {
    let Some(out_dir) = ctx.output_dir() else {
        return ActionReport::Failed(MISSING_OUTPUT.to_string());
    };
    let Some(db_path) = server.db_path().map(Path::to_path_buf) else {
        return ActionReport::Failed(NO_DB_PATH.to_string());
    };

    match server.is_locked().await {
        Ok(false) => {}
        Ok(true) => return ActionReport::Failed(PREVIOUSLY_LOCKED.to_string()),
        Err(e) => return ActionReport::Failed(format!("{} {}", LOCK_STATE_UNKNOWN, e)),
    }

    if let Err(e) = server.lock_db().await {
        warn!("Lock request failed: {}", e);
    }
    // Once a lock has been requested every exit path goes through release().
    match server.is_locked().await {
        Ok(true) => {}
        Ok(false) => return ActionReport::Failed(UNABLE_TO_LOCK.to_string()),
        Err(e) => {
            warn!("Lock state query failed after lock request: {}", e);
            let message = format!("{} {}", UNABLE_TO_LOCK, e);
            return ActionReport::Failed(with_warning(message, release(server).await));
        }
    }

    let dest = out_dir.join(format!("cp_dump_{}", ctx.now.format("%Y%m%d_%H%M")));
    info!("Copying {} to {}", db_path.display(), dest.display());
    let copied = copy_in_background(db_path, dest).await;
    let warning = release(server).await;

    match (copied, warning) {
        (Ok(files), None) => {
            info!("Copied {} files", files);
            ActionReport::Completed
        }
        (Ok(_), Some(warning)) => ActionReport::Failed(warning),
        (Err(e), warning) => {
            ActionReport::Failed(with_warning(format!("Error: Database copy failed: {}", e), warning))
        }
    }
}

/// Request an unlock and confirm it. Returns the still-locked warning when
/// the server cannot be shown to be unlocked.
async fn release(server: &mut dyn Database) -> Option<String> {
    if let Err(e) = server.unlock_db().await {
        warn!("Unlock request failed: {}", e);
    }
    match server.is_locked().await {
        Ok(false) => None,
        Ok(true) => Some(STILL_LOCKED.to_string()),
        Err(e) => {
            warn!("Lock state query failed after unlock request: {}", e);
            Some(format!("{} {}", STILL_LOCKED, e))
        }
    }
}

fn with_warning(mut message: String, warning: Option<String>) -> String {
    if let Some(warning) = warning {
        message.push('\n');
        message.push_str(&warning);
    }
    message
}

async fn copy_in_background(src: PathBuf, dest: PathBuf) -> Result<u64> {
    tokio::task::spawn_blocking(move || copy_tree(&src, &dest))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

/// Recursively copy `src` into the new directory `dest`. Symlinks are
/// recreated, not followed. Returns the number of files copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<u64> {
    if dest.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        )));
    }

    let mut files = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::tests::{fixed_now, FakeServer};
    use crate::flags::FlagSet;
    use crate::mail::tests::RecordingTransport;
    use crate::mail::Mail;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        data: PathBuf,
        out: PathBuf,
        flags: FlagSet,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");
        let out = temp_dir.path().join("out");
        fs::create_dir_all(data.join("journal")).unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(data.join("collection-0.wt"), b"wiredtiger").unwrap();
        fs::write(data.join("journal").join("log.1"), b"journal").unwrap();

        let flags = FlagSet::new()
            .with_switch("-A")
            .with_value("-o", out.to_str().unwrap());
        Fixture {
            _temp_dir: temp_dir,
            data,
            out,
            flags,
        }
    }

    fn copy_dir(out: &Path) -> PathBuf {
        out.join("cp_dump_20240309_1405")
    }

    #[tokio::test]
    async fn test_successful_copy() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        let mut ctx = RunContext::new(&fx.flags, fixed_now());

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert_eq!(report, ActionReport::Completed);
        assert!(!server.locked);
        let dest = copy_dir(&fx.out);
        assert_eq!(fs::read(dest.join("collection-0.wt")).unwrap(), b"wiredtiger");
        assert_eq!(fs::read(dest.join("journal").join("log.1")).unwrap(), b"journal");
    }

    #[tokio::test]
    async fn test_previously_locked() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        server.locked = true;
        let mut ctx = RunContext::new(&fx.flags, fixed_now());

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert_eq!(report, ActionReport::Failed(PREVIOUSLY_LOCKED.to_string()));
        assert!(!copy_dir(&fx.out).exists());
        assert!(!server.calls.contains(&"lock"));
    }

    #[tokio::test]
    async fn test_unable_to_lock() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        server.lock_works = false;
        let mut ctx = RunContext::new(&fx.flags, fixed_now());

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert_eq!(report, ActionReport::Failed(UNABLE_TO_LOCK.to_string()));
        assert!(!copy_dir(&fx.out).exists());
    }

    #[tokio::test]
    async fn test_still_locked_after_copy() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        server.unlock_works = false;
        let mut ctx = RunContext::new(&fx.flags, fixed_now());

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert_eq!(report, ActionReport::Failed(STILL_LOCKED.to_string()));
        assert!(copy_dir(&fx.out).join("collection-0.wt").exists());
    }

    #[tokio::test]
    async fn test_copy_failure_still_unlocks() {
        let fx = fixture();
        fs::create_dir_all(copy_dir(&fx.out)).unwrap();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        let mut ctx = RunContext::new(&fx.flags, fixed_now());

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert!(report
            .message()
            .unwrap()
            .starts_with("Error: Database copy failed:"));
        assert!(server.calls.contains(&"unlock"));
        assert!(!server.locked);
    }

    #[tokio::test]
    async fn test_missing_data_path() {
        let fx = fixture();
        let mut server = FakeServer::new(None);
        let mut ctx = RunContext::new(&fx.flags, fixed_now());

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert_eq!(report, ActionReport::Failed(NO_DB_PATH.to_string()));
        assert!(server.calls.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_mailed_immediately() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        server.locked = true;
        let transport = Arc::new(RecordingTransport::default());
        let mail = Mail::new(vec!["ops@example.com".into()], "db1", transport.clone());
        let mut ctx = RunContext::new(&fx.flags, fixed_now()).with_mail(Some(mail));

        sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, format!("{}\n{}", SYNC_HEADER, PREVIOUSLY_LOCKED));
    }

    #[tokio::test]
    async fn test_success_sends_no_mail() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        let transport = Arc::new(RecordingTransport::default());
        let mail = Mail::new(vec!["ops@example.com".into()], "db1", transport.clone());
        let mut ctx = RunContext::new(&fx.flags, fixed_now()).with_mail(Some(mail));

        sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_lock_query_failure_still_unlocks() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        server.failing_query = Some(2);
        let transport = Arc::new(RecordingTransport::default());
        let mail = Mail::new(vec!["ops@example.com".into()], "db1", transport.clone());
        let mut ctx = RunContext::new(&fx.flags, fixed_now()).with_mail(Some(mail));

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert_eq!(
            server.calls,
            vec!["is_locked", "lock", "is_locked", "unlock", "is_locked"]
        );
        assert!(!server.locked);
        assert!(report.message().unwrap().starts_with(UNABLE_TO_LOCK));
        assert!(!copy_dir(&fx.out).exists());
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_unlock_query_failure_reports_still_locked() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        server.failing_query = Some(3);
        let mut ctx = RunContext::new(&fx.flags, fixed_now());

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert!(server.calls.contains(&"unlock"));
        assert!(report.message().unwrap().starts_with(STILL_LOCKED));
        assert!(copy_dir(&fx.out).join("collection-0.wt").exists());
    }

    #[tokio::test]
    async fn test_initial_query_failure_is_mailed() {
        let fx = fixture();
        let mut server = FakeServer::new(Some(fx.data.clone()));
        server.failing_query = Some(1);
        let transport = Arc::new(RecordingTransport::default());
        let mail = Mail::new(vec!["ops@example.com".into()], "db1", transport.clone());
        let mut ctx = RunContext::new(&fx.flags, fixed_now()).with_mail(Some(mail));

        let report = sync_cp_dump(&mut server, &mut ctx).await.unwrap();

        assert!(report.message().unwrap().starts_with(LOCK_STATE_UNKNOWN));
        assert!(!server.calls.contains(&"lock"));
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_copy_tree_keeps_symlinks() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src)?;
        fs::write(src.join("a.wt"), b"a")?;
        std::os::unix::fs::symlink("a.wt", src.join("link.wt"))?;

        let dest = temp_dir.path().join("dest");
        let copied = copy_tree(&src, &dest)?;

        assert_eq!(copied, 1);
        assert_eq!(fs::read_link(dest.join("link.wt"))?, PathBuf::from("a.wt"));
        Ok(())
    }
}
