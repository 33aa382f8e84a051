//! Post-processing of the log and error files a tool run leaves behind.

use crate::mail::Mail;
use crate::runner::OutputFiles;
use crate::Result;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Header placed before error lines in the notification
pub const ERROR_HEADER: &str = "Error messages detected during dump:";

/// Lines of a text file; a missing file reads as empty. Invalid UTF-8 is
/// replaced rather than rejected.
pub async fn file_lines(path: &Path) -> Result<Vec<String>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Echo the log to the console unless `suppress`, and always copy it into
/// the mail buffer.
pub async fn process_log_file(log: &Path, suppress: bool, mail: Option<&mut Mail>) -> Result<()> {
    let lines = file_lines(log).await?;
    if lines.is_empty() {
        return Ok(());
    }

    if !suppress {
        for line in &lines {
            println!("{}", line);
        }
    }

    if let Some(mail) = mail {
        for line in lines {
            mail.add_line(line);
        }
    }
    Ok(())
}

/// Inspect the error file. An empty file is removed and `None` returned;
/// otherwise its lines are echoed and mailed, and the failure message is
/// returned.
pub async fn process_err_file(err: &Path, mut mail: Option<&mut Mail>) -> Result<Option<String>> {
    let lines = file_lines(err).await?;
    if lines.is_empty() {
        match tokio::fs::remove_file(err).await {
            Ok(()) => debug!("Removed empty error file {}", err.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        return Ok(None);
    }

    if let Some(mail) = mail.as_deref_mut() {
        mail.add_line(ERROR_HEADER);
    }
    for line in lines {
        println!("{}", line);
        if let Some(mail) = mail.as_deref_mut() {
            mail.add_line(line);
        }
    }

    Ok(Some(format!("Error detected in error file: {}", err.display())))
}

/// Process both files of a run, then flush the buffer once. Returns the
/// failure message, if the tool reported errors.
pub async fn process_outputs(
    files: &OutputFiles,
    suppress: bool,
    mut mail: Option<&mut Mail>,
) -> Result<Option<String>> {
    process_log_file(&files.log, suppress, mail.as_deref_mut()).await?;
    let failure = process_err_file(&files.err, mail.as_deref_mut()).await?;

    if let Some(mail) = mail {
        mail.flush().await;
    }
    Ok(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::tests::RecordingTransport;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn files(dir: &Path) -> OutputFiles {
        OutputFiles {
            log: dir.join("dump.log"),
            err: dir.join("dump.err"),
        }
    }

    #[tokio::test]
    async fn test_empty_error_file_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let files = files(temp_dir.path());
        fs::write(&files.log, "").unwrap();
        fs::write(&files.err, "").unwrap();

        let failure = process_outputs(&files, false, None).await.unwrap();

        assert_eq!(failure, None);
        assert!(!files.err.exists());
        assert!(files.log.exists());
    }

    #[tokio::test]
    async fn test_error_lines_are_mailed_with_header() {
        let temp_dir = TempDir::new().unwrap();
        let files = files(temp_dir.path());
        fs::write(&files.log, "").unwrap();
        fs::write(&files.err, "L1\nL2\n").unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let mut mail = Mail::new(vec!["ops@example.com".into()], "s", transport.clone());

        let failure = process_outputs(&files, true, Some(&mut mail)).await.unwrap();

        let message = failure.unwrap();
        assert!(message.contains(&files.err.display().to_string()));
        assert!(files.err.exists());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, format!("{}\nL1\nL2", ERROR_HEADER));
    }

    #[tokio::test]
    async fn test_log_is_mailed_even_when_suppressed() {
        let temp_dir = TempDir::new().unwrap();
        let files = files(temp_dir.path());
        fs::write(&files.log, "writing db.coll\ndone dumping\n").unwrap();
        fs::write(&files.err, "").unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let mut mail = Mail::new(vec!["ops@example.com".into()], "s", transport.clone());

        let failure = process_outputs(&files, true, Some(&mut mail)).await.unwrap();

        assert_eq!(failure, None);
        assert_eq!(transport.sent()[0].body, "writing db.coll\ndone dumping");
    }

    #[tokio::test]
    async fn test_nothing_to_mail() {
        let temp_dir = TempDir::new().unwrap();
        let files = files(temp_dir.path());
        let transport = Arc::new(RecordingTransport::default());
        let mut mail = Mail::new(vec!["ops@example.com".into()], "s", transport.clone());

        // Neither file exists.
        let failure = process_outputs(&files, false, Some(&mut mail)).await.unwrap();

        assert_eq!(failure, None);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_error_output_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let files = files(temp_dir.path());
        fs::write(&files.log, b"progress \xff\n").unwrap();
        fs::write(&files.err, b"bad \xfe byte\n").unwrap();

        let failure = process_outputs(&files, true, None).await.unwrap();

        assert!(failure.unwrap().starts_with("Error detected in error file:"));
        assert_eq!(
            file_lines(&files.err).await.unwrap(),
            vec!["bad \u{fffd} byte".to_string()]
        );
    }
}
