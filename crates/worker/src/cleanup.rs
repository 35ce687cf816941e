//! Periodic removal of stale input images and output videos.
//!
//! Job records expire on their own; the files they point at do not. Files
//! in hot and archive storage older than the retention period are deleted
//! on a fixed interval.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

/// Delete regular files directly under each of `dirs` whose modification
/// time is older than `max_age`. Missing directories are skipped. Returns
/// the number of files removed.
pub async fn cleanup_old_files(dirs: &[PathBuf], max_age: Duration) -> std::io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut deleted = 0;

    for dir in dirs {
        if tokio::fs::metadata(dir).await.is_err() {
            continue;
        }
        deleted += sweep_dir(dir, cutoff).await?;
    }

    Ok(deleted)
}

async fn sweep_dir(dir: &Path, cutoff: SystemTime) -> std::io::Result<usize> {
    let mut deleted = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if modified >= cutoff {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted old file");
                deleted += 1;
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to delete old file"),
        }
    }

    Ok(deleted)
}

/// Run the cleanup loop until `cancel` fires.
pub async fn run(
    dirs: Vec<PathBuf>,
    max_age: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        max_age_days = max_age.as_secs() / 86_400,
        interval_secs = interval.as_secs(),
        "Storage cleanup started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Storage cleanup stopping");
                break;
            }
            _ = ticker.tick() => match cleanup_old_files(&dirs, max_age).await {
                Ok(0) => tracing::debug!("Storage cleanup: nothing to delete"),
                Ok(deleted) => tracing::info!(deleted, "Storage cleanup: removed old files"),
                Err(e) => tracing::error!(error = %e, "Storage cleanup failed"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removes_only_files_older_than_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old_output.mp4");
        let fresh = dir.path().join("fresh_output.mp4");
        std::fs::write(&old, b"x").unwrap();
        std::fs::write(&fresh, b"x").unwrap();

        let week_ago = SystemTime::now() - Duration::from_secs(8 * 86_400);
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(week_ago)
            .unwrap();

        let deleted = cleanup_old_files(&[dir.path().to_path_buf()], Duration::from_secs(7 * 86_400))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn missing_directory_is_skipped() {
        let deleted = cleanup_old_files(
            &[PathBuf::from("/definitely/not/here")],
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn subdirectories_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let deleted = cleanup_old_files(&[dir.path().to_path_buf()], Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(deleted, 0);
        assert!(dir.path().join("nested").exists());
    }
}
