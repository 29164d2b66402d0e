use crate::services::staging::{InFlight, Stager};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::sleep;

/// Removes staged files, and engine output directories named after them,
/// left behind by requests that never reached cleanup (process killed or
/// timed out mid-conversion). Entries still owned by a live request are kept
/// regardless of age.
pub struct StagingSweeper {
    dir: PathBuf,
    prefix: String,
    in_flight: InFlight,
    max_age: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl StagingSweeper {
    pub fn new(
        stager: &Stager,
        max_age: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            dir: stager.dir().to_path_buf(),
            prefix: stager.prefix().to_string(),
            in_flight: stager.in_flight().clone(),
            max_age,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Staging sweeper started for {}", self.dir.display());

        loop {
            self.sweep_logged().await;

            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Staging sweeper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {}
            }
        }
    }

    async fn sweep_logged(&self) {
        match self.sweep().await {
            Ok(0) => tracing::debug!("No orphaned staged files"),
            Ok(n) => tracing::info!("🧹 Removed {} orphaned staged file(s)", n),
            Err(e) => tracing::warn!("Staging sweep failed: {}", e),
        }
    }

    /// Delete prefixed entries older than `max_age` that no live request
    /// holds. Returns how many were removed.
    pub async fn sweep(&self) -> std::io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(&self.prefix) {
                continue;
            }

            if self.in_flight.holds(&name) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(m) => m,
                // Removed concurrently by its own request
                Err(_) => continue,
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.max_age {
                continue;
            }

            let removal = if metadata.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await
            } else {
                tokio::fs::remove_file(entry.path()).await
            };
            match removal {
                Ok(()) => {
                    tracing::debug!("Removed orphaned staged entry {}", entry.path().display());
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Failed to remove orphaned staged entry {}: {}",
                    entry.path().display(),
                    e
                ),
            }
        }

        Ok(removed)
    }
}
