use crate::api::error::AppError;
use crate::config::ConverterConfig;
use dashmap::DashSet;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

/// Longest extension carried over from the upload's filename
const MAX_SUFFIX_LEN: usize = 16;

/// A request-scoped copy of an upload on disk.
///
/// The file is removed when this handle is dropped, so every exit path of the
/// owning request releases it, including cancellation of the request future.
#[derive(Debug)]
pub struct StagedFile {
    path: Option<TempPath>,
    size: u64,
    in_flight: InFlight,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        // Only `None` after cleanup/drop, both of which consume the handle
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the file now. Failures are logged, never returned.
    pub fn cleanup(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(path) = self.path.take() else { return };
        let owned = path.to_path_buf();
        match path.close() {
            Ok(()) => tracing::debug!("🧹 Removed staged file {}", owned.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Staged file {} was already gone", owned.display())
            }
            Err(e) => tracing::warn!("Failed to remove staged file {}: {}", owned.display(), e),
        }
        self.in_flight.remove(&owned);
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.release();
    }
}

/// Paths of staged files still owned by a request in this process
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<DashSet<PathBuf>>);

impl InFlight {
    fn insert(&self, path: &Path) {
        self.0.insert(path.to_path_buf());
    }

    fn remove(&self, path: &Path) {
        self.0.remove(path);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `name` is a live staged file or derived from one
    /// (engine output named after the staged file).
    pub fn holds(&self, name: &OsStr) -> bool {
        let name = name.to_string_lossy();
        self.0.iter().any(|path| {
            path.file_name()
                .is_some_and(|live| name.starts_with(live.to_string_lossy().as_ref()))
        })
    }
}

/// Writes uploads into uniquely named files under the staging directory
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
    prefix: String,
    in_flight: InFlight,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            in_flight: InFlight::default(),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(&config.staging_dir, &config.staging_prefix)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Write the upload to a fresh staged file. The file is complete and
    /// closed when this returns.
    pub async fn stage(&self, filename: &str, bytes: &[u8]) -> Result<StagedFile, AppError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create staging dir: {}", e)))?;

        let suffix = staging_suffix(filename);
        let temp_file = tempfile::Builder::new()
            .prefix(&self.prefix)
            .suffix(&suffix)
            .tempfile_in(&self.dir)
            .map_err(|e| AppError::Internal(format!("Failed to create staged file: {}", e)))?;

        // Track the path first so a failed write still removes the file
        let (file, path) = temp_file.into_parts();
        self.in_flight.insert(&path);
        let staged = StagedFile {
            path: Some(path),
            size: bytes.len() as u64,
            in_flight: self.in_flight.clone(),
        };

        let mut file = tokio::fs::File::from_std(file);
        file.write_all(bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write staged file: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to flush staged file: {}", e)))?;
        drop(file);

        tracing::debug!(
            "Staged {} ({} bytes) at {}",
            filename,
            staged.size,
            staged.path().display()
        );
        Ok(staged)
    }
}

/// Keep the upload's extension so engines can detect the format from the
/// staged path. Anything that is not a short alphanumeric extension is dropped.
fn staging_suffix(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty() && e.len() <= MAX_SUFFIX_LEN && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_stage_writes_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), "md-upload-");

        let staged = stager.stage("Report.PDF", b"%PDF-1.4 body").await.unwrap();
        let name = staged.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("md-upload-"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(staged.size(), 13);
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), "md-upload-");

        let staged = stager.stage("a.txt", b"hello").await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
        assert!(entries(dir.path()).is_empty());
        assert!(stager.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_tracks_live_files() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), "md-upload-");

        let staged = stager.stage("a.pdf", b"x").await.unwrap();
        let name = staged.path().file_name().unwrap().to_os_string();
        assert_eq!(stager.in_flight().len(), 1);
        assert!(stager.in_flight().holds(&name));

        // Output directories named after the staged file count as held
        let mut derived = name.clone();
        derived.push(".docling-abc");
        assert!(stager.in_flight().holds(&derived));
        assert!(!stager.in_flight().holds(OsStr::new("md-upload-other.pdf")));

        staged.cleanup();
        assert!(!stager.in_flight().holds(&name));
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), "md-upload-");

        let staged = stager.stage("a.txt", b"hello").await.unwrap();
        std::fs::remove_file(staged.path()).unwrap();
        staged.cleanup();
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_stages_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), "md-upload-");

        let (a, b) = tokio::join!(stager.stage("x.md", b"one"), stager.stage("x.md", b"two"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), b"one");
        assert_eq!(std::fs::read(b.path()).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_stage_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/staging");
        let stager = Stager::new(&nested, "md-upload-");

        let staged = stager.stage("a.txt", b"x").await.unwrap();
        assert!(staged.path().starts_with(&nested));
    }

    #[test]
    fn test_staging_suffix() {
        assert_eq!(staging_suffix("report.DOCX"), ".docx");
        assert_eq!(staging_suffix("../../etc/passwd"), "");
        assert_eq!(staging_suffix("archive.tar.gz"), ".gz");
        assert_eq!(staging_suffix("weird.e x e"), "");
        assert_eq!(staging_suffix("noext"), "");
    }
}
