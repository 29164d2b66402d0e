use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on decompressed document content, as a multiple of the upload limit
pub const EXTRACTION_RATIO: usize = 8;

/// Runtime configuration for the conversion service
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Maximum upload size in bytes (default: 100 MB)
    pub max_file_size: usize,

    /// Upper bound on bytes decompressed from one uploaded package
    /// (default: 8 x max_file_size)
    pub max_extracted_size: usize,

    /// Conversion engine: "docling" or "native" (default: "docling")
    pub engine: String,

    /// Command used to invoke the docling CLI (default: "docling")
    pub docling_command: String,

    /// Directory where uploads are staged before conversion (default: OS temp dir)
    pub staging_dir: PathBuf,

    /// File name prefix for staged uploads (default: "md-upload-")
    pub staging_prefix: String,

    /// Staged files older than this are treated as orphans (default: 3600s)
    pub staging_max_age_secs: u64,

    /// Interval between orphan sweeps (default: 600s)
    pub sweep_interval_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100 MB
            max_extracted_size: EXTRACTION_RATIO * 100 * 1024 * 1024,
            engine: "docling".to_string(),
            docling_command: "docling".to_string(),
            staging_dir: env::temp_dir(),
            staging_prefix: "md-upload-".to_string(),
            staging_max_age_secs: 3600,
            sweep_interval_secs: 600,
        }
    }
}

impl ConverterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();
        let max_file_size = env::var("MAX_FILE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.max_file_size);

        Self {
            max_file_size,

            max_extracted_size: env::var("MAX_EXTRACTED_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| max_file_size.saturating_mul(EXTRACTION_RATIO)),

            engine: env::var("CONVERTER_ENGINE")
                .map(|v| v.trim().to_lowercase())
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(default.engine),

            docling_command: env::var("DOCLING_COMMAND").unwrap_or(default.docling_command),

            staging_dir: env::var("STAGING_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            staging_prefix: env::var("STAGING_PREFIX")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(default.staging_prefix),

            staging_max_age_secs: env::var("STAGING_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.staging_max_age_secs),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sweep_interval_secs),
        }
    }

    /// Create config for development (native engine, small limits, frequent sweeps)
    pub fn development() -> Self {
        Self {
            max_file_size: 16 * 1024 * 1024,
            max_extracted_size: EXTRACTION_RATIO * 16 * 1024 * 1024,
            engine: "native".to_string(),
            staging_max_age_secs: 300,
            sweep_interval_secs: 60,
            ..Self::default()
        }
    }

    pub fn staging_max_age(&self) -> Duration {
        Duration::from_secs(self.staging_max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero interval would spin the sweeper
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Request body limit, leaving room for multipart framing around the file
    pub fn body_limit(&self) -> usize {
        self.max_file_size.saturating_add(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.max_extracted_size, 800 * 1024 * 1024);
        assert_eq!(config.engine, "docling");
        assert_eq!(config.docling_command, "docling");
        assert_eq!(config.staging_prefix, "md-upload-");
        assert_eq!(config.staging_dir, env::temp_dir());
    }

    #[test]
    fn test_development_config() {
        let config = ConverterConfig::development();
        assert_eq!(config.engine, "native");
        assert_eq!(config.max_file_size, 16 * 1024 * 1024);
        assert_eq!(config.max_extracted_size, 128 * 1024 * 1024);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_body_limit_includes_multipart_overhead() {
        let config = ConverterConfig {
            max_file_size: 10,
            ..ConverterConfig::default()
        };
        assert_eq!(config.body_limit(), 10 + 1024 * 1024);
    }

    #[test]
    fn test_zero_sweep_interval_is_clamped() {
        let config = ConverterConfig {
            sweep_interval_secs: 0,
            ..ConverterConfig::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
