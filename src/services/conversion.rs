use crate::api::error::AppError;
use crate::config::ConverterConfig;
use crate::services::converter::{self, DocumentConverter};
use crate::services::staging::StagedFile;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinError;
use tracing::{info, warn};

type EngineFactory =
    dyn Fn() -> Result<Arc<dyn DocumentConverter>, converter::ConverterInitError> + Send + Sync;

/// Process-wide access to the conversion engine.
///
/// The engine is built on first use and shared by every request afterwards.
/// A failed build is not remembered, so a later request tries again.
pub struct ConversionService {
    factory: Box<EngineFactory>,
    engine: OnceCell<Arc<dyn DocumentConverter>>,
    engine_type: String,
}

impl ConversionService {
    pub fn new(config: ConverterConfig) -> Self {
        let engine_type = config.engine.clone();
        Self {
            factory: Box::new(move || converter::create_converter(&config)),
            engine: OnceCell::new(),
            engine_type,
        }
    }

    /// Wrap an already constructed engine
    pub fn with_engine(engine: Arc<dyn DocumentConverter>) -> Self {
        let engine_type = engine.name().to_string();
        Self {
            factory: Box::new(|| {
                Err(converter::ConverterInitError::Unavailable(
                    "engine factory not configured".to_string(),
                ))
            }),
            engine: OnceCell::new_with(Some(engine)),
            engine_type,
        }
    }

    /// Configured engine name, available even before initialization
    pub fn engine_type(&self) -> &str {
        &self.engine_type
    }

    pub fn is_ready(&self) -> bool {
        self.engine.initialized()
    }

    /// The engine if it has already been initialized
    pub fn ready_engine(&self) -> Option<Arc<dyn DocumentConverter>> {
        self.engine.get().cloned()
    }

    /// Get the engine, initializing it if this is the first use
    pub async fn engine(self: &Arc<Self>) -> Result<Arc<dyn DocumentConverter>, AppError> {
        let this = Arc::clone(self);
        self.engine
            .get_or_try_init(|| async move {
                // Checking external tools blocks
                tokio::task::spawn_blocking(move || (this.factory)())
                    .await
                    .map_err(|e| AppError::ConversionUnavailable(e.to_string()))?
                    .map_err(|e| AppError::ConversionUnavailable(e.to_string()))
            })
            .await
            .cloned()
    }

    /// Initialize at startup so the first request does not pay for it
    pub async fn warm_up(self: &Arc<Self>) {
        match self.engine().await {
            Ok(engine) => {
                if engine.health_check().await {
                    info!("📄 Conversion engine '{}' ready", engine.name());
                } else {
                    warn!("⚠️  Conversion engine '{}' failed its health check", engine.name());
                }
            }
            Err(e) => warn!(
                "⚠️  Conversion engine '{}' unavailable: {}. Requests will fail until it can be loaded.",
                self.engine_type, e
            ),
        }
    }

    /// Convert a staged file and render it as Markdown.
    ///
    /// Runs on the blocking pool; the staged file stays owned by the caller.
    pub async fn convert(
        &self,
        engine: Arc<dyn DocumentConverter>,
        staged: &StagedFile,
    ) -> Result<String, AppError> {
        let path = staged.path().to_path_buf();

        tokio::task::spawn_blocking(move || {
            let document = engine.convert(&path)?;
            tracing::debug!(
                "Converted {} as {} ({} blocks)",
                path.display(),
                document.format(),
                document.blocks().len()
            );
            document.export_markdown()
        })
        .await
        .map_err(|e| {
            tracing::error!("Conversion task aborted: {}", e);
            AppError::ConversionFailed(format!("conversion engine aborted: {}", panic_message(e)))
        })?
        .map_err(|e| AppError::ConversionFailed(e.to_string()))
    }
}

fn panic_message(e: JoinError) -> String {
    match e.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string()),
        Err(e) => e.to_string(),
    }
}
