use std::path::PathBuf;

use thiserror::Error;

/// Closed error taxonomy for the translation core (see spec `ERROR HANDLING DESIGN`).
///
/// Recovery policy lives with the caller: per-document kinds are caught and
/// logged by the engine's workers, cluster- and config-level kinds propagate
/// and terminate the run.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid language code: {0}")]
    InvalidLanguageCode(String),

    #[error("language pair {source}-{target} is not available for interpreter {interpreter}")]
    PairUnavailable {
        interpreter: String,
        source: String,
        target: String,
    },

    #[error("timed out waiting for the package download lock at {path}")]
    DownloadLockTimeout { path: PathBuf },

    #[error("translation failed for doc {id}: {source}")]
    TranslationFailure {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to save translation for doc {id}: {source}")]
    SaveFailure {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("work queue full after waiting {waited_secs:.3}s")]
    QueueFull { waited_secs: f64 },

    #[error("translation run aborted by a fatal error: {0}")]
    FatalTranslation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("apertium repository error: {0}")]
    Repository(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
