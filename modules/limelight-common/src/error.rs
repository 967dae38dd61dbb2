use thiserror::Error;

/// Error taxonomy for the daily pipeline. Stage boundaries trap and
/// classify; recoverable kinds never fail the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source fetch failed for {source_name}: {message}")]
    SourceFetch {
        source_name: String,
        message: String,
    },

    #[error("Malformed payload from {source_name}: {message}")]
    PayloadParse {
        source_name: String,
        message: String,
    },

    #[error("Document rejected at normalization: {0}")]
    NormalizationReject(String),

    #[error("External baseline call failed: {0}")]
    ExternalBaseline(String),

    #[error("Optional model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invariant violated: {0}")]
    FatalInternal(String),
}

impl PipelineError {
    /// Recoverable errors are logged and counted; the run continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceFetch { .. }
                | PipelineError::PayloadParse { .. }
                | PipelineError::NormalizationReject(_)
                | PipelineError::ExternalBaseline(_)
                | PipelineError::ModelUnavailable(_)
        )
    }
}
