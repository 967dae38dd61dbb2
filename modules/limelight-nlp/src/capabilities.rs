//! Runtime capability probe. Which optional components are active is
//! decided once at process start and logged; the fallbacks are the
//! default paths, so an absent capability is not an error.

use limelight_common::PipelineError;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub transformer_sentiment: bool,
    pub embedding_themes: bool,
}

impl Capabilities {
    pub async fn probe(sentiment_endpoint: Option<&str>, embedding_api_key: &str) -> Self {
        let transformer_sentiment = match sentiment_endpoint {
            Some(endpoint) => {
                let scorer = crate::sentiment::RemoteSentiment::new(endpoint.to_string());
                let up = scorer.probe().await;
                if !up {
                    let e = PipelineError::ModelUnavailable(format!(
                        "sentiment endpoint {endpoint} did not answer the probe"
                    ));
                    warn!(error = %e, "Falling back to lexicon sentiment");
                }
                up
            }
            None => false,
        };
        let embedding_themes = !embedding_api_key.is_empty();

        let caps = Self {
            transformer_sentiment,
            embedding_themes,
        };
        info!(
            transformer_sentiment = caps.transformer_sentiment,
            embedding_themes = caps.embedding_themes,
            "Capability probe complete"
        );
        caps
    }
}
