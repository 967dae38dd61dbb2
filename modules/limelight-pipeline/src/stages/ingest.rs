//! Stage 1: pull raw items from every enabled source, best-effort.
//! A failed source logs, records an error note, and contributes nothing;
//! the run continues.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use limelight_common::{DailyWindow, PipelineError, SourceItem};
use limelight_ingest::{IngestError, SourceAdapter};
use tracing::{error, info};

pub struct IngestOutput {
    pub items: Vec<SourceItem>,
    pub source_counts: HashMap<String, i64>,
    pub source_errors: HashMap<String, String>,
}

pub async fn run(
    adapters: &[Box<dyn SourceAdapter>],
    window: &DailyWindow,
    workers: usize,
) -> IngestOutput {
    let fetches = adapters.iter().map(|adapter| async move {
        let name = adapter.name();
        match adapter.fetch(window).await {
            Ok(items) => (name, Ok(items)),
            Err(e) => (name, Err(e)),
        }
    });
    let results: Vec<_> = stream::iter(fetches)
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut output = IngestOutput {
        items: Vec::new(),
        source_counts: HashMap::new(),
        source_errors: HashMap::new(),
    };
    for (name, result) in results {
        match result {
            Ok(items) => {
                info!(source = name, items = items.len(), "Source ingested");
                output.source_counts.insert(name.to_string(), items.len() as i64);
                output.items.extend(items);
            }
            Err(e) => {
                let classified = classify(name, e);
                error!(source = name, error = %classified, "Source ingest failed, continuing");
                output.source_counts.insert(name.to_string(), 0);
                output
                    .source_errors
                    .insert(name.to_string(), classified.to_string());
            }
        }
    }

    // Deterministic order regardless of fetch completion order.
    output.items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
    output
}

/// Adapter errors land in run metrics under the pipeline taxonomy: a
/// malformed payload is distinguishable from an unreachable source.
fn classify(source: &str, e: IngestError) -> PipelineError {
    match e {
        IngestError::Parse(message) => PipelineError::PayloadParse {
            source_name: source.to_string(),
            message,
        },
        other => PipelineError::SourceFetch {
            source_name: source.to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use limelight_common::Source;
    use limelight_ingest::IngestError;

    struct StubAdapter {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(
            &self,
            _window: &DailyWindow,
        ) -> limelight_ingest::Result<Vec<SourceItem>> {
            if self.fail {
                return Err(IngestError::Auth("no credentials".into()));
            }
            Ok(vec![SourceItem {
                item_id: format!("{}_1", self.name),
                source: Source::Reddit,
                url: String::new(),
                published_at: Utc::now(),
                fetched_at: Utc::now(),
                title: "t".into(),
                description: String::new(),
                author: None,
                engagement: Default::default(),
                raw_payload: serde_json::Value::Null,
            }])
        }
    }

    #[tokio::test]
    async fn failed_source_recorded_but_run_continues() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(StubAdapter {
                name: "good",
                fail: false,
            }),
            Box::new(StubAdapter {
                name: "bad",
                fail: true,
            }),
        ];
        let window = DailyWindow {
            start: Utc.with_ymd_and_hms(2026, 8, 1, 13, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 8, 2, 13, 0, 0).unwrap(),
        };
        let out = run(&adapters, &window, 4).await;
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.source_counts["good"], 1);
        assert_eq!(out.source_counts["bad"], 0);
        assert!(out.source_errors["bad"].contains("Authentication"));
    }
}
