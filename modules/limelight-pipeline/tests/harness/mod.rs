//! Shared fixtures for pipeline scenario tests: in-memory store, canned
//! source adapters, fixed sentiment. No network, no Docker.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use limelight_common::{
    DailyWindow, Entity, EntityType, SentimentScores, Source, SourceItem, WeightsConfig,
};
use limelight_ingest::SourceAdapter;
use limelight_nlp::{SentimentScorer, ThemeBuilder};
use limelight_pipeline::PipelineDeps;
use limelight_store::Store;

/// Fixed test window: 2026-08-01 6am PT → 2026-08-02 6am PT.
pub fn window() -> DailyWindow {
    DailyWindow {
        start: Utc.with_ymd_and_hms(2026, 8, 1, 13, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 8, 2, 13, 0, 0).unwrap(),
    }
}

pub struct MockAdapter {
    pub tag: &'static str,
    pub items: Vec<SourceItem>,
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        self.tag
    }

    async fn fetch(&self, window: &DailyWindow) -> limelight_ingest::Result<Vec<SourceItem>> {
        Ok(self
            .items
            .iter()
            .filter(|i| window.contains(i.published_at))
            .cloned()
            .collect())
    }
}

/// Scores by keyword so tests can steer per-sentence sentiment.
pub struct KeywordSentiment {
    pub positive: SentimentScores,
    pub negative: SentimentScores,
    pub negative_keyword: &'static str,
}

impl KeywordSentiment {
    pub fn fixed(pos: f64, neu: f64, neg: f64) -> Self {
        Self {
            positive: SentimentScores {
                pos,
                neu,
                neg,
                intensity: 0.5,
            },
            negative: SentimentScores {
                pos,
                neu,
                neg,
                intensity: 0.5,
            },
            negative_keyword: "\u{0}never-matches\u{0}",
        }
    }
}

#[async_trait]
impl SentimentScorer for KeywordSentiment {
    async fn score(&self, sentence: &str) -> SentimentScores {
        if sentence
            .to_lowercase()
            .contains(&self.negative_keyword.to_lowercase())
        {
            self.negative.clone()
        } else {
            self.positive.clone()
        }
    }
}

pub fn reddit_post(id: &str, title: &str, body: &str, score: f64, comments: f64) -> SourceItem {
    SourceItem {
        item_id: format!("reddit_post_{id}"),
        source: Source::Reddit,
        url: format!("https://reddit.com/{id}"),
        published_at: Utc.with_ymd_and_hms(2026, 8, 1, 18, 0, 0).unwrap(),
        fetched_at: Utc::now(),
        title: title.to_string(),
        description: body.to_string(),
        author: Some("user".to_string()),
        engagement: [
            ("score".to_string(), score),
            ("num_comments".to_string(), comments),
        ]
        .into(),
        raw_payload: serde_json::json!({}),
    }
}

pub fn youtube_video(
    id: &str,
    title: &str,
    caption: &str,
    views: f64,
    likes: f64,
    comments: f64,
) -> SourceItem {
    SourceItem {
        item_id: format!("youtube_video_{id}"),
        source: Source::Youtube,
        url: format!("https://youtube.com/watch?v={id}"),
        published_at: Utc.with_ymd_and_hms(2026, 8, 1, 20, 0, 0).unwrap(),
        fetched_at: Utc::now(),
        title: title.to_string(),
        description: caption.to_string(),
        author: Some("channel".to_string()),
        engagement: [
            ("view_count".to_string(), views),
            ("like_count".to_string(), likes),
            ("comment_count".to_string(), comments),
        ]
        .into(),
        raw_payload: serde_json::json!({}),
    }
}

pub async fn seed_entity(
    store: &Store,
    entity_id: &str,
    name: &str,
    entity_type: EntityType,
    aliases: &[&str],
    pinned: bool,
    hints: &[&str],
) {
    store
        .upsert_entity(&Entity {
            entity_id: entity_id.to_string(),
            entity_key: entity_id.to_string(),
            canonical_name: name.to_string(),
            entity_type,
            is_pinned: pinned,
            is_active: true,
            first_seen_at: Some(Utc::now()),
            last_seen_at: None,
            dormant_since: None,
            external_ids: HashMap::new(),
            context_hints: hints.iter().map(|h| h.to_string()).collect(),
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();
    for (i, alias) in std::iter::once(&name).chain(aliases.iter()).enumerate() {
        store
            .upsert_alias(&limelight_common::Alias {
                entity_id: entity_id.to_string(),
                surface: alias.to_string(),
                surface_norm: limelight_common::normalize_surface(alias),
                is_primary: i == 0,
                confidence: 1.0,
            })
            .await
            .unwrap();
    }
}

pub fn deps(
    store: Store,
    adapters: Vec<Box<dyn SourceAdapter>>,
    sentiment: Box<dyn SentimentScorer>,
    data_dir: PathBuf,
) -> PipelineDeps {
    PipelineDeps {
        store,
        adapters,
        sentiment,
        themes: ThemeBuilder::new(None, 5),
        weights: WeightsConfig::default(),
        config_fingerprint: "test".to_string(),
        workers: 2,
        data_dir,
        cancelled: Arc::new(AtomicBool::new(false)),
    }
}
