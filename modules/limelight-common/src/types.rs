use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Entities ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Person,
    Show,
    Film,
    Franchise,
    Streamer,
    Brand,
    Character,
    Couple,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityType::Person => "PERSON",
            EntityType::Show => "SHOW",
            EntityType::Film => "FILM",
            EntityType::Franchise => "FRANCHISE",
            EntityType::Streamer => "STREAMER",
            EntityType::Brand => "BRAND",
            EntityType::Character => "CHARACTER",
            EntityType::Couple => "COUPLE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub entity_key: String,
    pub canonical_name: String,
    pub entity_type: EntityType,
    pub is_pinned: bool,
    pub is_active: bool,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub dormant_since: Option<DateTime<Utc>>,
    pub external_ids: HashMap<String, String>,
    pub context_hints: Vec<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    pub entity_id: String,
    pub surface: String,
    pub surface_norm: String,
    pub is_primary: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    ParentChild,
    CoupleMember,
    BrandOwns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRelationship {
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub kind: RelationKind,
}

/// A catalog entry as the resolver sees it: entity plus its aliases and a
/// prior weight (pinned entities rank above promoted ones).
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub entity: Entity,
    pub aliases: Vec<String>,
    pub prior_weight: f64,
}

// --- Source items ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Reddit,
    RedditComment,
    Youtube,
    YoutubeComment,
    Gdelt,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Source::Reddit => "REDDIT",
            Source::RedditComment => "REDDIT_COMMENT",
            Source::Youtube => "YOUTUBE",
            Source::YoutubeComment => "YOUTUBE_COMMENT",
            Source::Gdelt => "GDELT",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REDDIT" => Ok(Source::Reddit),
            "REDDIT_COMMENT" => Ok(Source::RedditComment),
            "YOUTUBE" => Ok(Source::Youtube),
            "YOUTUBE_COMMENT" => Ok(Source::YoutubeComment),
            "GDELT" => Ok(Source::Gdelt),
            other => Err(format!("unknown source tag: {other}")),
        }
    }
}

/// Raw ingested unit. `item_id` is deterministic from the source-native id
/// so re-ingestion of the same window is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
    pub item_id: String,
    pub source: Source,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub author: Option<String>,
    /// Source-specific numeric counters (score, view_count, tone, ...).
    pub engagement: HashMap<String, f64>,
    pub raw_payload: serde_json::Value,
}

impl SourceItem {
    pub fn engagement_value(&self, key: &str) -> f64 {
        self.engagement.get(key).copied().unwrap_or(0.0)
    }
}

// --- Documents ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub item_id: String,
    pub doc_timestamp: DateTime<Utc>,
    pub lang: String,
    pub text_title: String,
    pub text_caption: String,
    pub text_body: String,
    /// Title + caption + body joined with explicit delimiters; span offsets
    /// downstream are relative to this field.
    pub text_all: String,
    pub quality_flags: Vec<String>,
    pub hash_sim: String,
}

// --- Mentions ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
    pub intensity: f64,
}

impl SentimentScores {
    pub fn neutral() -> Self {
        Self {
            pos: 0.0,
            neu: 1.0,
            neg: 0.0,
            intensity: 0.0,
        }
    }

    /// Signed scalar in [-1, 1].
    pub fn signed(&self) -> f64 {
        self.pos - self.neg
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentionFeatures {
    pub sentiment: SentimentScores,
    pub support_score: f64,
    pub desire_score: f64,
    /// Engagement score of the parent source item, cached at scoring time.
    pub engagement_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub mention_id: String,
    pub doc_id: String,
    pub entity_id: String,
    pub sent_idx: usize,
    pub span_start: usize,
    pub span_end: usize,
    pub surface: String,
    pub is_implicit: bool,
    pub weight: f64,
    pub resolve_confidence: f64,
    pub features: MentionFeatures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub entity_id: String,
    pub score: f64,
    pub features: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedMention {
    pub unresolved_id: String,
    pub doc_id: String,
    pub surface: String,
    pub surface_norm: String,
    pub sent_idx: usize,
    pub context: String,
    pub candidates: Vec<CandidateScore>,
    pub top_score: f64,
    pub second_score: f64,
    pub created_at: DateTime<Utc>,
}

// --- Runs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Created,
    Running,
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Partial | RunStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Created => "CREATED",
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Partial => "PARTIAL",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(RunStatus::Created),
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCESS" => Ok(RunStatus::Success),
            "PARTIAL" => Ok(RunStatus::Partial),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub config_fingerprint: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentionCounts {
    pub total: u64,
    pub resolved: u64,
    pub unresolved: u64,
    pub implicit: u64,
    pub docs_dropped_dedupe: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedSurface {
    pub surface: String,
    pub count: u64,
    pub impact: f64,
    pub examples: Vec<UnresolvedExample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedExample {
    pub doc_id: String,
    pub source: Source,
    pub context: String,
    pub candidates: Vec<CandidateScore>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetricsRow {
    /// Items ingested per source tag; a zero with an error note means the
    /// adapter failed for the window.
    pub source_counts: HashMap<String, i64>,
    pub source_errors: HashMap<String, String>,
    pub mention_counts: MentionCounts,
    pub unresolved_top: Vec<UnresolvedSurface>,
    pub timings_ms: HashMap<String, u64>,
}

// --- Per-run snapshot rows ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDailyMetrics {
    pub run_id: Uuid,
    pub entity_id: String,
    pub fame: f64,
    pub love: f64,
    pub attention: f64,
    pub baseline_fame: Option<f64>,
    pub momentum: f64,
    pub polarization: f64,
    pub confidence: f64,
    pub mentions_explicit: u64,
    pub mentions_implicit: u64,
    pub sources_distinct: u64,
    pub is_dormant: bool,
    pub dormancy_reason: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDailyDriver {
    pub run_id: Uuid,
    pub entity_id: String,
    pub rank: u32,
    pub item_id: String,
    pub impact_score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeSentimentMix {
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDailyTheme {
    pub run_id: Uuid,
    pub entity_id: String,
    pub theme_id: String,
    pub label: String,
    pub keywords: Vec<String>,
    pub volume: u64,
    pub sentiment_mix: ThemeSentimentMix,
}

// --- Weekly baseline ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSignal {
    MentionVolume,
    SearchTrends,
    Pageviews,
    Combined,
}

impl BaselineSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            BaselineSignal::MentionVolume => "mention_volume",
            BaselineSignal::SearchTrends => "search_trends",
            BaselineSignal::Pageviews => "pageviews",
            BaselineSignal::Combined => "combined",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityWeeklyBaseline {
    pub entity_id: String,
    /// ISO week key, e.g. "2026-W31".
    pub iso_week: String,
    pub signal: BaselineSignal,
    pub baseline_fame: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_roundtrips_through_str() {
        for s in [
            Source::Reddit,
            Source::RedditComment,
            Source::Youtube,
            Source::YoutubeComment,
            Source::Gdelt,
        ] {
            let parsed: Source = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn entity_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&EntityType::Streamer).unwrap();
        assert_eq!(json, "\"STREAMER\"");
        let parsed: EntityType = serde_json::from_str("\"COUPLE\"").unwrap();
        assert_eq!(parsed, EntityType::Couple);
    }

    #[test]
    fn sentiment_signed_scalar() {
        let s = SentimentScores {
            pos: 0.9,
            neu: 0.08,
            neg: 0.02,
            intensity: 0.5,
        };
        assert!((s.signed() - 0.88).abs() < 1e-9);
    }
}
