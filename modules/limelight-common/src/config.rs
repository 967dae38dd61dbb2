//! Configuration: env vars for secrets and paths, TOML files for tunables,
//! plain-text line lists for communities and the news domain allowlist.

use std::env;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::PipelineError;

/// Process configuration loaded from environment variables.
/// Secrets never live in the TOML files.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL, e.g. `sqlite://data/limelight.db`.
    pub database_url: String,

    /// Operator timezone the 6am window boundary is computed in.
    pub window_tz: Tz,

    // Source credentials (empty = adapter disabled at capability probe)
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_user_agent: String,
    pub youtube_api_key: String,

    // Optional ML endpoints; absent keys select the fallback paths
    pub sentiment_endpoint: Option<String>,
    pub embedding_api_key: String,

    /// Root for run logs and the quota ledger. Default: `data`.
    pub data_dir: PathBuf,

    /// Directory holding sources.toml / weights.toml / pinned_entities.json.
    pub config_dir: PathBuf,

    /// Worker-pool bound for intra-stage parallelism.
    pub workers: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        let window_tz: Tz = env::var("WINDOW_TZ")
            .unwrap_or_else(|_| "America/Los_Angeles".to_string())
            .parse()
            .map_err(|e| PipelineError::Config(format!("WINDOW_TZ invalid: {e}")))?;

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/limelight.db".to_string()),
            window_tz,
            reddit_client_id: env::var("REDDIT_CLIENT_ID").unwrap_or_default(),
            reddit_client_secret: env::var("REDDIT_CLIENT_SECRET").unwrap_or_default(),
            reddit_user_agent: env::var("REDDIT_USER_AGENT")
                .unwrap_or_else(|_| "limelight/0.3".to_string()),
            youtube_api_key: env::var("YOUTUBE_API_KEY").unwrap_or_default(),
            sentiment_endpoint: env::var("SENTIMENT_ENDPOINT").ok(),
            embedding_api_key: env::var("EMBEDDING_API_KEY").unwrap_or_default(),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            config_dir: PathBuf::from(
                env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string()),
            ),
            workers: env::var("PIPELINE_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| std::thread::available_parallelism().map_or(4, |n| n.get())),
        })
    }

    /// Log key presence without values.
    pub fn log_redacted(&self) {
        let vars = [
            ("REDDIT_CLIENT_ID", &self.reddit_client_id),
            ("REDDIT_CLIENT_SECRET", &self.reddit_client_secret),
            ("YOUTUBE_API_KEY", &self.youtube_api_key),
            ("EMBEDDING_API_KEY", &self.embedding_api_key),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

// --- sources.toml ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    #[serde(default)]
    pub reddit: RedditSourceConfig,
    #[serde(default)]
    pub youtube: YoutubeSourceConfig,
    #[serde(default)]
    pub gdelt: GdeltSourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RedditSourceConfig {
    pub enabled: bool,
    pub subreddits_file: PathBuf,
    pub max_posts_per_subreddit: u32,
    pub max_comments_per_post: u32,
}

impl Default for RedditSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            subreddits_file: PathBuf::from("config/subreddits.txt"),
            max_posts_per_subreddit: 100,
            max_comments_per_post: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct YoutubeSourceConfig {
    pub enabled: bool,
    pub channels: Vec<String>,
    pub fetch_comments: bool,
    pub max_comments_per_video: u32,
    pub daily_quota_units: u64,
}

impl Default for YoutubeSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channels: Vec::new(),
            fetch_comments: true,
            max_comments_per_video: 50,
            daily_quota_units: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GdeltSourceConfig {
    pub enabled: bool,
    pub keywords: Vec<String>,
    pub allowlist_file: PathBuf,
    pub max_articles: u32,
}

impl Default for GdeltSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keywords: vec!["entertainment".to_string(), "celebrity".to_string()],
            allowlist_file: PathBuf::from("config/news_domains.txt"),
            max_articles: 250,
        }
    }
}

// --- weights.toml ---

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WeightsConfig {
    /// Per-source multipliers applied to engagement contributions.
    /// Ordered so the config fingerprint is stable.
    pub source_weights: std::collections::BTreeMap<String, f64>,
    pub implicit_weight: f64,
    pub fame: FameWeights,
    pub confidence: ConfidenceWeights,
    pub resolver: ResolverWeights,
    pub momentum: MomentumConfig,
    pub driver_count: usize,
    pub theme_count: usize,
    pub theme_min_mentions: usize,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            source_weights: std::collections::BTreeMap::new(),
            implicit_weight: 0.5,
            fame: FameWeights::default(),
            confidence: ConfidenceWeights::default(),
            resolver: ResolverWeights::default(),
            momentum: MomentumConfig::default(),
            driver_count: 10,
            theme_count: 5,
            theme_min_mentions: 5,
        }
    }
}

impl WeightsConfig {
    pub fn source_weight(&self, source: crate::types::Source) -> f64 {
        self.source_weights
            .get(&source.to_string().to_lowercase())
            .copied()
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FameWeights {
    pub baseline_weight: f64,
    pub attention_weight: f64,
}

impl Default for FameWeights {
    fn default() -> Self {
        Self {
            baseline_weight: 0.3,
            attention_weight: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfidenceWeights {
    pub sample_size: f64,
    pub diversity: f64,
    pub engagement: f64,
    /// Volume at which the sample-size component reaches ~63 of 100.
    pub sample_saturation: f64,
    pub required_sources: u64,
    pub engagement_saturation: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            sample_size: 1.0,
            diversity: 1.0,
            engagement: 1.0,
            sample_saturation: 5.0,
            required_sources: 3,
            engagement_saturation: 3.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ResolverWeights {
    pub prior: f64,
    pub context: f64,
    pub comention: f64,
    pub typefit: f64,
    pub source: f64,
    /// Minimum accept confidence for the top candidate.
    pub min_confidence: f64,
    /// Required top-vs-second gap, as a fraction of the top score.
    pub margin_fraction: f64,
    pub max_candidates: usize,
}

impl Default for ResolverWeights {
    fn default() -> Self {
        Self {
            prior: 0.40,
            context: 0.25,
            comention: 0.20,
            typefit: 0.10,
            source: 0.05,
            min_confidence: 0.70,
            margin_fraction: 0.15,
            max_candidates: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MomentumConfig {
    /// Prior SUCCESS runs required before momentum is emitted.
    pub min_history: usize,
    /// EWMA half-life in runs over the 7-day lookback.
    pub halflife_runs: f64,
    pub lookback_days: i64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            halflife_runs: 3.0,
            lookback_days: 7,
        }
    }
}

// --- Loading helpers ---

pub fn load_toml<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, PipelineError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("read {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map_err(|e| PipelineError::Config(format!("parse {}: {e}", path.display())))
}

/// Text file as a list of lines, skipping blanks and `#` comments.
pub fn load_text_list(path: &Path) -> Result<Vec<String>, PipelineError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("read {}: {e}", path.display())))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Stable fingerprint of the tunable config, recorded on the Run row.
pub fn config_fingerprint(sources: &SourcesConfig, weights: &WeightsConfig) -> String {
    let blob = format!("{sources:?}|{weights:?}");
    crate::text::content_hash(&blob)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_defaults_match_documented_values() {
        let w = WeightsConfig::default();
        assert_eq!(w.implicit_weight, 0.5);
        assert_eq!(w.fame.baseline_weight, 0.3);
        assert_eq!(w.fame.attention_weight, 0.7);
        assert_eq!(w.resolver.min_confidence, 0.70);
        assert_eq!(w.resolver.margin_fraction, 0.15);
        assert_eq!(w.momentum.min_history, 3);
        assert_eq!(w.driver_count, 10);
        assert_eq!(w.theme_min_mentions, 5);
    }

    #[test]
    fn toml_roundtrip_for_weights() {
        let parsed: WeightsConfig = toml::from_str(
            r#"
            implicit_weight = 0.4

            [source_weights]
            reddit = 1.2
            youtube = 1.5

            [fame]
            baseline_weight = 0.4
            attention_weight = 0.6
            "#,
        )
        .unwrap();
        assert_eq!(parsed.implicit_weight, 0.4);
        assert_eq!(parsed.source_weight(crate::types::Source::Reddit), 1.2);
        assert_eq!(parsed.source_weight(crate::types::Source::Gdelt), 1.0);
        assert_eq!(parsed.fame.baseline_weight, 0.4);
        // Sections not present fall back to defaults.
        assert_eq!(parsed.resolver.max_candidates, 7);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let s = SourcesConfig {
            reddit: RedditSourceConfig::default(),
            youtube: YoutubeSourceConfig::default(),
            gdelt: GdeltSourceConfig::default(),
        };
        let w = WeightsConfig::default();
        let a = config_fingerprint(&s, &w);
        let b = config_fingerprint(&s, &w);
        assert_eq!(a, b);

        let mut w2 = WeightsConfig::default();
        w2.implicit_weight = 0.25;
        assert_ne!(a, config_fingerprint(&s, &w2));
    }
}
