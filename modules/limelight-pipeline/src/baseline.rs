//! Weekly baseline job: a stable per-entity baseline-fame value from
//! longer-lived signals — rolling mention volume, search-trend interest,
//! and encyclopedic pageviews. External calls are best-effort; a missing
//! component is omitted and the weights renormalize.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use limelight_catalog::Catalog;
use limelight_common::{
    text::log1p, window::iso_week_key, BaselineSignal, EntityWeeklyBaseline, PipelineError,
};
use limelight_store::Store;
use serde::Deserialize;
use tracing::{info, warn};

const MENTION_LOOKBACK_DAYS: i64 = 90;
const PAGEVIEW_DAYS: i64 = 7;

const WEIGHT_MENTION_VOLUME: f64 = 0.4;
const WEIGHT_TRENDS: f64 = 0.3;
const WEIGHT_PAGEVIEWS: f64 = 0.3;

// --- External signal seams ---

#[async_trait]
pub trait TrendsSource: Send + Sync {
    /// Weekly interest 0..100 for a canonical name; None when the
    /// provider is unavailable or has no data.
    async fn weekly_interest(&self, canonical_name: &str) -> Option<f64>;
}

/// Used when no trends provider is configured.
pub struct NoopTrends;

#[async_trait]
impl TrendsSource for NoopTrends {
    async fn weekly_interest(&self, _canonical_name: &str) -> Option<f64> {
        None
    }
}

/// Interest scores from a configurable trends endpoint.
pub struct HttpTrends {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct TrendsResponse {
    score: f64,
}

impl HttpTrends {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoint,
        }
    }
}

#[async_trait]
impl TrendsSource for HttpTrends {
    async fn weekly_interest(&self, canonical_name: &str) -> Option<f64> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", canonical_name)])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let parsed: TrendsResponse = resp.json().await.ok()?;
        Some(parsed.score.clamp(0.0, 100.0))
    }
}

#[async_trait]
pub trait PageviewSource: Send + Sync {
    /// Raw pageview total over the trailing week for an encyclopedia
    /// title; None when unavailable.
    async fn weekly_pageviews(&self, title: &str) -> Option<f64>;
}

/// Wikimedia REST pageviews-per-article client.
pub struct WikipediaPageviews {
    client: reqwest::Client,
    user_agent: String,
}

#[derive(Debug, Deserialize)]
struct PageviewResponse {
    #[serde(default = "Vec::new")]
    items: Vec<PageviewItem>,
}

#[derive(Debug, Deserialize)]
struct PageviewItem {
    #[serde(default)]
    views: u64,
}

impl WikipediaPageviews {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl PageviewSource for WikipediaPageviews {
    async fn weekly_pageviews(&self, title: &str) -> Option<f64> {
        // Data lags ~24h, so the window ends yesterday.
        let end = Utc::now() - Duration::days(1);
        let start = end - Duration::days(PAGEVIEW_DAYS);
        let title = title.replace(' ', "_");
        let url = format!(
            "https://wikimedia.org/api/rest_v1/metrics/pageviews/per-article/en.wikipedia.org/all-access/user/{}/daily/{}/{}",
            title,
            start.format("%Y%m%d"),
            end.format("%Y%m%d"),
        );
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let parsed: PageviewResponse = resp.json().await.ok()?;
        Some(parsed.items.iter().map(|i| i.views as f64).sum())
    }
}

// --- The job ---

pub struct BaselineJob<'a> {
    pub store: &'a Store,
    pub trends: &'a dyn TrendsSource,
    pub pageviews: &'a dyn PageviewSource,
}

impl BaselineJob<'_> {
    /// Compute and store baseline rows for every active entity for the
    /// ISO week containing `as_of`. Idempotent within a week.
    pub async fn run(
        &self,
        catalog: &Catalog,
        as_of: DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        let week = iso_week_key(as_of);
        let window_start = as_of - Duration::days(MENTION_LOOKBACK_DAYS);

        // Rolling mention volume, log-scaled then percentile-normalized
        // over the catalog.
        let mut volume_raw: HashMap<&str, f64> = HashMap::new();
        for entry in &catalog.entries {
            let id = entry.entity.entity_id.as_str();
            let count = self
                .store
                .mention_count_between(id, window_start, as_of)
                .await?;
            volume_raw.insert(id, log1p(count as f64));
        }
        let volume_score = percentile_scores(&volume_raw);

        let mut written = 0usize;
        for entry in &catalog.entries {
            let entity = &entry.entity;
            let id = entity.entity_id.as_str();

            let volume = volume_score.get(id).copied();

            let trends = self.trends.weekly_interest(&entity.canonical_name).await;
            if trends.is_none() {
                let e = PipelineError::ExternalBaseline(format!(
                    "trends interest unavailable for {id}"
                ));
                warn!(error = %e, "Baseline component omitted");
            }

            let title = entity
                .external_ids
                .get("wikipedia")
                .cloned()
                .unwrap_or_else(|| entity.canonical_name.clone());
            let pageviews_raw = self.pageviews.weekly_pageviews(&title).await;
            let pageviews = pageviews_raw.map(pageview_score);

            let combined = combine_components(volume, trends, pageviews);

            for (signal, value) in [
                (BaselineSignal::MentionVolume, volume),
                (BaselineSignal::SearchTrends, trends),
                (BaselineSignal::Pageviews, pageviews),
                (BaselineSignal::Combined, combined),
            ] {
                if let Some(value) = value {
                    self.store
                        .upsert_weekly_baseline(&EntityWeeklyBaseline {
                            entity_id: entity.entity_id.clone(),
                            iso_week: week.clone(),
                            signal,
                            baseline_fame: value.clamp(0.0, 100.0),
                        })
                        .await?;
                    written += 1;
                }
            }
        }

        info!(week, rows = written, "Weekly baseline updated");
        Ok(written)
    }
}

/// Percentile rank 0..100 within the catalog; single-entity catalogs sit
/// at the midpoint.
fn percentile_scores(raw: &HashMap<&str, f64>) -> HashMap<String, f64> {
    let n = raw.len();
    if n <= 1 {
        return raw.keys().map(|k| (k.to_string(), 50.0)).collect();
    }
    let mut values: Vec<f64> = raw.values().copied().collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    raw.iter()
        .map(|(k, &v)| {
            let below = values.partition_point(|&x| x < v);
            (k.to_string(), 100.0 * below as f64 / (n - 1) as f64)
        })
        .collect()
}

/// Log-scaled pageview total mapped to 0..100, saturating around 1M/week.
fn pageview_score(views: f64) -> f64 {
    (100.0 * log1p(views) / log1p(1_000_000.0)).clamp(0.0, 100.0)
}

/// Weighted combination with weights renormalized over the components
/// that are present. All components missing yields None.
fn combine_components(
    volume: Option<f64>,
    trends: Option<f64>,
    pageviews: Option<f64>,
) -> Option<f64> {
    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    for (value, weight) in [
        (volume, WEIGHT_MENTION_VOLUME),
        (trends, WEIGHT_TRENDS),
        (pageviews, WEIGHT_PAGEVIEWS),
    ] {
        if let Some(v) = value {
            weighted += weight * v;
            weight_total += weight;
        }
    }
    if weight_total <= 0.0 {
        None
    } else {
        Some(weighted / weight_total)
    }
}
