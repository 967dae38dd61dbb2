//! Stage 7: Fame, Love, Momentum from the aggregates, the weekly baseline,
//! and prior runs' coordinates. Every pinned active entity gets a row even
//! when dormant.

use std::collections::HashMap;

use chrono::Duration;
use limelight_catalog::Catalog;
use limelight_common::{
    window::iso_week_key, DailyWindow, EntityDailyMetrics, PipelineError, WeightsConfig,
};
use limelight_store::{FameLovePoint, Store};
use tracing::info;
use uuid::Uuid;

use super::aggregate::{confidence, EntityAggregate};

/// Below this run population the percentile rank is unstable; a fixed
/// calibration curve takes over.
const MIN_PERCENTILE_POPULATION: usize = 20;

/// Neutral midpoint used when an entity has no weekly baseline yet.
const NEUTRAL_BASELINE: f64 = 50.0;

pub async fn run(
    run_id: Uuid,
    aggregates: &[EntityAggregate],
    catalog: &Catalog,
    window: &DailyWindow,
    weights: &WeightsConfig,
    store: &Store,
) -> Result<Vec<EntityDailyMetrics>, PipelineError> {
    let attention_norm = normalize_attention(aggregates);
    let week = iso_week_key(window.end);

    let mut rows = Vec::new();
    for agg in aggregates {
        let baseline = store
            .latest_combined_baseline(&agg.entity_id, &week)
            .await?;
        let attention = attention_norm[&agg.entity_id];
        let fame = fame_of(baseline, attention, weights);
        let love = (50.0 * (agg.love_signed + 1.0)).clamp(0.0, 100.0);
        let (momentum, insufficient_history) =
            momentum_of(&agg.entity_id, fame, love, window, weights, store).await?;

        rows.push(EntityDailyMetrics {
            run_id,
            entity_id: agg.entity_id.clone(),
            fame,
            love,
            attention,
            baseline_fame: baseline,
            momentum,
            polarization: agg.polarization.clamp(0.0, 100.0),
            confidence: agg.confidence.clamp(0.0, 100.0),
            mentions_explicit: agg.mentions_explicit,
            mentions_implicit: agg.mentions_implicit,
            sources_distinct: agg.sources_distinct,
            is_dormant: false,
            dormancy_reason: None,
            metadata: serde_json::json!({
                "per_source_volume": agg.per_source_volume,
                "insufficient_history": insufficient_history,
            }),
        });
    }

    // Dormant rows for pinned active entities with no mentions this window.
    let covered: HashMap<&str, ()> = aggregates
        .iter()
        .map(|a| (a.entity_id.as_str(), ()))
        .collect();
    for entry in catalog.pinned_active() {
        let entity_id = &entry.entity.entity_id;
        if covered.contains_key(entity_id.as_str()) {
            continue;
        }
        let baseline = store.latest_combined_baseline(entity_id, &week).await?;
        let fame = fame_of(baseline, 0.0, weights);
        let (momentum, insufficient_history) =
            momentum_of(entity_id, fame, 50.0, window, weights, store).await?;

        rows.push(EntityDailyMetrics {
            run_id,
            entity_id: entity_id.clone(),
            fame,
            love: 50.0,
            attention: 0.0,
            baseline_fame: baseline,
            momentum,
            polarization: 0.0,
            confidence: confidence(0.0, 0, 0.0, weights),
            mentions_explicit: 0,
            mentions_implicit: 0,
            sources_distinct: 0,
            is_dormant: true,
            dormancy_reason: Some("no resolved mentions in window".to_string()),
            metadata: serde_json::json!({
                "insufficient_history": insufficient_history,
            }),
        });
    }

    rows.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
    info!(rows = rows.len(), "Axis computation complete");
    Ok(rows)
}

fn fame_of(baseline: Option<f64>, attention: f64, weights: &WeightsConfig) -> f64 {
    let baseline = baseline.unwrap_or(NEUTRAL_BASELINE);
    (weights.fame.baseline_weight * baseline + weights.fame.attention_weight * attention)
        .clamp(0.0, 100.0)
}

/// Attention 0..100 per entity: percentile rank within the run, or a fixed
/// calibration curve when the population is small.
fn normalize_attention(aggregates: &[EntityAggregate]) -> HashMap<String, f64> {
    let n = aggregates.len();
    if n >= MIN_PERCENTILE_POPULATION {
        let mut raws: Vec<f64> = aggregates.iter().map(|a| a.attention_raw).collect();
        raws.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        aggregates
            .iter()
            .map(|a| {
                let below = raws.partition_point(|&r| r < a.attention_raw);
                let pct = 100.0 * below as f64 / (n - 1) as f64;
                (a.entity_id.clone(), pct.clamp(0.0, 100.0))
            })
            .collect()
    } else {
        aggregates
            .iter()
            .map(|a| {
                (
                    a.entity_id.clone(),
                    (a.attention_raw * 10.0).clamp(0.0, 100.0),
                )
            })
            .collect()
    }
}

/// Signed magnitude of the (Fame, Love) delta against the 7-day EWMA of
/// prior runs. Entities with thin history emit 0 with a flag.
async fn momentum_of(
    entity_id: &str,
    fame: f64,
    love: f64,
    window: &DailyWindow,
    weights: &WeightsConfig,
    store: &Store,
) -> Result<(f64, bool), PipelineError> {
    let since = window.end - Duration::days(weights.momentum.lookback_days);
    let history = store.fame_love_history(entity_id, since, window.end).await?;
    if history.is_empty() || history.len() < weights.momentum.min_history {
        return Ok((0.0, true));
    }

    let (ewma_fame, ewma_love) = ewma(&history, weights.momentum.halflife_runs);
    let d_fame = fame - ewma_fame;
    let d_love = love - ewma_love;
    let magnitude = (d_fame * d_fame + d_love * d_love).sqrt();
    let momentum = (magnitude * d_fame.signum()).clamp(-100.0, 100.0);
    Ok((momentum, false))
}

fn ewma(history: &[FameLovePoint], halflife_runs: f64) -> (f64, f64) {
    let alpha = 1.0 - 0.5f64.powf(1.0 / halflife_runs.max(f64::MIN_POSITIVE));
    let mut fame = history[0].fame;
    let mut love = history[0].love;
    for point in &history[1..] {
        fame = alpha * point.fame + (1.0 - alpha) * fame;
        love = alpha * point.love + (1.0 - alpha) * love;
    }
    (fame, love)
}
