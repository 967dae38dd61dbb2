//! Stage 6: roll resolved mentions into per-entity daily aggregates —
//! volume, engagement attention, sentiment mix, diversity, confidence.

use std::collections::{BTreeMap, HashMap, HashSet};

use limelight_common::{text::log1p, Document, Mention, SourceItem, WeightsConfig};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct EntityAggregate {
    pub entity_id: String,
    pub mentions_explicit: u64,
    pub mentions_implicit: u64,
    /// Σ mention.weight (implicit mentions carry their reduced weight).
    pub weighted_volume: f64,
    /// log1p(volume + 0.5 · Σ engagement contributions); normalized to
    /// 0..100 at axis time against the run population.
    pub attention_raw: f64,
    /// Engagement-weighted mean of per-mention signed sentiment, in [-1, 1].
    pub love_signed: f64,
    /// Share of extreme-sentiment mentions, 0..100.
    pub polarization: f64,
    pub sources_distinct: u64,
    pub confidence: f64,
    pub per_source_volume: BTreeMap<String, f64>,
}

pub fn run(
    mentions: &[Mention],
    documents: &[Document],
    items_by_id: &HashMap<String, SourceItem>,
    weights: &WeightsConfig,
) -> Vec<EntityAggregate> {
    let item_by_doc: HashMap<&str, &SourceItem> = documents
        .iter()
        .filter_map(|d| {
            items_by_id
                .get(&d.item_id)
                .map(|item| (d.doc_id.as_str(), item))
        })
        .collect();

    let mut by_entity: BTreeMap<&str, Vec<&Mention>> = BTreeMap::new();
    for mention in mentions {
        by_entity
            .entry(mention.entity_id.as_str())
            .or_default()
            .push(mention);
    }

    let aggregates: Vec<EntityAggregate> = by_entity
        .into_iter()
        .map(|(entity_id, entity_mentions)| {
            aggregate_entity(entity_id, &entity_mentions, &item_by_doc, weights)
        })
        .collect();

    info!(entities = aggregates.len(), "Aggregation complete");
    aggregates
}

fn aggregate_entity(
    entity_id: &str,
    mentions: &[&Mention],
    item_by_doc: &HashMap<&str, &SourceItem>,
    weights: &WeightsConfig,
) -> EntityAggregate {
    let mut agg = EntityAggregate {
        entity_id: entity_id.to_string(),
        ..Default::default()
    };

    let mut engagement_contributions = 0.0;
    let mut engagement_total = 0.0;
    let mut love_weighted_sum = 0.0;
    let mut love_weight_total = 0.0;
    let mut extreme = 0usize;
    let mut sources: HashSet<String> = HashSet::new();

    for mention in mentions {
        if mention.is_implicit {
            agg.mentions_implicit += 1;
        } else {
            agg.mentions_explicit += 1;
        }
        agg.weighted_volume += mention.weight;

        let source = item_by_doc.get(mention.doc_id.as_str()).map(|i| i.source);
        let source_weight = source.map_or(1.0, |s| weights.source_weight(s));
        if let Some(s) = source {
            sources.insert(s.to_string());
            *agg.per_source_volume.entry(s.to_string()).or_default() += mention.weight;
        }

        let engagement = mention.features.engagement_score;
        engagement_contributions += engagement * source_weight;
        engagement_total += engagement;

        let s = mention.features.sentiment.signed();
        let love_weight = mention.weight * (1.0 + log1p(engagement));
        love_weighted_sum += s * love_weight;
        love_weight_total += love_weight;

        if s > 0.6 || s < -0.6 {
            extreme += 1;
        }
    }

    agg.attention_raw = log1p(agg.weighted_volume + 0.5 * engagement_contributions);
    agg.love_signed = if love_weight_total > 0.0 {
        love_weighted_sum / love_weight_total
    } else {
        0.0
    };
    // Share-based polarization is degenerate for a single mention.
    agg.polarization = if mentions.len() < 2 {
        0.0
    } else {
        100.0 * extreme as f64 / mentions.len() as f64
    };
    agg.sources_distinct = sources.len() as u64;

    let mean_engagement = engagement_total / mentions.len().max(1) as f64;
    agg.confidence = confidence(
        agg.weighted_volume,
        agg.sources_distinct,
        mean_engagement,
        weights,
    );
    agg
}

/// Composite 0..100 confidence: saturating sample-size, source diversity,
/// and engagement quality, combined with the configured weights.
pub fn confidence(
    weighted_volume: f64,
    sources_distinct: u64,
    mean_engagement: f64,
    weights: &WeightsConfig,
) -> f64 {
    let c = &weights.confidence;
    let sample = 100.0 * (1.0 - (-weighted_volume / c.sample_saturation).exp());
    let diversity = 100.0 * (sources_distinct as f64 / c.required_sources as f64).min(1.0);
    let engagement = 100.0 * (1.0 - (-mean_engagement / c.engagement_saturation).exp());

    let weight_total = c.sample_size + c.diversity + c.engagement;
    if weight_total <= 0.0 {
        return 0.0;
    }
    ((c.sample_size * sample + c.diversity * diversity + c.engagement * engagement) / weight_total)
        .clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use limelight_common::{MentionFeatures, SentimentScores, Source};

    fn mention(entity: &str, doc: &str, implicit: bool, pos: f64, neg: f64, eng: f64) -> Mention {
        Mention {
            mention_id: format!("m_{entity}_{doc}_{implicit}_{pos}"),
            doc_id: doc.to_string(),
            entity_id: entity.to_string(),
            sent_idx: 0,
            span_start: 0,
            span_end: 5,
            surface: "x".into(),
            is_implicit: implicit,
            weight: if implicit { 0.5 } else { 1.0 },
            resolve_confidence: 1.0,
            features: MentionFeatures {
                sentiment: SentimentScores {
                    pos,
                    neu: 1.0 - pos - neg,
                    neg,
                    intensity: 0.5,
                },
                support_score: 0.0,
                desire_score: 0.0,
                engagement_score: eng,
            },
        }
    }

    fn doc(doc_id: &str, item_id: &str) -> Document {
        Document {
            doc_id: doc_id.to_string(),
            item_id: item_id.to_string(),
            doc_timestamp: Utc::now(),
            lang: "en".into(),
            text_title: String::new(),
            text_caption: String::new(),
            text_body: String::new(),
            text_all: "text".into(),
            quality_flags: Vec::new(),
            hash_sim: doc_id.to_string(),
        }
    }

    fn item(item_id: &str, source: Source) -> SourceItem {
        SourceItem {
            item_id: item_id.to_string(),
            source,
            url: String::new(),
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            title: String::new(),
            description: String::new(),
            author: None,
            engagement: Default::default(),
            raw_payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn single_positive_mention() {
        let mentions = vec![mention("e1", "d1", false, 0.9, 0.02, 2.0)];
        let documents = vec![doc("d1", "i1")];
        let items: HashMap<String, SourceItem> =
            [("i1".to_string(), item("i1", Source::Reddit))].into();
        let weights = WeightsConfig::default();

        let aggs = run(&mentions, &documents, &items, &weights);
        assert_eq!(aggs.len(), 1);
        let a = &aggs[0];
        assert_eq!(a.mentions_explicit, 1);
        assert_eq!(a.mentions_implicit, 0);
        assert_eq!(a.weighted_volume, 1.0);
        // attention = log1p(volume + 0.5 · engagement·source_weight)
        assert!((a.attention_raw - (1.0f64 + 1.0 + 0.5 * 2.0).ln()).abs() < 1e-9);
        assert!((a.love_signed - 0.88).abs() < 1e-9);
        assert_eq!(a.polarization, 0.0);
        assert_eq!(a.sources_distinct, 1);
        assert!(a.confidence > 0.0);
    }

    #[test]
    fn implicit_mentions_down_weighted_in_volume() {
        let mentions = vec![
            mention("e1", "d1", false, 0.5, 0.1, 0.0),
            mention("e1", "d1", true, 0.5, 0.1, 0.0),
        ];
        let documents = vec![doc("d1", "i1")];
        let items: HashMap<String, SourceItem> =
            [("i1".to_string(), item("i1", Source::Reddit))].into();
        let aggs = run(&mentions, &documents, &items, &WeightsConfig::default());
        assert_eq!(aggs[0].weighted_volume, 1.5);
        assert_eq!(aggs[0].mentions_explicit, 1);
        assert_eq!(aggs[0].mentions_implicit, 1);
    }

    #[test]
    fn neutral_mentions_zero_love_signed() {
        let mentions = vec![mention("e1", "d1", false, 0.0, 0.0, 0.0)];
        let documents = vec![doc("d1", "i1")];
        let items: HashMap<String, SourceItem> =
            [("i1".to_string(), item("i1", Source::Gdelt))].into();
        let aggs = run(&mentions, &documents, &items, &WeightsConfig::default());
        assert_eq!(aggs[0].love_signed, 0.0);
        assert_eq!(aggs[0].polarization, 0.0);
    }

    #[test]
    fn polarization_counts_both_extremes() {
        let mentions = vec![
            mention("e1", "d1", false, 0.9, 0.0, 0.0),
            mention("e1", "d1", false, 0.0, 0.9, 0.0),
            mention("e1", "d1", false, 0.2, 0.1, 0.0),
            mention("e1", "d1", false, 0.1, 0.2, 0.0),
        ];
        let documents = vec![doc("d1", "i1")];
        let items: HashMap<String, SourceItem> =
            [("i1".to_string(), item("i1", Source::Reddit))].into();
        let aggs = run(&mentions, &documents, &items, &WeightsConfig::default());
        assert_eq!(aggs[0].polarization, 50.0);
    }

    #[test]
    fn distinct_sources_counted() {
        let mentions = vec![
            mention("e1", "d1", false, 0.2, 0.1, 1.0),
            mention("e1", "d2", false, 0.2, 0.1, 1.0),
        ];
        let documents = vec![doc("d1", "i1"), doc("d2", "i2")];
        let items: HashMap<String, SourceItem> = [
            ("i1".to_string(), item("i1", Source::Reddit)),
            ("i2".to_string(), item("i2", Source::Youtube)),
        ]
        .into();
        let aggs = run(&mentions, &documents, &items, &WeightsConfig::default());
        assert_eq!(aggs[0].sources_distinct, 2);
        assert_eq!(aggs[0].per_source_volume.len(), 2);
    }

    #[test]
    fn confidence_components_bounded() {
        let weights = WeightsConfig::default();
        assert_eq!(confidence(0.0, 0, 0.0, &weights), 0.0);
        let high = confidence(1e6, 10, 1e6, &weights);
        assert!(high <= 100.0 && high > 99.0);
        // More sources, same volume: strictly higher confidence.
        assert!(confidence(3.0, 2, 1.0, &weights) > confidence(3.0, 1, 1.0, &weights));
    }
}
