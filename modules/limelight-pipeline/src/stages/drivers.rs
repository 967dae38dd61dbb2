//! Stage 8: rank the source items behind each entity's day by impact and
//! compose a short human-readable reason for each.

use std::collections::{BTreeMap, HashMap};

use limelight_catalog::Catalog;
use limelight_common::{Document, EntityDailyDriver, Mention, Source, SourceItem};
use tracing::info;
use uuid::Uuid;

use super::engagement::{engagement_figure, engagement_score};

pub fn run(
    run_id: Uuid,
    mentions: &[Mention],
    documents: &[Document],
    items_by_id: &HashMap<String, SourceItem>,
    catalog: &Catalog,
    limit: usize,
) -> HashMap<String, Vec<EntityDailyDriver>> {
    let item_by_doc: HashMap<&str, &SourceItem> = documents
        .iter()
        .filter_map(|d| {
            items_by_id
                .get(&d.item_id)
                .map(|item| (d.doc_id.as_str(), item))
        })
        .collect();

    // entity → item → that item's mentions of the entity
    let mut grouped: BTreeMap<&str, BTreeMap<&str, Vec<&Mention>>> = BTreeMap::new();
    for mention in mentions {
        let Some(item) = item_by_doc.get(mention.doc_id.as_str()) else {
            continue;
        };
        grouped
            .entry(mention.entity_id.as_str())
            .or_default()
            .entry(item.item_id.as_str())
            .or_default()
            .push(mention);
    }

    let mut out: HashMap<String, Vec<EntityDailyDriver>> = HashMap::new();
    for (entity_id, items) in grouped {
        let entity_name = catalog
            .get(entity_id)
            .map(|e| e.entity.canonical_name.clone())
            .unwrap_or_else(|| entity_id.to_string());

        let mut ranked: Vec<(f64, &SourceItem, String)> = items
            .into_iter()
            .filter_map(|(item_id, item_mentions)| {
                let item = items_by_id.get(item_id)?;
                let (impact, reason) = impact_of(item, &item_mentions, &entity_name);
                Some((impact, item, reason))
            })
            .collect();

        // Impact descending; ties go to the newer item, then stable by id.
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.published_at.cmp(&a.1.published_at))
                .then(a.1.item_id.cmp(&b.1.item_id))
        });
        ranked.truncate(limit);

        let drivers: Vec<EntityDailyDriver> = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (impact, item, reason))| EntityDailyDriver {
                run_id,
                entity_id: entity_id.to_string(),
                rank: (i + 1) as u32,
                item_id: item.item_id.clone(),
                impact_score: impact,
                reason,
            })
            .collect();
        out.insert(entity_id.to_string(), drivers);
    }

    let total: usize = out.values().map(Vec::len).sum();
    info!(drivers = total, entities = out.len(), "Drivers built");
    out
}

fn impact_of(item: &SourceItem, mentions: &[&Mention], entity_name: &str) -> (f64, String) {
    let mention_count = mentions.len() as f64;
    let engagement = engagement_score(item);
    let mean_sentiment = mentions
        .iter()
        .map(|m| m.features.sentiment.signed())
        .sum::<f64>()
        / mention_count.max(1.0);
    // Linear map of mean sentiment [-1, 1] → amplifier [0.5, 1.5].
    let amplifier = 1.0 + 0.5 * mean_sentiment;

    let impact = mention_count * 10.0 + engagement + amplifier * mention_count;
    let reason = compose_reason(item, entity_name, mentions.len(), mean_sentiment);
    (impact, reason)
}

fn compose_reason(
    item: &SourceItem,
    entity_name: &str,
    mention_count: usize,
    mean_sentiment: f64,
) -> String {
    let place = match item.source {
        Source::Reddit => "in a Reddit thread",
        Source::RedditComment => "in a Reddit comment",
        Source::Youtube => "in a YouTube video",
        Source::YoutubeComment => "in a YouTube comment",
        Source::Gdelt => "in news coverage",
    };
    let verdict = if mean_sentiment > 0.3 {
        "strongly positive"
    } else if mean_sentiment > 0.05 {
        "leaning positive"
    } else if mean_sentiment < -0.3 {
        "strongly negative"
    } else if mean_sentiment < -0.05 {
        "leaning negative"
    } else {
        "mixed"
    };
    let mentions_part = if mention_count > 1 {
        format!("{mention_count} mentions, ")
    } else {
        String::new()
    };
    let reason = format!(
        "{entity_name} {place} ({mentions_part}{}, {verdict})",
        engagement_figure(item)
    );
    reason.chars().take(200).collect()
}
