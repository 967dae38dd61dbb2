//! Resolve-queue rollup: aggregate unresolved surfaces by normalized form
//! with an engagement-weighted impact, so operators triage the surfaces
//! that matter most first.

use std::collections::{BTreeMap, HashMap};

use limelight_common::{
    text::log1p, Document, Source, SourceItem, UnresolvedExample, UnresolvedMention,
    UnresolvedSurface,
};

const TOP_N: usize = 20;
const MAX_EXAMPLES: usize = 3;

fn source_base(source: Source) -> f64 {
    match source {
        Source::Youtube => 1.5,
        Source::Gdelt => 1.3,
        Source::Reddit => 1.2,
        Source::YoutubeComment | Source::RedditComment => 1.0,
    }
}

pub fn unresolved_top(
    unresolved: &[UnresolvedMention],
    documents: &[Document],
    items_by_id: &HashMap<String, SourceItem>,
) -> Vec<UnresolvedSurface> {
    let item_by_doc: HashMap<&str, &SourceItem> = documents
        .iter()
        .filter_map(|d| {
            items_by_id
                .get(&d.item_id)
                .map(|item| (d.doc_id.as_str(), item))
        })
        .collect();

    let mut agg: BTreeMap<&str, UnresolvedSurface> = BTreeMap::new();
    for u in unresolved {
        let entry = agg
            .entry(u.surface_norm.as_str())
            .or_insert_with(|| UnresolvedSurface {
                surface: u.surface.clone(),
                count: 0,
                impact: 0.0,
                examples: Vec::new(),
            });
        entry.count += 1;

        let item = item_by_doc.get(u.doc_id.as_str());
        let weight = item.map_or(1.0, |item| {
            let engagement_sum: f64 = item.engagement.values().sum();
            source_base(item.source) * (1.0 + 0.2 * log1p(engagement_sum))
        });
        entry.impact += weight;

        if entry.examples.len() < MAX_EXAMPLES {
            entry.examples.push(UnresolvedExample {
                doc_id: u.doc_id.clone(),
                source: item.map_or(Source::Reddit, |i| i.source),
                context: u.context.chars().take(280).collect(),
                candidates: u.candidates.clone(),
            });
        }
    }

    let mut surfaces: Vec<UnresolvedSurface> = agg.into_values().collect();
    surfaces.sort_by(|a, b| {
        b.impact
            .partial_cmp(&a.impact)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.surface.cmp(&b.surface))
    });
    surfaces.truncate(TOP_N);
    surfaces
}
