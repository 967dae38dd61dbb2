//! Stage 9: per-entity themes over the sentences containing its mentions.
//! Entities below the mention floor get an empty list, not an error.

use std::collections::{BTreeMap, HashMap};

use limelight_common::{text::sentence_spans, Document, EntityDailyTheme, Mention};
use limelight_nlp::{ThemeBuilder, ThemeInput};
use tracing::info;
use uuid::Uuid;

pub async fn run(
    run_id: Uuid,
    mentions: &[Mention],
    documents: &[Document],
    builder: &ThemeBuilder,
    min_mentions: usize,
) -> HashMap<String, Vec<EntityDailyTheme>> {
    let sentences_by_doc: HashMap<&str, (&Document, Vec<(usize, usize)>)> = documents
        .iter()
        .map(|d| (d.doc_id.as_str(), (d, sentence_spans(&d.text_all))))
        .collect();

    let mut by_entity: BTreeMap<&str, Vec<&Mention>> = BTreeMap::new();
    for mention in mentions {
        by_entity
            .entry(mention.entity_id.as_str())
            .or_default()
            .push(mention);
    }

    let mut out: HashMap<String, Vec<EntityDailyTheme>> = HashMap::new();
    for (entity_id, entity_mentions) in by_entity {
        if entity_mentions.len() < min_mentions {
            continue;
        }
        // Content-sorted inputs keep clustering deterministic.
        let mut sorted = entity_mentions;
        sorted.sort_by(|a, b| {
            a.doc_id
                .cmp(&b.doc_id)
                .then(a.sent_idx.cmp(&b.sent_idx))
                .then(a.mention_id.cmp(&b.mention_id))
        });

        let inputs: Vec<ThemeInput> = sorted
            .iter()
            .filter_map(|m| {
                let (doc, spans) = sentences_by_doc.get(m.doc_id.as_str())?;
                let &(s, e) = spans.get(m.sent_idx)?;
                Some(ThemeInput {
                    sentence: doc.text_all[s..e].to_string(),
                    pos: m.features.sentiment.pos,
                    neu: m.features.sentiment.neu,
                    neg: m.features.sentiment.neg,
                })
            })
            .collect();

        let themes: Vec<EntityDailyTheme> = builder
            .build(&inputs)
            .await
            .into_iter()
            .enumerate()
            .map(|(i, t)| EntityDailyTheme {
                run_id,
                entity_id: entity_id.to_string(),
                theme_id: format!("theme_{:02}", i + 1),
                label: t.label,
                keywords: t.keywords,
                volume: t.volume,
                sentiment_mix: t.sentiment_mix,
            })
            .collect();
        if !themes.is_empty() {
            out.insert(entity_id.to_string(), themes);
        }
    }

    let total: usize = out.values().map(Vec::len).sum();
    info!(themes = total, entities = out.len(), "Themes built");
    out
}
