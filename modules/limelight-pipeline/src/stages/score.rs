//! Stage 5: attach a sentiment distribution, intensity, and lexical
//! features to every resolved mention. The scorer is a trait object so
//! the transformer endpoint and the lexicon fallback are interchangeable.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use limelight_common::{text::sentence_spans, Document, Mention, MentionFeatures, SourceItem};
use limelight_nlp::sentiment::{desire_score, support_score};
use limelight_nlp::SentimentScorer;
use tracing::info;

use super::engagement::engagement_score;

pub async fn run(
    mentions: Vec<Mention>,
    documents: &[Document],
    items_by_id: &HashMap<String, SourceItem>,
    scorer: &dyn SentimentScorer,
    workers: usize,
) -> Vec<Mention> {
    let sentences_by_doc: HashMap<&str, (&Document, Vec<(usize, usize)>)> = documents
        .iter()
        .map(|d| (d.doc_id.as_str(), (d, sentence_spans(&d.text_all))))
        .collect();

    let total = mentions.len();
    let scored_futures = mentions.into_iter().map(|mut mention| {
        let sentence = sentences_by_doc
            .get(mention.doc_id.as_str())
            .and_then(|(doc, spans)| {
                spans
                    .get(mention.sent_idx)
                    .map(|&(s, e)| doc.text_all[s..e].to_string())
            })
            .unwrap_or_else(|| mention.surface.clone());
        let engagement = sentences_by_doc
            .get(mention.doc_id.as_str())
            .and_then(|(doc, _)| items_by_id.get(&doc.item_id))
            .map(engagement_score)
            .unwrap_or(0.0);
        async move {
            let sentiment = scorer.score(&sentence).await;
            mention.features = MentionFeatures {
                sentiment,
                support_score: support_score(&sentence),
                desire_score: desire_score(&sentence),
                engagement_score: engagement,
            };
            mention
        }
    });

    let mut scored: Vec<Mention> = stream::iter(scored_futures)
        .buffer_unordered(workers.max(1))
        .collect()
        .await;
    scored.sort_by(|a, b| a.mention_id.cmp(&b.mention_id));
    info!(mentions = total, "Sentiment scoring complete");
    scored
}
