//! Stage 2: SourceItem → Document. Deterministic: the same item always
//! yields the same doc_id and text fields. Non-English and empty items
//! are rejected (the SourceItem row stays, no Document is produced).

use limelight_common::{
    clean_text, content_hash, similarity_hash, text::looks_english, text::FIELD_DELIMITER,
    Document, PipelineError, Source, SourceItem,
};
use tracing::{debug, info};

const MIN_TEXT_CHARS: usize = 10;

/// The item stays in the store; only the Document is withheld.
fn reject(item: &SourceItem, reason: &str) {
    let e = PipelineError::NormalizationReject(format!("{}: {reason}", item.item_id));
    debug!(error = %e, "Document gate");
}

pub fn run(items: &[SourceItem]) -> Vec<Document> {
    let mut documents: Vec<Document> = items.iter().filter_map(normalize_item).collect();
    documents.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
    info!(
        documents = documents.len(),
        items = items.len(),
        "Normalization complete"
    );
    documents
}

fn normalize_item(item: &SourceItem) -> Option<Document> {
    let text_title = clean_text(&item.title);
    // Video descriptions read as captions (uploader voice); everything
    // else is conversation or article body.
    let (text_caption, text_body) = match item.source {
        Source::Youtube => (clean_text(&item.description), String::new()),
        Source::Reddit | Source::RedditComment | Source::YoutubeComment | Source::Gdelt => {
            (String::new(), clean_text(&item.description))
        }
    };

    let text_all = [
        text_title.as_str(),
        text_caption.as_str(),
        text_body.as_str(),
    ]
    .iter()
    .filter(|s| !s.is_empty())
    .cloned()
    .collect::<Vec<_>>()
    .join(FIELD_DELIMITER);

    if text_all.len() < MIN_TEXT_CHARS {
        reject(item, "below minimum length");
        return None;
    }
    if !looks_english(&text_all) {
        reject(item, "failed language gate");
        return None;
    }

    let mut quality_flags = Vec::new();
    if text_title.is_empty() {
        quality_flags.push("no_title".to_string());
    }
    if text_body.is_empty() {
        quality_flags.push("no_body".to_string());
    }

    Some(Document {
        doc_id: format!("doc_{}", &content_hash(&item.item_id)[..16]),
        item_id: item.item_id.clone(),
        doc_timestamp: item.published_at,
        lang: "en".to_string(),
        text_title,
        text_caption,
        text_body,
        hash_sim: similarity_hash(&text_all),
        text_all,
        quality_flags,
    })
}
