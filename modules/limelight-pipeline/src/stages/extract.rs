//! Stage 3: purely lexical mention extraction. Finds alias occurrences in
//! each document with their sentence index and candidate entity list;
//! attribution is the resolver's job.

use limelight_catalog::{AliasIndex, AliasMatch};
use limelight_common::{text::sentence_spans, Document};
use tracing::info;

/// One document's candidate tuples plus its sentence layout, computed once
/// so resolve and score see the same segmentation.
pub struct DocCandidates {
    pub doc_id: String,
    pub sentences: Vec<(usize, usize)>,
    pub matches: Vec<SentenceMatch>,
}

pub struct SentenceMatch {
    pub sent_idx: usize,
    pub alias: AliasMatch,
}

pub fn run(documents: &[Document], index: &AliasIndex) -> Vec<DocCandidates> {
    let mut out: Vec<DocCandidates> = documents
        .iter()
        .map(|doc| extract_document(doc, index))
        .collect();
    out.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
    let total: usize = out.iter().map(|d| d.matches.len()).sum();
    info!(
        candidates = total,
        documents = documents.len(),
        "Mention extraction complete"
    );
    out
}

fn extract_document(doc: &Document, index: &AliasIndex) -> DocCandidates {
    let sentences = sentence_spans(&doc.text_all);
    let matches = index
        .find_matches(&doc.text_all)
        .into_iter()
        .map(|alias| SentenceMatch {
            sent_idx: sentence_for_offset(&sentences, alias.span_start),
            alias,
        })
        .collect();
    DocCandidates {
        doc_id: doc.doc_id.clone(),
        sentences,
        matches,
    }
}

fn sentence_for_offset(sentences: &[(usize, usize)], offset: usize) -> usize {
    sentences
        .iter()
        .position(|&(start, end)| offset >= start && offset < end)
        .unwrap_or(0)
}
