//! Stage 2b: drop exact duplicates by similarity hash. On collision the
//! earliest doc_timestamp survives; ties break on doc_id.

use std::collections::HashMap;

use limelight_common::Document;
use tracing::info;

pub struct DedupeOutput {
    pub documents: Vec<Document>,
    pub dropped: Vec<String>,
}

pub fn run(documents: Vec<Document>) -> DedupeOutput {
    let mut by_hash: HashMap<String, Document> = HashMap::new();
    let mut dropped = Vec::new();

    for doc in documents {
        match by_hash.get(&doc.hash_sim) {
            None => {
                by_hash.insert(doc.hash_sim.clone(), doc);
            }
            Some(kept) => {
                let incoming_wins = (doc.doc_timestamp, &doc.doc_id)
                    < (kept.doc_timestamp, &kept.doc_id);
                if incoming_wins {
                    let old = by_hash.insert(doc.hash_sim.clone(), doc);
                    if let Some(old) = old {
                        dropped.push(old.doc_id);
                    }
                } else {
                    dropped.push(doc.doc_id);
                }
            }
        }
    }

    let mut documents: Vec<Document> = by_hash.into_values().collect();
    documents.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
    dropped.sort();

    if !dropped.is_empty() {
        info!(dropped = dropped.len(), "Duplicate documents dropped");
    }
    DedupeOutput { documents, dropped }
}
