//! Alias index: normalized alias → candidate entity ids, plus the lexical
//! scan that produces mention candidates.
//!
//! Matching is token-sequence based so alias normalization (punctuation →
//! whitespace) and document text agree on word boundaries, while spans stay
//! in `text_all` byte coordinates.

use std::collections::{BTreeMap, HashMap};

use limelight_common::{normalize_surface, text::word_spans, CatalogEntry};

/// One alias occurrence in a document, pre-resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasMatch {
    pub alias_norm: String,
    /// Byte span in `text_all`.
    pub span_start: usize,
    pub span_end: usize,
    /// Surface text as it appears in the document.
    pub surface: String,
    /// Entity ids sharing this normalized alias, sorted.
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    /// Normalized alias token sequence → sorted candidate entity ids.
    by_tokens: HashMap<Vec<String>, Vec<String>>,
    max_alias_tokens: usize,
}

impl AliasIndex {
    pub fn build(entries: &[CatalogEntry]) -> Self {
        // BTreeMap during construction keeps candidate order stable.
        let mut by_norm: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in entries {
            for alias in &entry.aliases {
                let norm = normalize_surface(alias);
                if norm.is_empty() {
                    continue;
                }
                let ids = by_norm.entry(norm).or_default();
                if !ids.contains(&entry.entity.entity_id) {
                    ids.push(entry.entity.entity_id.clone());
                }
            }
        }

        let mut by_tokens = HashMap::new();
        let mut max_alias_tokens = 0;
        for (norm, mut ids) in by_norm {
            ids.sort();
            let toks: Vec<String> = norm.split(' ').map(str::to_string).collect();
            max_alias_tokens = max_alias_tokens.max(toks.len());
            by_tokens.insert(toks, ids);
        }
        Self {
            by_tokens,
            max_alias_tokens,
        }
    }

    pub fn alias_count(&self) -> usize {
        self.by_tokens.len()
    }

    pub fn candidates(&self, surface: &str) -> Option<&Vec<String>> {
        let norm = normalize_surface(surface);
        let toks: Vec<String> = norm.split(' ').map(str::to_string).collect();
        self.by_tokens.get(&toks)
    }

    /// All non-overlapping alias occurrences in `text`. On overlap the
    /// longer match wins; ties break toward the earlier start offset.
    pub fn find_matches(&self, text: &str) -> Vec<AliasMatch> {
        let words = word_spans(text);
        let lowered: Vec<String> = words
            .iter()
            .map(|&(s, e)| text[s..e].to_lowercase())
            .collect();

        let mut raw: Vec<AliasMatch> = Vec::new();
        for start in 0..words.len() {
            for len in 1..=self.max_alias_tokens.min(words.len() - start) {
                let window = &lowered[start..start + len];
                if let Some(ids) = self.by_tokens.get(window) {
                    let span_start = words[start].0;
                    let span_end = words[start + len - 1].1;
                    raw.push(AliasMatch {
                        alias_norm: window.join(" "),
                        span_start,
                        span_end,
                        surface: text[span_start..span_end].to_string(),
                        candidates: ids.clone(),
                    });
                }
            }
        }

        // Longest-wins overlap resolution with deterministic tie-breaks.
        raw.sort_by(|a, b| {
            let la = a.span_end - a.span_start;
            let lb = b.span_end - b.span_start;
            lb.cmp(&la)
                .then(a.span_start.cmp(&b.span_start))
                .then(a.alias_norm.cmp(&b.alias_norm))
        });
        let mut accepted: Vec<AliasMatch> = Vec::new();
        for m in raw {
            let overlaps = accepted
                .iter()
                .any(|a| m.span_start < a.span_end && a.span_start < m.span_end);
            if !overlaps {
                accepted.push(m);
            }
        }
        accepted.sort_by_key(|m| m.span_start);
        accepted
    }
}
