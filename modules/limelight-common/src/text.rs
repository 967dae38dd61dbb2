//! Text utilities shared by normalization, alias matching, and sentiment.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Delimiter inserted between title / caption / body when building
/// `text_all`. Chosen so sentence splitting treats each field as its own
/// sentence boundary and span offsets stay meaningful.
pub const FIELD_DELIMITER: &str = "\n";

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn control_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]").unwrap())
}

fn punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").unwrap())
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+|\n+").unwrap())
}

fn pronoun_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(they|them|their|theirs|he|him|his|she|her|hers|it|its)\b").unwrap()
    })
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9']+").unwrap())
}

/// Collapse whitespace, normalize unicode quotes/dashes, strip control
/// characters. Markup stripping is the adapters' job; this is the common
/// final pass.
pub fn clean_text(text: &str) -> String {
    let text = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "--");
    let text = control_re().replace_all(&text, "");
    ws_re().replace_all(text.trim(), " ").into_owned()
}

/// Normalized form used for alias matching and queue aggregation:
/// lowercase, punctuation replaced by whitespace, whitespace collapsed.
pub fn normalize_surface(s: &str) -> String {
    let lower = s.to_lowercase();
    let stripped = punct_re().replace_all(&lower, " ");
    ws_re().replace_all(stripped.trim(), " ").into_owned()
}

/// Rule-based sentence splitter. Deterministic; good enough for alias
/// windows and sentiment context.
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_spans(text)
        .into_iter()
        .map(|(start, end)| text[start..end].to_string())
        .collect()
}

/// Sentence boundaries as byte ranges into the input, so mention spans in
/// `text_all` coordinates can be tied back to their sentence.
pub fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for m in sentence_re().find_iter(text) {
        let piece = text[cursor..m.start()].trim();
        if !piece.is_empty() {
            let lead = text[cursor..m.start()].len() - text[cursor..m.start()].trim_start().len();
            spans.push((cursor + lead, cursor + lead + piece.len()));
        }
        cursor = m.end();
    }
    let piece = text[cursor..].trim();
    if !piece.is_empty() {
        let lead = text[cursor..].len() - text[cursor..].trim_start().len();
        spans.push((cursor + lead, cursor + lead + piece.len()));
    }
    spans
}

/// Word tokens with byte offsets, lowercase comparison left to the caller.
pub fn word_spans(text: &str) -> Vec<(usize, usize)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\w+").unwrap());
    re.find_iter(text).map(|m| (m.start(), m.end())).collect()
}

pub fn has_pronoun(sentence: &str) -> bool {
    pronoun_re().is_match(sentence)
}

/// First pronoun in the sentence, with its byte span.
pub fn find_pronoun(sentence: &str) -> Option<(usize, usize, &str)> {
    pronoun_re()
        .find(sentence)
        .map(|m| (m.start(), m.end(), m.as_str()))
}

/// Lowercase word tokens for context-hint overlap scoring.
pub fn tokens(text: &str) -> Vec<String> {
    word_re()
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// SHA-256 hex digest of arbitrary content; used for deterministic ids.
pub fn content_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Similarity hash for exact-duplicate detection: SHA-256 over the
/// lowercased first 1000 chars of `text_all`.
pub fn similarity_hash(text_all: &str) -> String {
    let lower = text_all.to_lowercase();
    let prefix: String = lower.chars().take(1000).collect();
    content_hash(&prefix)
}

/// English gate for v1: headline text routinely drops function words, so
/// the test is script-based — mostly-Latin text passes, non-Latin text
/// does not. Latin-script non-English slips through; acceptable for now.
pub fn looks_english(text: &str) -> bool {
    let alphabetic: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alphabetic.is_empty() {
        return false;
    }
    let ascii = alphabetic.iter().filter(|c| c.is_ascii()).count();
    ascii as f64 / alphabetic.len() as f64 >= 0.8
}

pub fn log1p(x: f64) -> f64 {
    (1.0 + x.max(0.0)).ln()
}
