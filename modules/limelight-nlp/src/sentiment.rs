//! Per-mention sentiment: a distribution {pos, neu, neg} summing to 1 plus
//! an intensity in [0, 1], scored on the sentence containing the mention.
//!
//! Primary path is a social-tuned transformer behind an HTTP inference
//! endpoint; the lexicon fallback honors the identical contract.

use async_trait::async_trait;
use limelight_common::{text::tokens, SentimentScores};
use serde::Deserialize;
use tracing::warn;

/// Model input truncation, in characters.
const MAX_INPUT_CHARS: usize = 500;

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, sentence: &str) -> SentimentScores;
}

// --- Remote transformer endpoint ---

pub struct RemoteSentiment {
    client: reqwest::Client,
    endpoint: String,
    fallback: LexiconSentiment,
}

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    pos: f64,
    neu: f64,
    neg: f64,
    #[serde(default)]
    intensity: Option<f64>,
}

impl RemoteSentiment {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(crate::themes::REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            endpoint,
            fallback: LexiconSentiment,
        }
    }

    /// One round-trip health check at process start.
    pub async fn probe(&self) -> bool {
        self.query("ok").await.is_some()
    }

    async fn query(&self, text: &str) -> Option<SentimentScores> {
        let truncated: String = text.chars().take(MAX_INPUT_CHARS).collect();
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": truncated }))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let parsed: RemoteResponse = resp.json().await.ok()?;
        let total = parsed.pos + parsed.neu + parsed.neg;
        if total <= 0.0 {
            return None;
        }
        Some(SentimentScores {
            pos: parsed.pos / total,
            neu: parsed.neu / total,
            neg: parsed.neg / total,
            intensity: parsed
                .intensity
                .unwrap_or_else(|| (parsed.pos.max(parsed.neg) / total))
                .clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl SentimentScorer for RemoteSentiment {
    async fn score(&self, sentence: &str) -> SentimentScores {
        match self.query(sentence).await {
            Some(scores) => scores,
            None => {
                warn!("Sentiment endpoint unavailable, using lexicon fallback");
                self.fallback.score(sentence).await
            }
        }
    }
}

// --- Lexicon fallback ---

const POSITIVE_WORDS: [&str; 16] = [
    "love", "amazing", "incredible", "great", "perfect", "best", "awesome", "fantastic",
    "brilliant", "excellent", "wonderful", "beautiful", "stunning", "iconic", "legend", "queen",
];

const NEGATIVE_WORDS: [&str; 14] = [
    "hate", "awful", "terrible", "worst", "cringe", "disgusting", "bad", "horrible",
    "disappointing", "boring", "stupid", "ridiculous", "flop", "mess",
];

const INTENSIFIERS: [&str; 8] = [
    "so", "very", "absolutely", "totally", "really", "extremely", "utterly", "completely",
];

const STOPWORDS: [&str; 18] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "was", "it", "this",
];

/// Stems plural/past suffixes just enough for the small lexicons.
fn stem(token: &str) -> &str {
    token
        .strip_suffix("es")
        .or_else(|| token.strip_suffix('s'))
        .or_else(|| token.strip_suffix("ed"))
        .unwrap_or(token)
}

pub struct LexiconSentiment;

#[async_trait]
impl SentimentScorer for LexiconSentiment {
    async fn score(&self, sentence: &str) -> SentimentScores {
        let toks = tokens(sentence);
        let content_words = toks
            .iter()
            .filter(|t| !STOPWORDS.contains(&t.as_str()))
            .count()
            .max(1);

        let mut pos_hits = 0usize;
        let mut neg_hits = 0usize;
        let mut intens_hits = 0usize;
        for tok in &toks {
            let stemmed = stem(tok);
            if POSITIVE_WORDS.contains(&stemmed) || POSITIVE_WORDS.contains(&tok.as_str()) {
                pos_hits += 1;
            } else if NEGATIVE_WORDS.contains(&stemmed) || NEGATIVE_WORDS.contains(&tok.as_str()) {
                neg_hits += 1;
            } else if INTENSIFIERS.contains(&tok.as_str()) {
                intens_hits += 1;
            }
        }

        if pos_hits == 0 && neg_hits == 0 {
            return SentimentScores::neutral();
        }

        let pos_raw = (pos_hits as f64 / content_words as f64).min(1.0);
        let neg_raw = (neg_hits as f64 / content_words as f64).min(1.0);
        let neu_raw = (1.0 - pos_raw - neg_raw).max(0.0);
        let total = pos_raw + neg_raw + neu_raw;

        SentimentScores {
            pos: pos_raw / total,
            neu: neu_raw / total,
            neg: neg_raw / total,
            intensity: ((pos_hits + neg_hits + intens_hits) as f64 / content_words as f64)
                .min(1.0),
        }
    }
}

// --- Support / desire lexical features ---

const SUPPORT_TERMS: [&str; 7] = [
    "iconic", "legend", "queen", "goat", "no notes", "we love", "mother",
]; // fan-speak endorsement markers

const DESIRE_TERMS: [&str; 7] = [
    "can't wait", "need them back", "renew", "sequel", "bring back", "give us", "season",
];

pub fn support_score(sentence: &str) -> f64 {
    let s = sentence.to_lowercase();
    let hits = SUPPORT_TERMS.iter().filter(|t| s.contains(*t)).count();
    (hits as f64 / 2.0).min(1.0)
}

pub fn desire_score(sentence: &str) -> f64 {
    let s = sentence.to_lowercase();
    let hits = DESIRE_TERMS.iter().filter(|t| s.contains(*t)).count();
    (hits as f64 / 2.0).min(1.0)
}
