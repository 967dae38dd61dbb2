//! Theme building: cluster the sentences mentioning an entity and label
//! each cluster. Embedding-based clustering when the embedding service is
//! configured; seed-term grouping otherwise.

use std::collections::HashMap;

use async_trait::async_trait;
use limelight_common::{text::tokens, ThemeSentimentMix};
use serde::Deserialize;
use tracing::warn;

pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cosine similarity floor for joining an existing cluster.
const CLUSTER_THRESHOLD: f64 = 0.75;
/// Seed-term pool size for the fallback path.
const SEED_POOL: usize = 10;

const STOPWORDS: [&str; 26] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "it", "its", "this", "that", "they", "them", "she", "he",
];

// --- Embedding seam ---

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Option<Vec<Vec<f32>>>;
}

/// Voyage-style embedding API client.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            model: "voyage-3-lite".to_string(),
        }
    }
}

#[async_trait]
impl TextEmbedder for RemoteEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Option<Vec<Vec<f32>>> {
        if self.api_key.is_empty() || texts.is_empty() {
            return None;
        }
        let resp = self
            .client
            .post("https://api.voyageai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let parsed: EmbedResponse = resp.json().await.ok()?;
        if parsed.data.len() != texts.len() {
            return None;
        }
        Some(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

// --- Theme building ---

/// One mention's contribution: its containing sentence and its sentiment.
#[derive(Debug, Clone)]
pub struct ThemeInput {
    pub sentence: String,
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
}

#[derive(Debug, Clone)]
pub struct ThemeOutput {
    pub label: String,
    pub keywords: Vec<String>,
    pub volume: u64,
    pub sentiment_mix: ThemeSentimentMix,
}

pub struct ThemeBuilder {
    embedder: Option<Box<dyn TextEmbedder>>,
    max_themes: usize,
}

impl ThemeBuilder {
    pub fn new(embedder: Option<Box<dyn TextEmbedder>>, max_themes: usize) -> Self {
        Self {
            embedder,
            max_themes,
        }
    }

    /// Cluster the inputs into at most `max_themes` themes, largest first.
    /// Inputs below the caller's mention floor never reach this point.
    pub async fn build(&self, inputs: &[ThemeInput]) -> Vec<ThemeOutput> {
        if inputs.len() < 2 {
            return Vec::new();
        }
        if let Some(embedder) = &self.embedder {
            let sentences: Vec<String> = inputs.iter().map(|i| i.sentence.clone()).collect();
            match embedder.embed_batch(&sentences).await {
                Some(embeddings) => return self.cluster_embedded(inputs, &embeddings),
                None => warn!("Embedding service unavailable, using seed-term themes"),
            }
        }
        self.cluster_seed_terms(inputs)
    }

    fn cluster_embedded(&self, inputs: &[ThemeInput], embeddings: &[Vec<f32>]) -> Vec<ThemeOutput> {
        // Greedy centroid clustering in input order; input order itself is
        // content-sorted by the caller, so the result is deterministic.
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        let mut centroids: Vec<Vec<f32>> = Vec::new();

        for (idx, emb) in embeddings.iter().enumerate() {
            let mut best: Option<(usize, f64)> = None;
            for (c_idx, centroid) in centroids.iter().enumerate() {
                let sim = cosine_similarity(emb, centroid);
                if sim >= CLUSTER_THRESHOLD && best.map_or(true, |(_, b)| sim > b) {
                    best = Some((c_idx, sim));
                }
            }
            match best {
                Some((c_idx, _)) => {
                    clusters[c_idx].push(idx);
                    centroids[c_idx] = mean_vector(&clusters[c_idx], embeddings);
                }
                None => {
                    clusters.push(vec![idx]);
                    centroids.push(emb.clone());
                }
            }
        }

        let mut themes: Vec<ThemeOutput> = clusters
            .iter()
            .filter(|members| members.len() >= 2)
            .map(|members| self.theme_from_members(inputs, members))
            .collect();
        themes.sort_by(|a, b| b.volume.cmp(&a.volume).then(a.label.cmp(&b.label)));
        themes.truncate(self.max_themes);
        themes
    }

    fn cluster_seed_terms(&self, inputs: &[ThemeInput]) -> Vec<ThemeOutput> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for input in inputs {
            for tok in tokens(&input.sentence) {
                if tok.len() > 3 && !STOPWORDS.contains(&tok.as_str()) {
                    *counts.entry(tok).or_default() += 1;
                }
            }
        }
        let mut seeds: Vec<(String, usize)> =
            counts.into_iter().filter(|(_, c)| *c >= 2).collect();
        seeds.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        seeds.truncate(SEED_POOL);
        if seeds.is_empty() {
            return Vec::new();
        }
        let seed_terms: Vec<&str> = seeds.iter().map(|(t, _)| t.as_str()).collect();

        // Mentions whose sentence shares at least two seed terms form the
        // theme; one shared term is too weak a tie.
        let members: Vec<usize> = inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| {
                let toks = tokens(&input.sentence);
                seed_terms.iter().filter(|s| toks.iter().any(|t| t == *s)).count() >= 2
            })
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 {
            return Vec::new();
        }

        let mut theme = self.theme_from_members(inputs, &members);
        theme.label = titlecase(&seeds[0].0);
        theme.keywords = seeds.iter().take(5).map(|(t, _)| t.clone()).collect();
        vec![theme]
    }

    fn theme_from_members(&self, inputs: &[ThemeInput], members: &[usize]) -> ThemeOutput {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let (mut pos, mut neu, mut neg) = (0.0, 0.0, 0.0);
        for &i in members {
            let input = &inputs[i];
            pos += input.pos;
            neu += input.neu;
            neg += input.neg;
            for tok in tokens(&input.sentence) {
                if tok.len() > 3 && !STOPWORDS.contains(&tok.as_str()) {
                    *counts.entry(tok).or_default() += 1;
                }
            }
        }
        let n = members.len().max(1) as f64;
        let mut keywords: Vec<(String, usize)> = counts.into_iter().collect();
        keywords.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let keywords: Vec<String> = keywords.into_iter().take(5).map(|(t, _)| t).collect();
        let label = keywords
            .first()
            .map(|k| titlecase(k))
            .unwrap_or_else(|| "Conversation".to_string());

        ThemeOutput {
            label,
            keywords,
            volume: members.len() as u64,
            sentiment_mix: ThemeSentimentMix {
                pos: pos / n,
                neu: neu / n,
                neg: neg / n,
            },
        }
    }
}

fn mean_vector(members: &[usize], embeddings: &[Vec<f32>]) -> Vec<f32> {
    let dim = embeddings[members[0]].len();
    let mut mean = vec![0.0f32; dim];
    for &i in members {
        for (d, v) in embeddings[i].iter().enumerate() {
            mean[d] += v;
        }
    }
    let n = members.len() as f32;
    mean.iter_mut().for_each(|v| *v /= n);
    mean
}

fn titlecase(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
