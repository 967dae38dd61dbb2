//! GDELT news adapter: keyword query over the doc API, domain allowlist,
//! article body extraction with boilerplate stripped.

use std::collections::HashMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use limelight_common::{DailyWindow, Source, SourceItem};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::{http_client, IngestError, Result, SourceAdapter};

const API_BASE: &str = "https://api.gdeltproject.org/api/v2/doc/doc";

pub struct GdeltAdapter {
    client: reqwest::Client,
    keywords: Vec<String>,
    allowlist: Vec<String>,
    max_articles: u32,
}

#[derive(Debug, Deserialize)]
struct ArticleList {
    #[serde(default = "Vec::new")]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    seendate: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    tone: Option<f64>,
}

impl GdeltAdapter {
    pub fn new(keywords: Vec<String>, allowlist: Vec<String>, max_articles: u32) -> Result<Self> {
        let allowlist = allowlist
            .into_iter()
            .map(|d| base_domain(&d.to_lowercase()))
            .collect();
        Ok(Self {
            client: http_client()?,
            keywords,
            allowlist,
            max_articles,
        })
    }

    fn domain_allowed(&self, domain: &str) -> bool {
        if self.allowlist.is_empty() {
            return true;
        }
        let base = base_domain(&domain.to_lowercase());
        self.allowlist.iter().any(|d| *d == base)
    }

    async fn query_articles(&self, window: &DailyWindow) -> Result<Vec<Article>> {
        let query = self
            .keywords
            .iter()
            .map(|k| {
                if k.contains(' ') {
                    format!("\"{k}\"")
                } else {
                    k.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" OR ");
        let resp = self
            .client
            .get(API_BASE)
            .query(&[
                ("query", query.as_str()),
                ("mode", "artlist"),
                ("format", "json"),
                ("maxrecords", &self.max_articles.to_string()),
                ("startdatetime", &gdelt_time(window.start)),
                ("enddatetime", &gdelt_time(window.end)),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IngestError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        let list: ArticleList = resp
            .json()
            .await
            .map_err(|e| IngestError::Parse(e.to_string()))?;
        Ok(list.articles)
    }

    async fn article_body(&self, article_url: &str) -> Option<String> {
        let resp = self.client.get(article_url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let html = resp.text().await.ok()?;
        let body = extract_paragraph_text(&html);
        if body.is_empty() {
            None
        } else {
            Some(body)
        }
    }
}

#[async_trait]
impl SourceAdapter for GdeltAdapter {
    fn name(&self) -> &'static str {
        "gdelt"
    }

    async fn fetch(&self, window: &DailyWindow) -> Result<Vec<SourceItem>> {
        let articles = self.query_articles(window).await?;
        let mut items = Vec::new();
        let mut filtered = 0usize;

        for article in articles {
            if !self.domain_allowed(&article.domain) {
                filtered += 1;
                continue;
            }
            let Some(published) = parse_seendate(&article.seendate) else {
                continue;
            };
            if !window.contains(published) {
                continue;
            }
            let body = self.article_body(&article.url).await.unwrap_or_default();

            let mut engagement = HashMap::new();
            engagement.insert("tone".to_string(), article.tone.unwrap_or(0.0));

            items.push(SourceItem {
                item_id: format!(
                    "gdelt_article_{}",
                    limelight_common::content_hash(&article.url)
                        .chars()
                        .take(24)
                        .collect::<String>()
                ),
                source: Source::Gdelt,
                url: article.url,
                published_at: published,
                fetched_at: Utc::now(),
                title: article.title,
                description: body,
                author: None,
                engagement,
                raw_payload: serde_json::json!({ "domain": article.domain }),
            });
        }

        if filtered > 0 {
            warn!(filtered, "Articles outside domain allowlist dropped");
        }
        info!(items = items.len(), "GDELT ingest complete");
        Ok(items)
    }
}

/// GDELT timestamps are `YYYYMMDDHHMMSS` in UTC.
fn gdelt_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%d%H%M%S").to_string()
}

fn parse_seendate(s: &str) -> Option<DateTime<Utc>> {
    // Both "20260801T120000Z" and "20260801120000" appear in the wild.
    let cleaned: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    NaiveDateTime::parse_from_str(&cleaned, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Base domain: hostname minus a leading `www.`, case-insensitive.
fn base_domain(domain_or_url: &str) -> String {
    let host = if domain_or_url.contains("://") {
        Url::parse(domain_or_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| domain_or_url.to_string())
    } else {
        domain_or_url.to_string()
    };
    host.to_lowercase()
        .trim_start_matches("www.")
        .to_string()
}

/// Crude boilerplate strip: drop script/style blocks, keep paragraph text,
/// unescape the handful of entities that matter for alias matching.
fn extract_paragraph_text(html: &str) -> String {
    static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
    static PARA_RE: OnceLock<Regex> = OnceLock::new();
    static TAG_RE: OnceLock<Regex> = OnceLock::new();

    let script_re = SCRIPT_RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>").unwrap()
    });
    let para_re = PARA_RE.get_or_init(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").unwrap());
    let tag_re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());

    let html = script_re.replace_all(html, " ");
    let mut paragraphs = Vec::new();
    for cap in para_re.captures_iter(&html) {
        let inner = tag_re.replace_all(&cap[1], " ");
        let text = inner
            .replace("&amp;", "&")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&nbsp;", " ");
        let text = limelight_common::clean_text(&text);
        if text.split_whitespace().count() >= 5 {
            paragraphs.push(text);
        }
    }
    paragraphs.join(" ")
}
