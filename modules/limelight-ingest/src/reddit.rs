//! Reddit adapter: per-community new posts plus top comments, windowed.
//!
//! Uses the OAuth client-credentials flow; read-only scope is enough.
//! Every post and every comment becomes its own SourceItem with the
//! source-native id baked into `item_id`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use limelight_common::{DailyWindow, Source, SourceItem};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{http_client, IngestError, Result, SourceAdapter};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

pub struct RedditAdapter {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    user_agent: String,
    subreddits: Vec<String>,
    max_posts: u32,
    max_comments: u32,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: ThingData,
}

#[derive(Debug, Default, Deserialize)]
struct ThingData {
    id: Option<String>,
    title: Option<String>,
    selftext: Option<String>,
    body: Option<String>,
    author: Option<String>,
    permalink: Option<String>,
    created_utc: Option<f64>,
    score: Option<i64>,
    num_comments: Option<i64>,
    upvote_ratio: Option<f64>,
    subreddit: Option<String>,
}

impl RedditAdapter {
    pub fn new(
        client_id: String,
        client_secret: String,
        user_agent: String,
        subreddits: Vec<String>,
        max_posts: u32,
        max_comments: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            client_id,
            client_secret,
            user_agent,
            subreddits,
            max_posts,
            max_comments,
        })
    }

    async fn access_token(&self) -> Result<String> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(IngestError::Auth(
                "REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET not set".to_string(),
            ));
        }
        let resp = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(IngestError::Auth(format!(
                "token endpoint returned {status}"
            )));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| IngestError::Parse(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, token: &str, path: &str) -> Result<T> {
        let resp = self
            .client
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(IngestError::QuotaExhausted("reddit rate limit".to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IngestError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        resp.json()
            .await
            .map_err(|e| IngestError::Parse(e.to_string()))
    }

    fn post_item(&self, d: &ThingData, published: DateTime<Utc>) -> Option<SourceItem> {
        let id = d.id.as_deref()?;
        let permalink = d.permalink.as_deref().unwrap_or_default();
        let mut engagement = HashMap::new();
        engagement.insert("score".to_string(), d.score.unwrap_or(0) as f64);
        engagement.insert(
            "num_comments".to_string(),
            d.num_comments.unwrap_or(0) as f64,
        );
        if let Some(r) = d.upvote_ratio {
            engagement.insert("upvote_ratio".to_string(), r);
        }
        Some(SourceItem {
            item_id: format!("reddit_post_{id}"),
            source: Source::Reddit,
            url: format!("https://reddit.com{permalink}"),
            published_at: published,
            fetched_at: Utc::now(),
            title: d.title.clone().unwrap_or_default(),
            description: d.selftext.clone().unwrap_or_default(),
            author: d.author.clone(),
            engagement,
            raw_payload: serde_json::json!({
                "subreddit": d.subreddit,
                "post_id": id,
                "post_type": "post",
            }),
        })
    }

    fn comment_item(
        &self,
        d: &ThingData,
        post_id: &str,
        post_title: &str,
        published: DateTime<Utc>,
    ) -> Option<SourceItem> {
        let id = d.id.as_deref()?;
        let body = d.body.as_deref().unwrap_or_default();
        if body.is_empty() || body == "[deleted]" || body == "[removed]" {
            return None;
        }
        let permalink = d.permalink.as_deref().unwrap_or_default();
        let mut engagement = HashMap::new();
        engagement.insert("score".to_string(), d.score.unwrap_or(0) as f64);
        let title: String = post_title.chars().take(100).collect();
        Some(SourceItem {
            item_id: format!("reddit_comment_{id}"),
            source: Source::RedditComment,
            url: format!("https://reddit.com{permalink}"),
            published_at: published,
            fetched_at: Utc::now(),
            title: format!("Comment on: {title}"),
            description: body.to_string(),
            author: d.author.clone(),
            engagement,
            raw_payload: serde_json::json!({
                "subreddit": d.subreddit,
                "post_id": post_id,
                "comment_id": id,
                "post_type": "comment",
            }),
        })
    }
}

fn parse_created(created_utc: Option<f64>) -> Option<DateTime<Utc>> {
    created_utc.and_then(|ts| Utc.timestamp_opt(ts as i64, 0).single())
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn fetch(&self, window: &DailyWindow) -> Result<Vec<SourceItem>> {
        let token = self.access_token().await?;
        let mut items = Vec::new();

        for subreddit in &self.subreddits {
            let listing = match self
                .get_json::<Listing>(
                    &token,
                    &format!("/r/{subreddit}/new?limit={}", self.max_posts),
                )
                .await
            {
                Ok(l) => l,
                Err(e) if e.is_unrecoverable() => return Err(e),
                Err(e) => {
                    warn!(subreddit, error = %e, "Subreddit fetch failed, skipping");
                    continue;
                }
            };

            for thing in &listing.data.children {
                if thing.kind != "t3" {
                    continue;
                }
                let Some(published) = parse_created(thing.data.created_utc) else {
                    continue;
                };
                if !window.contains(published) {
                    continue;
                }
                let Some(post) = self.post_item(&thing.data, published) else {
                    continue;
                };
                let post_id = thing.data.id.clone().unwrap_or_default();
                let post_title = post.title.clone();
                items.push(post);

                // Top comments, window-filtered like the posts. The
                // comments endpoint returns [post listing, comment listing].
                match self
                    .get_json::<Vec<Listing>>(
                        &token,
                        &format!(
                            "/comments/{post_id}?limit={}&sort=top&depth=1",
                            self.max_comments
                        ),
                    )
                    .await
                {
                    Ok(listings) => {
                        let comments = listings
                            .into_iter()
                            .nth(1)
                            .map(|l| l.data.children)
                            .unwrap_or_default();
                        for c in &comments {
                            if c.kind != "t1" {
                                continue;
                            }
                            let Some(c_published) = parse_created(c.data.created_utc) else {
                                continue;
                            };
                            if !window.contains(c_published) {
                                continue;
                            }
                            if let Some(item) =
                                self.comment_item(&c.data, &post_id, &post_title, c_published)
                            {
                                items.push(item);
                            }
                        }
                    }
                    Err(e) if e.is_unrecoverable() => return Err(e),
                    Err(e) => {
                        warn!(post_id, error = %e, "Comment fetch failed, keeping post only")
                    }
                }
            }
        }

        info!(
            items = items.len(),
            subreddits = self.subreddits.len(),
            "Reddit ingest complete"
        );
        Ok(items)
    }
}
