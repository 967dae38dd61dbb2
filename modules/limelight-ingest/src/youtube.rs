//! YouTube adapter: channel uploads within the window, plus optional
//! top-K comments per video. Every API call is metered through the quota
//! ledger before it is made.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use limelight_common::{DailyWindow, Source, SourceItem};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{http_client, IngestError, QuotaLedger, Result, SourceAdapter};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

pub struct YoutubeAdapter {
    client: reqwest::Client,
    api_key: String,
    channels: Vec<String>,
    fetch_comments: bool,
    max_comments: u32,
    ledger: Arc<QuotaLedger>,
}

#[derive(Debug, Deserialize)]
struct ApiList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ChannelResource {
    #[serde(rename = "contentDetails")]
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: VideoStatistics,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount", default)]
    view_count: Option<String>,
    #[serde(rename = "likeCount", default)]
    like_count: Option<String>,
    #[serde(rename = "commentCount", default)]
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentThreadResource {
    id: String,
    snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
struct CommentThreadSnippet {
    #[serde(rename = "topLevelComment")]
    top_level_comment: TopLevelComment,
    #[serde(rename = "totalReplyCount", default)]
    total_reply_count: i64,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
struct CommentSnippet {
    #[serde(rename = "textDisplay", default)]
    text_display: String,
    #[serde(rename = "authorDisplayName", default)]
    author_display_name: String,
    #[serde(rename = "likeCount", default)]
    like_count: i64,
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
}

fn stat(value: &Option<String>) -> f64 {
    value
        .as_deref()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
}

impl YoutubeAdapter {
    pub fn new(
        api_key: String,
        channels: Vec<String>,
        fetch_comments: bool,
        max_comments: u32,
        ledger: Arc<QuotaLedger>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
            channels,
            fetch_comments,
            max_comments,
            ledger,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        self.ledger.charge(operation, 1)?;
        let resp = self
            .client
            .get(format!("{API_BASE}/{path}"))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 403 {
            let body = resp.text().await.unwrap_or_default();
            if body.contains("quotaExceeded") {
                return Err(IngestError::QuotaExhausted("youtube daily quota".into()));
            }
            return Err(IngestError::Auth(body));
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

    async fn uploads_playlist(&self, channel_id: &str) -> Result<String> {
        let list: ApiList<ChannelResource> = self
            .get(
                "channel",
                "channels",
                &[("part", "contentDetails"), ("id", channel_id)],
            )
            .await?;
        list.items
            .into_iter()
            .next()
            .map(|c| c.content_details.related_playlists.uploads)
            .ok_or_else(|| IngestError::Parse(format!("channel {channel_id} not found")))
    }

    async fn windowed_video_ids(
        &self,
        playlist_id: &str,
        window: &DailyWindow,
    ) -> Result<Vec<String>> {
        let list: ApiList<PlaylistItemResource> = self
            .get(
                "playlist_items",
                "playlistItems",
                &[
                    ("part", "snippet"),
                    ("playlistId", playlist_id),
                    ("maxResults", "50"),
                ],
            )
            .await?;
        Ok(list
            .items
            .into_iter()
            .filter(|i| window.contains(i.snippet.published_at))
            .map(|i| i.snippet.resource_id.video_id)
            .collect())
    }

    fn video_item(&self, v: &VideoResource) -> SourceItem {
        let mut engagement = HashMap::new();
        engagement.insert("view_count".to_string(), stat(&v.statistics.view_count));
        engagement.insert("like_count".to_string(), stat(&v.statistics.like_count));
        engagement.insert(
            "comment_count".to_string(),
            stat(&v.statistics.comment_count),
        );
        SourceItem {
            item_id: format!("youtube_video_{}", v.id),
            source: Source::Youtube,
            url: format!("https://www.youtube.com/watch?v={}", v.id),
            published_at: v.snippet.published_at,
            fetched_at: Utc::now(),
            title: v.snippet.title.clone(),
            description: v.snippet.description.clone(),
            author: Some(v.snippet.channel_title.clone()),
            engagement,
            raw_payload: serde_json::json!({ "video_id": v.id }),
        }
    }

    fn comment_item(&self, video_id: &str, video_title: &str, c: &CommentThreadResource) -> SourceItem {
        let snippet = &c.snippet.top_level_comment.snippet;
        let mut engagement = HashMap::new();
        engagement.insert("like_count".to_string(), snippet.like_count as f64);
        engagement.insert(
            "reply_count".to_string(),
            c.snippet.total_reply_count as f64,
        );
        let title: String = video_title.chars().take(100).collect();
        SourceItem {
            item_id: format!("youtube_comment_{}", c.id),
            source: Source::YoutubeComment,
            url: format!("https://www.youtube.com/watch?v={video_id}&lc={}", c.id),
            published_at: snippet.published_at,
            fetched_at: Utc::now(),
            title: format!("Comment on: {title}"),
            description: snippet.text_display.clone(),
            author: Some(snippet.author_display_name.clone()),
            engagement,
            raw_payload: serde_json::json!({
                "video_id": video_id,
                "comment_id": c.id,
            }),
        }
    }
}

#[async_trait]
impl SourceAdapter for YoutubeAdapter {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn fetch(&self, window: &DailyWindow) -> Result<Vec<SourceItem>> {
        if self.api_key.is_empty() {
            return Err(IngestError::Auth("YOUTUBE_API_KEY not set".to_string()));
        }

        let mut items = Vec::new();
        for channel_id in &self.channels {
            let playlist = match self.uploads_playlist(channel_id).await {
                Ok(p) => p,
                Err(e) if e.is_unrecoverable() => return Err(e),
                Err(e) => {
                    warn!(channel_id, error = %e, "Channel resolve failed, skipping");
                    continue;
                }
            };
            let video_ids = match self.windowed_video_ids(&playlist, window).await {
                Ok(ids) => ids,
                Err(e) if e.is_unrecoverable() => return Err(e),
                Err(e) => {
                    warn!(channel_id, error = %e, "Uploads fetch failed, skipping");
                    continue;
                }
            };
            if video_ids.is_empty() {
                continue;
            }

            let ids = video_ids.join(",");
            let videos: ApiList<VideoResource> = self
                .get(
                    "video",
                    "videos",
                    &[("part", "snippet,statistics"), ("id", ids.as_str())],
                )
                .await?;

            for video in &videos.items {
                let video_item = self.video_item(video);
                let video_title = video_item.title.clone();
                items.push(video_item);

                if !self.fetch_comments {
                    continue;
                }
                let max = self.max_comments.to_string();
                match self
                    .get::<ApiList<CommentThreadResource>>(
                        "comment_threads",
                        "commentThreads",
                        &[
                            ("part", "snippet"),
                            ("videoId", video.id.as_str()),
                            ("order", "relevance"),
                            ("maxResults", max.as_str()),
                        ],
                    )
                    .await
                {
                    Ok(threads) => {
                        for thread in &threads.items {
                            items.push(self.comment_item(&video.id, &video_title, thread));
                        }
                    }
                    Err(e) if e.is_unrecoverable() => return Err(e),
                    Err(e) => {
                        warn!(video_id = video.id.as_str(), error = %e, "Comment fetch failed")
                    }
                }
            }
        }

        info!(
            items = items.len(),
            channels = self.channels.len(),
            quota_used = self.ledger.usage(),
            "YouTube ingest complete"
        );
        Ok(items)
    }
}
