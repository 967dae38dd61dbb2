//! Source-specific engagement scoring, shared by aggregation and drivers.

use limelight_common::{text::log1p, Source, SourceItem};

/// Engagement score of a source item on a roughly comparable log scale.
pub fn engagement_score(item: &SourceItem) -> f64 {
    match item.source {
        Source::Reddit => {
            let score = item.engagement_value("score");
            let comments = item.engagement_value("num_comments");
            log1p(score + 2.0 * comments)
        }
        Source::RedditComment => log1p(item.engagement_value("score")),
        Source::Youtube => {
            let views = item.engagement_value("view_count");
            let likes = item.engagement_value("like_count");
            let comments = item.engagement_value("comment_count");
            3.0 * log1p(views / 1000.0) + 2.0 * log1p(10.0 * likes) + log1p(5.0 * comments)
        }
        Source::YoutubeComment => {
            let likes = item.engagement_value("like_count");
            let replies = item.engagement_value("reply_count");
            log1p(10.0 * likes + 5.0 * replies)
        }
        Source::Gdelt => log1p(10.0 * item.engagement_value("tone").abs()),
    }
}

/// Short human-readable engagement figure for driver reasons
/// ("150 upvotes", "40K views").
pub fn engagement_figure(item: &SourceItem) -> String {
    match item.source {
        Source::Reddit => format!("{} upvotes", item.engagement_value("score") as i64),
        Source::RedditComment => format!("{} points", item.engagement_value("score") as i64),
        Source::Youtube => format!("{} views", abbreviate(item.engagement_value("view_count"))),
        Source::YoutubeComment => {
            format!("{} likes", item.engagement_value("like_count") as i64)
        }
        Source::Gdelt => format!("tone {:+.1}", item.engagement_value("tone")),
    }
}

fn abbreviate(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.0}K", n / 1_000.0)
    } else {
        format!("{}", n as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn item(source: Source, engagement: &[(&str, f64)]) -> SourceItem {
        SourceItem {
            item_id: "i".into(),
            source,
            url: String::new(),
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            title: String::new(),
            description: String::new(),
            author: None,
            engagement: engagement
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<HashMap<_, _>>(),
            raw_payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn video_outranks_modest_forum_post() {
        let post = item(Source::Reddit, &[("score", 10.0), ("num_comments", 2.0)]);
        let video = item(
            Source::Youtube,
            &[
                ("view_count", 100_000.0),
                ("like_count", 3_000.0),
                ("comment_count", 500.0),
            ],
        );
        let post_score = engagement_score(&post);
        let video_score = engagement_score(&video);
        assert!((post_score - (1.0f64 + 14.0).ln()).abs() < 1e-9);
        assert!(video_score > 10.0 * post_score);
    }

    #[test]
    fn negative_forum_score_clamps_to_zero() {
        let buried = item(Source::RedditComment, &[("score", -40.0)]);
        assert_eq!(engagement_score(&buried), 0.0);
    }

    #[test]
    fn news_tone_uses_magnitude() {
        let grim = item(Source::Gdelt, &[("tone", -4.2)]);
        let cheerful = item(Source::Gdelt, &[("tone", 4.2)]);
        assert_eq!(engagement_score(&grim), engagement_score(&cheerful));
        assert!(engagement_score(&grim) > 0.0);
    }

    #[test]
    fn figures_read_naturally() {
        let video = item(Source::Youtube, &[("view_count", 40_000.0)]);
        assert_eq!(engagement_figure(&video), "40K views");
        let post = item(Source::Reddit, &[("score", 150.0)]);
        assert_eq!(engagement_figure(&post), "150 upvotes");
    }
}
