//! Mention and unresolved-mention persistence. The unresolved queue is
//! append-only within a run; only resolved mentions ever enter scoring.

use chrono::{DateTime, Utc};
use limelight_common::{Mention, UnresolvedMention};

use crate::error::{Result, StoreError};
use crate::store::Store;

#[derive(Debug, sqlx::FromRow)]
struct MentionRow {
    mention_id: String,
    doc_id: String,
    entity_id: String,
    sent_idx: i64,
    span_start: i64,
    span_end: i64,
    surface: String,
    is_implicit: bool,
    weight: f64,
    resolve_confidence: f64,
    features: String,
}

impl MentionRow {
    fn into_mention(self) -> Result<Mention> {
        Ok(Mention {
            mention_id: self.mention_id,
            doc_id: self.doc_id,
            entity_id: self.entity_id,
            sent_idx: self.sent_idx as usize,
            span_start: self.span_start as usize,
            span_end: self.span_end as usize,
            surface: self.surface,
            is_implicit: self.is_implicit,
            weight: self.weight,
            resolve_confidence: self.resolve_confidence,
            features: serde_json::from_str(&self.features)
                .map_err(|e| StoreError::corrupt("mentions", e))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UnresolvedRow {
    unresolved_id: String,
    doc_id: String,
    surface: String,
    surface_norm: String,
    sent_idx: i64,
    context: String,
    candidates: String,
    top_score: f64,
    second_score: f64,
    created_at: DateTime<Utc>,
}

impl UnresolvedRow {
    fn into_unresolved(self) -> Result<UnresolvedMention> {
        Ok(UnresolvedMention {
            unresolved_id: self.unresolved_id,
            doc_id: self.doc_id,
            surface: self.surface,
            surface_norm: self.surface_norm,
            sent_idx: self.sent_idx as usize,
            context: self.context,
            candidates: serde_json::from_str(&self.candidates)
                .map_err(|e| StoreError::corrupt("unresolved_mentions", e))?,
            top_score: self.top_score,
            second_score: self.second_score,
            created_at: self.created_at,
        })
    }
}

impl Store {
    /// Mention ids are content-derived, so parallel workers and reruns
    /// cannot produce conflicting rows.
    pub async fn insert_mention(&self, m: &Mention) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO mentions
                (mention_id, doc_id, entity_id, sent_idx, span_start, span_end,
                 surface, is_implicit, weight, resolve_confidence, features)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&m.mention_id)
        .bind(&m.doc_id)
        .bind(&m.entity_id)
        .bind(m.sent_idx as i64)
        .bind(m.span_start as i64)
        .bind(m.span_end as i64)
        .bind(&m.surface)
        .bind(m.is_implicit)
        .bind(m.weight)
        .bind(m.resolve_confidence)
        .bind(serde_json::to_string(&m.features).unwrap_or_else(|_| "{}".into()))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn insert_unresolved(&self, u: &UnresolvedMention) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO unresolved_mentions
                (unresolved_id, doc_id, surface, surface_norm, sent_idx, context,
                 candidates, top_score, second_score, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&u.unresolved_id)
        .bind(&u.doc_id)
        .bind(&u.surface)
        .bind(&u.surface_norm)
        .bind(u.sent_idx as i64)
        .bind(&u.context)
        .bind(serde_json::to_string(&u.candidates).unwrap_or_else(|_| "[]".into()))
        .bind(u.top_score)
        .bind(u.second_score)
        .bind(u.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn mentions_for_docs(&self, doc_ids: &[String]) -> Result<Vec<Mention>> {
        let mut out = Vec::new();
        for chunk in doc_ids.chunks(500) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT * FROM mentions WHERE doc_id IN ({placeholders}) ORDER BY mention_id"
            );
            let mut q = sqlx::query_as::<_, MentionRow>(&sql);
            for doc_id in chunk {
                q = q.bind(doc_id);
            }
            for row in q.fetch_all(self.pool()).await? {
                out.push(row.into_mention()?);
            }
        }
        Ok(out)
    }

    /// The unresolved queue, newest first. This is the read surface the
    /// resolve-queue UI consumes.
    pub async fn unresolved_queue(&self, limit: i64) -> Result<Vec<UnresolvedMention>> {
        let rows = sqlx::query_as::<_, UnresolvedRow>(
            "SELECT * FROM unresolved_mentions ORDER BY created_at DESC, unresolved_id LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(UnresolvedRow::into_unresolved).collect()
    }

    /// Resolved-mention count for an entity over a timestamp range; feeds
    /// the weekly baseline's rolling-volume component.
    pub async fn mention_count_between(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM mentions m
            JOIN documents d ON m.doc_id = d.doc_id
            WHERE m.entity_id = ?1 AND d.doc_timestamp >= ?2 AND d.doc_timestamp < ?3
            "#,
        )
        .bind(entity_id)
        .bind(start)
        .bind(end)
        .fetch_one(self.pool())
        .await?;
        Ok(count.0 as u64)
    }
}
