//! SourceItem and Document persistence.

use chrono::{DateTime, Utc};
use limelight_common::{Document, Source, SourceItem};

use crate::error::{Result, StoreError};
use crate::store::Store;

#[derive(Debug, sqlx::FromRow)]
struct SourceItemRow {
    item_id: String,
    source: String,
    url: String,
    published_at: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
    title: String,
    description: String,
    author: Option<String>,
    engagement: String,
    raw_payload: String,
}

impl SourceItemRow {
    fn into_item(self) -> Result<SourceItem> {
        Ok(SourceItem {
            item_id: self.item_id,
            source: self
                .source
                .parse::<Source>()
                .map_err(|e| StoreError::corrupt("source_items", e))?,
            url: self.url,
            published_at: self.published_at,
            fetched_at: self.fetched_at,
            title: self.title,
            description: self.description,
            author: self.author,
            engagement: serde_json::from_str(&self.engagement)
                .map_err(|e| StoreError::corrupt("source_items", e))?,
            raw_payload: serde_json::from_str(&self.raw_payload)
                .map_err(|e| StoreError::corrupt("source_items", e))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    doc_id: String,
    item_id: String,
    doc_timestamp: DateTime<Utc>,
    lang: String,
    text_title: String,
    text_caption: String,
    text_body: String,
    text_all: String,
    quality_flags: String,
    hash_sim: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        Ok(Document {
            doc_id: self.doc_id,
            item_id: self.item_id,
            doc_timestamp: self.doc_timestamp,
            lang: self.lang,
            text_title: self.text_title,
            text_caption: self.text_caption,
            text_body: self.text_body,
            text_all: self.text_all,
            quality_flags: serde_json::from_str(&self.quality_flags)
                .map_err(|e| StoreError::corrupt("documents", e))?,
            hash_sim: self.hash_sim,
        })
    }
}

impl Store {
    /// Idempotent upsert keyed by `item_id`; duplicates are silently
    /// ignored so re-ingesting a window is a no-op.
    pub async fn insert_source_item(&self, item: &SourceItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO source_items
                (item_id, source, url, published_at, fetched_at, title, description,
                 author, engagement, raw_payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.item_id)
        .bind(item.source.to_string())
        .bind(&item.url)
        .bind(item.published_at)
        .bind(item.fetched_at)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.author)
        .bind(serde_json::to_string(&item.engagement).unwrap_or_else(|_| "{}".into()))
        .bind(item.raw_payload.to_string())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO documents
                (doc_id, item_id, doc_timestamp, lang, text_title, text_caption,
                 text_body, text_all, quality_flags, hash_sim)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&doc.doc_id)
        .bind(&doc.item_id)
        .bind(doc.doc_timestamp)
        .bind(&doc.lang)
        .bind(&doc.text_title)
        .bind(&doc.text_caption)
        .bind(&doc.text_body)
        .bind(&doc.text_all)
        .bind(serde_json::to_string(&doc.quality_flags).unwrap_or_else(|_| "[]".into()))
        .bind(&doc.hash_sim)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn source_items_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SourceItem>> {
        let rows = sqlx::query_as::<_, SourceItemRow>(
            "SELECT * FROM source_items
             WHERE published_at >= ?1 AND published_at < ?2
             ORDER BY item_id",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(SourceItemRow::into_item).collect()
    }

    pub async fn get_source_item(&self, item_id: &str) -> Result<Option<SourceItem>> {
        let row =
            sqlx::query_as::<_, SourceItemRow>("SELECT * FROM source_items WHERE item_id = ?1")
                .bind(item_id)
                .fetch_optional(self.pool())
                .await?;
        row.map(SourceItemRow::into_item).transpose()
    }

    pub async fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE doc_id = ?1")
            .bind(doc_id)
            .fetch_optional(self.pool())
            .await?;
        row.map(DocumentRow::into_document).transpose()
    }
}
