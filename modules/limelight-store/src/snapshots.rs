//! Per-run snapshot rows (metrics, drivers, themes) and the weekly
//! baseline table. Snapshot rows are write-once per (run_id, entity_id).

use chrono::{DateTime, Utc};
use limelight_common::{
    BaselineSignal, EntityDailyDriver, EntityDailyMetrics, EntityDailyTheme, EntityWeeklyBaseline,
    ThemeSentimentMix,
};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::Store;

/// A prior run's coordinate for one entity, used by the momentum EWMA.
#[derive(Debug, Clone, Copy)]
pub struct FameLovePoint {
    pub window_end: DateTime<Utc>,
    pub fame: f64,
    pub love: f64,
}

impl Store {
    /// Write one entity's full snapshot (metrics + drivers + themes) in a
    /// single transaction, the per-entity transactional boundary of the
    /// persist stage.
    pub async fn write_entity_snapshot(
        &self,
        metrics: &EntityDailyMetrics,
        drivers: &[EntityDailyDriver],
        themes: &[EntityDailyTheme],
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO entity_daily_metrics
                (run_id, entity_id, fame, love, attention, baseline_fame, momentum,
                 polarization, confidence, mentions_explicit, mentions_implicit,
                 sources_distinct, is_dormant, dormancy_reason, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(metrics.run_id.to_string())
        .bind(&metrics.entity_id)
        .bind(metrics.fame)
        .bind(metrics.love)
        .bind(metrics.attention)
        .bind(metrics.baseline_fame)
        .bind(metrics.momentum)
        .bind(metrics.polarization)
        .bind(metrics.confidence)
        .bind(metrics.mentions_explicit as i64)
        .bind(metrics.mentions_implicit as i64)
        .bind(metrics.sources_distinct as i64)
        .bind(metrics.is_dormant)
        .bind(&metrics.dormancy_reason)
        .bind(metrics.metadata.to_string())
        .execute(&mut *tx)
        .await?;

        for d in drivers {
            sqlx::query(
                r#"
                INSERT INTO entity_daily_drivers
                    (run_id, entity_id, rank, item_id, impact_score, reason)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(d.run_id.to_string())
            .bind(&d.entity_id)
            .bind(d.rank as i64)
            .bind(&d.item_id)
            .bind(d.impact_score)
            .bind(&d.reason)
            .execute(&mut *tx)
            .await?;
        }

        for t in themes {
            sqlx::query(
                r#"
                INSERT INTO entity_daily_themes
                    (run_id, entity_id, theme_id, label, keywords, volume, sentiment_mix)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(t.run_id.to_string())
            .bind(&t.entity_id)
            .bind(&t.theme_id)
            .bind(&t.label)
            .bind(serde_json::to_string(&t.keywords).unwrap_or_else(|_| "[]".into()))
            .bind(t.volume as i64)
            .bind(serde_json::to_string(&t.sentiment_mix).unwrap_or_else(|_| "{}".into()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn daily_metrics_for_run(&self, run_id: Uuid) -> Result<Vec<EntityDailyMetrics>> {
        let rows = sqlx::query_as::<_, MetricsRow>(
            "SELECT * FROM entity_daily_metrics WHERE run_id = ?1 ORDER BY entity_id",
        )
        .bind(run_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(MetricsRow::into_metrics).collect()
    }

    pub async fn drivers_for_entity(
        &self,
        run_id: Uuid,
        entity_id: &str,
    ) -> Result<Vec<EntityDailyDriver>> {
        let rows = sqlx::query_as::<_, (String, f64, String, i64)>(
            "SELECT item_id, impact_score, reason, rank FROM entity_daily_drivers
             WHERE run_id = ?1 AND entity_id = ?2 ORDER BY rank",
        )
        .bind(run_id.to_string())
        .bind(entity_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(item_id, impact_score, reason, rank)| EntityDailyDriver {
                run_id,
                entity_id: entity_id.to_string(),
                rank: rank as u32,
                item_id,
                impact_score,
                reason,
            })
            .collect())
    }

    pub async fn themes_for_entity(
        &self,
        run_id: Uuid,
        entity_id: &str,
    ) -> Result<Vec<EntityDailyTheme>> {
        let rows = sqlx::query_as::<_, (String, String, String, i64, String)>(
            "SELECT theme_id, label, keywords, volume, sentiment_mix FROM entity_daily_themes
             WHERE run_id = ?1 AND entity_id = ?2 ORDER BY volume DESC, theme_id",
        )
        .bind(run_id.to_string())
        .bind(entity_id)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter()
            .map(|(theme_id, label, keywords, volume, sentiment_mix)| {
                Ok(EntityDailyTheme {
                    run_id,
                    entity_id: entity_id.to_string(),
                    theme_id,
                    label,
                    keywords: serde_json::from_str(&keywords)
                        .map_err(|e| StoreError::corrupt("entity_daily_themes", e))?,
                    volume: volume as u64,
                    sentiment_mix: serde_json::from_str::<ThemeSentimentMix>(&sentiment_mix)
                        .map_err(|e| StoreError::corrupt("entity_daily_themes", e))?,
                })
            })
            .collect()
    }

    /// (Fame, Love) from prior SUCCESS runs for one entity, oldest first.
    pub async fn fame_love_history(
        &self,
        entity_id: &str,
        since: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<FameLovePoint>> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, f64, f64)>(
            r#"
            SELECT r.window_end, m.fame, m.love
            FROM entity_daily_metrics m
            JOIN runs r ON r.run_id = m.run_id
            WHERE m.entity_id = ?1 AND r.status = 'SUCCESS'
              AND r.window_end >= ?2 AND r.window_end < ?3
            ORDER BY r.window_end ASC
            "#,
        )
        .bind(entity_id)
        .bind(since)
        .bind(before)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(window_end, fame, love)| FameLovePoint {
                window_end,
                fame,
                love,
            })
            .collect())
    }

    // --- Weekly baseline ---

    pub async fn upsert_weekly_baseline(&self, b: &EntityWeeklyBaseline) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entity_weekly_baseline (entity_id, iso_week, signal, baseline_fame)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(entity_id, iso_week, signal) DO UPDATE SET
                baseline_fame = excluded.baseline_fame
            "#,
        )
        .bind(&b.entity_id)
        .bind(&b.iso_week)
        .bind(b.signal.as_str())
        .bind(b.baseline_fame)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Most recent combined baseline at or before the given ISO week.
    /// Missing rows fall back to the neutral midpoint at axis time.
    pub async fn latest_combined_baseline(
        &self,
        entity_id: &str,
        iso_week: &str,
    ) -> Result<Option<f64>> {
        let row: Option<(f64,)> = sqlx::query_as(
            r#"
            SELECT baseline_fame FROM entity_weekly_baseline
            WHERE entity_id = ?1 AND signal = ?2 AND iso_week <= ?3
            ORDER BY iso_week DESC LIMIT 1
            "#,
        )
        .bind(entity_id)
        .bind(BaselineSignal::Combined.as_str())
        .bind(iso_week)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|(v,)| v))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MetricsRow {
    run_id: String,
    entity_id: String,
    fame: f64,
    love: f64,
    attention: f64,
    baseline_fame: Option<f64>,
    momentum: f64,
    polarization: f64,
    confidence: f64,
    mentions_explicit: i64,
    mentions_implicit: i64,
    sources_distinct: i64,
    is_dormant: bool,
    dormancy_reason: Option<String>,
    metadata: String,
}

impl MetricsRow {
    fn into_metrics(self) -> Result<EntityDailyMetrics> {
        Ok(EntityDailyMetrics {
            run_id: Uuid::parse_str(&self.run_id)
                .map_err(|e| StoreError::corrupt("entity_daily_metrics", e))?,
            entity_id: self.entity_id,
            fame: self.fame,
            love: self.love,
            attention: self.attention,
            baseline_fame: self.baseline_fame,
            momentum: self.momentum,
            polarization: self.polarization,
            confidence: self.confidence,
            mentions_explicit: self.mentions_explicit as u64,
            mentions_implicit: self.mentions_implicit as u64,
            sources_distinct: self.sources_distinct as u64,
            is_dormant: self.is_dormant,
            dormancy_reason: self.dormancy_reason,
            metadata: serde_json::from_str(&self.metadata)
                .map_err(|e| StoreError::corrupt("entity_daily_metrics", e))?,
        })
    }
}
