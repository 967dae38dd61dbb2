//! Run rows and per-run instrumentation.

use chrono::{DateTime, Utc};
use limelight_common::{Run, RunMetricsRow, RunStatus};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::Store;

#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    run_id: String,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: String,
    config_fingerprint: String,
    notes: String,
}

impl RunRow {
    fn into_run(self) -> Result<Run> {
        Ok(Run {
            run_id: Uuid::parse_str(&self.run_id).map_err(|e| StoreError::corrupt("runs", e))?,
            window_start: self.window_start,
            window_end: self.window_end,
            started_at: self.started_at,
            finished_at: self.finished_at,
            status: self
                .status
                .parse::<RunStatus>()
                .map_err(|e| StoreError::corrupt("runs", e))?,
            config_fingerprint: self.config_fingerprint,
            notes: self.notes,
        })
    }
}

impl Store {
    /// Create a run for a window. Refused when the window already has a
    /// SUCCESS run: snapshots are write-once and reruns get new run ids
    /// only while the prior attempt is non-terminal or failed.
    pub async fn create_run(&self, run: &Run) -> Result<()> {
        if let Some(existing) = self
            .runs_for_window(run.window_start, run.window_end)
            .await?
            .into_iter()
            .find(|r| r.status == RunStatus::Success)
        {
            return Err(StoreError::RunConflict(format!(
                "window {} .. {} already has SUCCESS run {}",
                run.window_start, run.window_end, existing.run_id
            )));
        }
        sqlx::query(
            r#"
            INSERT INTO runs
                (run_id, window_start, window_end, started_at, finished_at,
                 status, config_fingerprint, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(run.window_start)
        .bind(run.window_end)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.status.as_str())
        .bind(&run.config_fingerprint)
        .bind(&run.notes)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        finished_at: Option<DateTime<Utc>>,
        notes: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE runs SET status = ?2, finished_at = ?3, notes = ?4 WHERE run_id = ?1",
        )
        .bind(run_id.to_string())
        .bind(status.as_str())
        .bind(finished_at)
        .bind(notes)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>> {
        let row = sqlx::query_as::<_, RunRow>("SELECT * FROM runs WHERE run_id = ?1")
            .bind(run_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(RunRow::into_run).transpose()
    }

    pub async fn runs_for_window(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(
            "SELECT * FROM runs WHERE window_start = ?1 AND window_end = ?2 ORDER BY started_at",
        )
        .bind(window_start)
        .bind(window_end)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(RunRow::into_run).collect()
    }

    /// SUCCESS runs whose window ended within the lookback horizon,
    /// oldest first; feeds the momentum EWMA.
    pub async fn recent_success_runs(&self, since: DateTime<Utc>) -> Result<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(
            "SELECT * FROM runs WHERE status = 'SUCCESS' AND window_end >= ?1
             ORDER BY window_end ASC",
        )
        .bind(since)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(RunRow::into_run).collect()
    }

    pub async fn write_run_metrics(&self, run_id: Uuid, metrics: &RunMetricsRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO run_metrics
                (run_id, source_counts, source_errors, mention_counts,
                 unresolved_top, timings_ms, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(run_id) DO UPDATE SET
                source_counts = excluded.source_counts,
                source_errors = excluded.source_errors,
                mention_counts = excluded.mention_counts,
                unresolved_top = excluded.unresolved_top,
                timings_ms = excluded.timings_ms
            "#,
        )
        .bind(run_id.to_string())
        .bind(serde_json::to_string(&metrics.source_counts).unwrap_or_else(|_| "{}".into()))
        .bind(serde_json::to_string(&metrics.source_errors).unwrap_or_else(|_| "{}".into()))
        .bind(serde_json::to_string(&metrics.mention_counts).unwrap_or_else(|_| "{}".into()))
        .bind(serde_json::to_string(&metrics.unresolved_top).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&metrics.timings_ms).unwrap_or_else(|_| "{}".into()))
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_run_metrics(&self, run_id: Uuid) -> Result<Option<RunMetricsRow>> {
        let row = sqlx::query_as::<_, (String, String, String, String, String)>(
            "SELECT source_counts, source_errors, mention_counts, unresolved_top, timings_ms
             FROM run_metrics WHERE run_id = ?1",
        )
        .bind(run_id.to_string())
        .fetch_optional(self.pool())
        .await?;
        let Some((source_counts, source_errors, mention_counts, unresolved_top, timings_ms)) = row
        else {
            return Ok(None);
        };
        Ok(Some(RunMetricsRow {
            source_counts: serde_json::from_str(&source_counts)
                .map_err(|e| StoreError::corrupt("run_metrics", e))?,
            source_errors: serde_json::from_str(&source_errors)
                .map_err(|e| StoreError::corrupt("run_metrics", e))?,
            mention_counts: serde_json::from_str(&mention_counts)
                .map_err(|e| StoreError::corrupt("run_metrics", e))?,
            unresolved_top: serde_json::from_str(&unresolved_top)
                .map_err(|e| StoreError::corrupt("run_metrics", e))?,
            timings_ms: serde_json::from_str(&timings_ms)
                .map_err(|e| StoreError::corrupt("run_metrics", e))?,
        }))
    }
}
