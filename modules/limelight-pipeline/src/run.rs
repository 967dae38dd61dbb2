//! The daily-run orchestrator. Stages execute sequentially; within a stage
//! work is parallel but bounded. A run ends SUCCESS, PARTIAL, or FAILED
//! and its snapshot rows are final; re-execution allocates a new run id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use limelight_catalog::AliasIndex;
use limelight_common::{
    DailyWindow, Mention, Run, RunMetricsRow, RunStatus, SourceItem, WeightsConfig,
};
use limelight_ingest::SourceAdapter;
use limelight_nlp::{SentimentScorer, ThemeBuilder};
use limelight_store::Store;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::run_log::{EventKind, RunLog};
use crate::stages;

pub struct PipelineDeps {
    pub store: Store,
    pub adapters: Vec<Box<dyn SourceAdapter>>,
    pub sentiment: Box<dyn SentimentScorer>,
    pub themes: ThemeBuilder,
    pub weights: WeightsConfig,
    pub config_fingerprint: String,
    pub workers: usize,
    pub data_dir: PathBuf,
    pub cancelled: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub entities: usize,
    pub notes: String,
}

pub struct DailyRun {
    deps: PipelineDeps,
}

impl DailyRun {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    /// Execute the pipeline for one window. Returns the terminal outcome;
    /// hard failures are recorded on the run row before surfacing.
    pub async fn execute(&self, window: DailyWindow) -> anyhow::Result<RunOutcome> {
        let store = &self.deps.store;
        let run_id = Uuid::new_v4();
        let run = Run {
            run_id,
            window_start: window.start,
            window_end: window.end,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Created,
            config_fingerprint: self.deps.config_fingerprint.clone(),
            notes: String::new(),
        };
        store.create_run(&run).await?;
        store
            .update_run_status(run_id, RunStatus::Running, None, "")
            .await?;
        info!(run_id = %run_id, window = %window, "Daily run starting");

        let mut log = RunLog::new(run_id);
        match self.execute_stages(run_id, &window, &mut log).await {
            Ok(outcome) => {
                store
                    .update_run_status(run_id, outcome.status, Some(Utc::now()), &outcome.notes)
                    .await?;
                if let Err(e) = log.save(&self.deps.data_dir, outcome.status) {
                    warn!(error = %e, "Run log write failed");
                }
                info!(run_id = %run_id, status = outcome.status.as_str(), "Daily run finished");
                Ok(outcome)
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Daily run failed");
                store
                    .update_run_status(run_id, RunStatus::Failed, Some(Utc::now()), &e.to_string())
                    .await?;
                let _ = log.save(&self.deps.data_dir, RunStatus::Failed);
                Ok(RunOutcome {
                    run_id,
                    status: RunStatus::Failed,
                    entities: 0,
                    notes: e.to_string(),
                })
            }
        }
    }

    async fn execute_stages(
        &self,
        run_id: Uuid,
        window: &DailyWindow,
        log: &mut RunLog,
    ) -> anyhow::Result<RunOutcome> {
        let store = &self.deps.store;
        let weights = &self.deps.weights;
        let mut metrics = RunMetricsRow::default();
        let mut notes: Vec<String> = Vec::new();

        let catalog = limelight_catalog::load_catalog(store).await?;
        let alias_index = AliasIndex::build(&catalog.entries);
        info!(
            entities = catalog.len(),
            aliases = alias_index.alias_count(),
            "Catalog loaded"
        );

        // --- Stage 1: ingest ---
        let stage_start = Instant::now();
        let ingest = stages::ingest::run(&self.deps.adapters, window, self.deps.workers).await;
        for (source, count) in &ingest.source_counts {
            match ingest.source_errors.get(source) {
                Some(err) => log.log(EventKind::SourceFailed {
                    source: source.clone(),
                    error: err.clone(),
                }),
                None => log.log(EventKind::SourceFetched {
                    source: source.clone(),
                    items: *count as usize,
                }),
            }
        }
        metrics.source_counts = ingest.source_counts.clone();
        metrics.source_errors = ingest.source_errors.clone();
        for item in &ingest.items {
            store.insert_source_item(item).await?;
        }
        self.finish_stage(log, &mut metrics, "ingest", ingest.items.len(), stage_start);

        if self.bail(log, "ingest") {
            return self.finalize_cancelled(run_id, metrics, notes).await;
        }

        // --- Stage 2: normalize + dedupe ---
        let stage_start = Instant::now();
        let documents = stages::normalize::run(&ingest.items);
        self.finish_stage(log, &mut metrics, "normalize", documents.len(), stage_start);

        let stage_start = Instant::now();
        let deduped = stages::dedupe::run(documents);
        metrics.mention_counts.docs_dropped_dedupe = deduped.dropped.len() as u64;
        if !deduped.dropped.is_empty() {
            log.log(EventKind::DocumentsDeduped {
                dropped: deduped.dropped.clone(),
            });
        }
        let documents = deduped.documents;
        for doc in &documents {
            store.insert_document(doc).await?;
        }
        self.finish_stage(log, &mut metrics, "dedupe", documents.len(), stage_start);

        let items_by_id: HashMap<String, SourceItem> = ingest
            .items
            .iter()
            .map(|i| (i.item_id.clone(), i.clone()))
            .collect();

        if self.bail(log, "normalize") {
            return self.finalize_cancelled(run_id, metrics, notes).await;
        }

        // --- Stage 3: extract ---
        let stage_start = Instant::now();
        let candidates = stages::extract::run(&documents, &alias_index);
        let candidate_count: usize = candidates.iter().map(|c| c.matches.len()).sum();
        self.finish_stage(log, &mut metrics, "extract", candidate_count, stage_start);

        // --- Stage 4: resolve ---
        let stage_start = Instant::now();
        let resolved = stages::resolve::run(
            &documents,
            &candidates,
            &catalog,
            &items_by_id,
            &weights.resolver,
            weights.implicit_weight,
            Utc::now(),
        );
        metrics.mention_counts.total =
            (resolved.mentions.len() + resolved.unresolved.len()) as u64;
        metrics.mention_counts.resolved = resolved.mentions.len() as u64;
        metrics.mention_counts.unresolved = resolved.unresolved.len() as u64;
        metrics.mention_counts.implicit =
            resolved.mentions.iter().filter(|m| m.is_implicit).count() as u64;

        // Strict rule: a resolved mention must reference a known, active
        // catalog entity. Anything else is a broken invariant.
        for mention in &resolved.mentions {
            if catalog.get(&mention.entity_id).is_none() {
                return Err(limelight_common::PipelineError::FatalInternal(format!(
                    "resolved mention {} references unknown entity {}",
                    mention.mention_id, mention.entity_id
                ))
                .into());
            }
        }
        for u in &resolved.unresolved {
            store.insert_unresolved(u).await?;
        }
        self.finish_stage(log, &mut metrics, "resolve", resolved.mentions.len(), stage_start);

        if self.bail(log, "resolve") {
            return self.finalize_cancelled(run_id, metrics, notes).await;
        }

        // --- Stage 5: sentiment ---
        let stage_start = Instant::now();
        let mentions: Vec<Mention> = stages::score::run(
            resolved.mentions,
            &documents,
            &items_by_id,
            self.deps.sentiment.as_ref(),
            self.deps.workers,
        )
        .await;
        for mention in &mentions {
            store.insert_mention(mention).await?;
        }
        self.finish_stage(log, &mut metrics, "score", mentions.len(), stage_start);

        if self.bail(log, "score") {
            return self.finalize_cancelled(run_id, metrics, notes).await;
        }

        // --- Stage 6: aggregate ---
        let stage_start = Instant::now();
        let aggregates = stages::aggregate::run(&mentions, &documents, &items_by_id, weights);
        self.finish_stage(log, &mut metrics, "aggregate", aggregates.len(), stage_start);

        // --- Stage 7: axes ---
        let stage_start = Instant::now();
        let rows =
            stages::axes::run(run_id, &aggregates, &catalog, window, weights, store).await?;
        self.finish_stage(log, &mut metrics, "axes", rows.len(), stage_start);

        // --- Stages 8 + 9: drivers and themes (independent of each other) ---
        let stage_start = Instant::now();
        let (drivers, themes) = tokio::join!(
            async {
                stages::drivers::run(
                    run_id,
                    &mentions,
                    &documents,
                    &items_by_id,
                    &catalog,
                    weights.driver_count,
                )
            },
            stages::themes::run(
                run_id,
                &mentions,
                &documents,
                &self.deps.themes,
                weights.theme_min_mentions,
            )
        );
        let driver_count: usize = drivers.values().map(Vec::len).sum();
        self.finish_stage(log, &mut metrics, "drivers_themes", driver_count, stage_start);

        // --- Stage 10: persist snapshot ---
        let stage_start = Instant::now();
        let mut persisted = 0usize;
        let mut persist_failures = 0usize;
        for row in &rows {
            let entity_drivers = drivers.get(&row.entity_id).cloned().unwrap_or_default();
            let entity_themes = themes.get(&row.entity_id).cloned().unwrap_or_default();
            match store
                .write_entity_snapshot(row, &entity_drivers, &entity_themes)
                .await
            {
                Ok(()) => {
                    persisted += 1;
                    log.log(EventKind::EntitySnapshot {
                        entity_id: row.entity_id.clone(),
                        fame: row.fame,
                        love: row.love,
                        dormant: row.is_dormant,
                    });
                }
                Err(e) => {
                    persist_failures += 1;
                    error!(entity_id = row.entity_id.as_str(), error = %e, "Snapshot write failed");
                    log.log(EventKind::PersistFailure {
                        entity_id: row.entity_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        self.finish_stage(log, &mut metrics, "snapshot", persisted, stage_start);

        // --- Run metrics ---
        metrics.unresolved_top =
            stages::queue::unresolved_top(&resolved.unresolved, &documents, &items_by_id);
        store.write_run_metrics(run_id, &metrics).await?;

        // Terminal status per the snapshot contract: documents ingested and
        // every write clean is SUCCESS; an empty window still succeeds when
        // the pinned catalog got its dormant rows.
        let dormant_rows = rows.iter().filter(|r| r.is_dormant).count();
        let status = if persist_failures > 0 {
            notes.push(format!("{persist_failures} entity snapshots failed to persist"));
            RunStatus::Partial
        } else if persisted == 0 {
            notes.push("no entity rows produced".to_string());
            RunStatus::Partial
        } else if documents.is_empty() && dormant_rows == 0 {
            notes.push("no documents and no pinned entities".to_string());
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        if !metrics.source_errors.is_empty() {
            let mut failed: Vec<&str> =
                metrics.source_errors.keys().map(String::as_str).collect();
            failed.sort();
            notes.push(format!("source failures: {}", failed.join(", ")));
        }

        Ok(RunOutcome {
            run_id,
            status,
            entities: persisted,
            notes: notes.join("; "),
        })
    }

    fn finish_stage(
        &self,
        log: &mut RunLog,
        metrics: &mut RunMetricsRow,
        stage: &str,
        output_count: usize,
        started: Instant,
    ) {
        let duration_ms = started.elapsed().as_millis() as u64;
        metrics.timings_ms.insert(stage.to_string(), duration_ms);
        log.log(EventKind::StageComplete {
            stage: stage.to_string(),
            output_count,
            duration_ms,
        });
    }

    /// True when a cancellation signal arrived; the current stage has
    /// already finished its started units.
    fn bail(&self, log: &mut RunLog, stage: &str) -> bool {
        if self.deps.cancelled.load(Ordering::Relaxed) {
            warn!(stage, "Cancellation requested, halting after current stage");
            log.log(EventKind::Cancelled {
                stage: stage.to_string(),
            });
            return true;
        }
        false
    }

    async fn finalize_cancelled(
        &self,
        run_id: Uuid,
        metrics: RunMetricsRow,
        mut notes: Vec<String>,
    ) -> anyhow::Result<RunOutcome> {
        notes.push("cancelled by operator".to_string());
        self.deps.store.write_run_metrics(run_id, &metrics).await?;
        Ok(RunOutcome {
            run_id,
            status: RunStatus::Partial,
            entities: 0,
            notes: notes.join("; "),
        })
    }
}
