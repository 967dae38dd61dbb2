//! Per-run JSON timeline written under the data dir. One file per run:
//! `{data_dir}/runs/{run_id}.json`, an ordered list of stage events.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use limelight_common::RunStatus;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

pub struct RunLog {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Serialize)]
struct RunEvent {
    seq: u32,
    ts: DateTime<Utc>,
    #[serde(flatten)]
    kind: EventKind,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SourceFetched {
        source: String,
        items: usize,
    },
    SourceFailed {
        source: String,
        error: String,
    },
    StageComplete {
        stage: String,
        output_count: usize,
        duration_ms: u64,
    },
    DocumentsDeduped {
        dropped: Vec<String>,
    },
    EntitySnapshot {
        entity_id: String,
        fame: f64,
        love: f64,
        dormant: bool,
    },
    PersistFailure {
        entity_id: String,
        error: String,
    },
    Cancelled {
        stage: String,
    },
}

#[derive(Serialize)]
struct SerializedRunLog<'a> {
    run_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    status: &'a str,
    events: &'a [RunEvent],
}

impl RunLog {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    /// Write the timeline to disk; returns the file path.
    pub fn save(&self, data_dir: &Path, status: RunStatus) -> std::io::Result<PathBuf> {
        let dir = data_dir.join("runs");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", self.run_id));

        let output = SerializedRunLog {
            run_id: self.run_id.to_string(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            status: status.as_str(),
            events: &self.events,
        };
        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), events = self.events.len(), "Run log saved");
        Ok(path)
    }
}
