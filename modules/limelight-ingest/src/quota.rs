//! On-disk quota ledger for unit-metered APIs.
//!
//! The YouTube Data API allows 10,000 units/day by default; search costs
//! 100 units, most list calls cost 1. The ledger persists cumulative spend
//! per UTC day so a second invocation the same day respects the budget.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{IngestError, Result};

pub const WARNING_THRESHOLD: f64 = 0.8;

fn unit_cost(operation: &str) -> u64 {
    match operation {
        "search" => 100,
        // videos.list, channels.list, playlistItems.list, commentThreads.list
        _ => 1,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    date: NaiveDate,
    usage: u64,
    daily_limit: u64,
    operations: HashMap<String, u64>,
}

pub struct QuotaLedger {
    path: PathBuf,
    daily_limit: u64,
    state: Mutex<LedgerFile>,
}

impl QuotaLedger {
    /// Open the ledger, rolling over to a fresh day when the stored date
    /// is stale.
    pub fn open(path: &Path, daily_limit: u64) -> Result<Self> {
        let today = Utc::now().date_naive();
        let state = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<LedgerFile>(&content) {
                Ok(file) if file.date == today => file,
                Ok(_) | Err(_) => fresh(today, daily_limit),
            },
            Err(_) => fresh(today, daily_limit),
        };
        Ok(Self {
            path: path.to_path_buf(),
            daily_limit,
            state: Mutex::new(state),
        })
    }

    /// Charge `count` operations of the given kind. Fails with
    /// `QuotaExhausted` before the call is made when the budget would be
    /// exceeded; the caller defers the work to the next day.
    pub fn charge(&self, operation: &str, count: u64) -> Result<u64> {
        let cost = unit_cost(operation) * count;
        let mut state = self.state.lock().expect("quota ledger lock poisoned");

        let today = Utc::now().date_naive();
        if state.date != today {
            *state = fresh(today, self.daily_limit);
        }

        if state.usage + cost > self.daily_limit {
            return Err(IngestError::QuotaExhausted(format!(
                "{} units used of {}, refusing {} more",
                state.usage, self.daily_limit, cost
            )));
        }

        state.usage += cost;
        *state.operations.entry(operation.to_string()).or_default() += count;

        if state.usage as f64 >= self.daily_limit as f64 * WARNING_THRESHOLD {
            warn!(
                usage = state.usage,
                limit = self.daily_limit,
                "Quota usage past warning threshold"
            );
        }

        self.persist(&state);
        Ok(state.usage)
    }

    pub fn usage(&self) -> u64 {
        self.state.lock().expect("quota ledger lock poisoned").usage
    }

    fn persist(&self, state: &LedgerFile) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(state) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!(path = %self.path.display(), error = %e, "Failed to persist quota ledger");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize quota ledger"),
        }
    }
}

fn fresh(date: NaiveDate, daily_limit: u64) -> LedgerFile {
    LedgerFile {
        date,
        usage: 0,
        daily_limit,
        operations: HashMap::new(),
    }
}
