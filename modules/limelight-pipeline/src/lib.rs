//! The daily pipeline: ingest → normalize → dedupe → extract → resolve →
//! score → aggregate → axes → drivers/themes → snapshot, plus the weekly
//! baseline job.

pub mod baseline;
pub mod run;
pub mod run_log;
pub mod stages;

pub use run::{DailyRun, PipelineDeps, RunOutcome};
