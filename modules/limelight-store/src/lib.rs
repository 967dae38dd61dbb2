//! SQLite persistence for the daily pipeline.
//!
//! One `Store` over a `sqlx` pool; impl blocks are split per table family.
//! JSON-valued columns are serialized strings so the logical schema ports
//! unchanged to server-class stores with native JSON columns.

pub mod catalog;
pub mod content;
pub mod error;
pub mod mentions;
pub mod runs;
pub mod snapshots;
mod store;

pub use error::{Result, StoreError};
pub use snapshots::FameLovePoint;
pub use store::Store;
