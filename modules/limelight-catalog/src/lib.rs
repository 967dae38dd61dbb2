//! The entity catalog: pinned-file loading, store sync, and the alias
//! index the extractor matches against. The catalog is an immutable input
//! for the duration of a run; edits take effect from the next run.

pub mod index;
pub mod loader;

pub use index::{AliasIndex, AliasMatch};
pub use loader::{load_catalog, sync_pinned_entities, Catalog, PinnedEntity};
