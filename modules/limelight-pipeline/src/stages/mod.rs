pub mod aggregate;
pub mod axes;
pub mod dedupe;
pub mod drivers;
pub mod engagement;
pub mod extract;
pub mod ingest;
pub mod normalize;
pub mod queue;
pub mod resolve;
pub mod score;
pub mod themes;
