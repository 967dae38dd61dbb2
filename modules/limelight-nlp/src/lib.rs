//! Optional-ML components behind stable contracts. The transformer
//! sentiment endpoint and the embedding service are both optional; the
//! lexical fallbacks are the default paths, not exceptional ones.

pub mod capabilities;
pub mod sentiment;
pub mod themes;

pub use capabilities::Capabilities;
pub use sentiment::{LexiconSentiment, RemoteSentiment, SentimentScorer};
pub use themes::{RemoteEmbedder, TextEmbedder, ThemeBuilder, ThemeInput, ThemeOutput};
