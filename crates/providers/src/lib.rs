//! HTTP clients implementing the collaborator traits from
//! `litessay_core::collaborators`.
//!
//! - [`OpenAiClient`] implements `LanguageModel` and `EmbeddingModel`.
//! - [`PineconeClient`] implements `VectorIndex`.
//! - [`GutenbergSource`] implements `TextSource`.

mod http;

pub mod gutenberg;
pub mod openai;
pub mod pinecone;

pub use gutenberg::{GutenbergConfig, GutenbergSource};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use pinecone::{PineconeClient, PineconeConfig};
