//! Embedding providers for knowledge bases.
//!
//! Turns question text into fixed-length vectors. The provider is built once
//! from configuration and handed to the registry and stores explicitly.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingIdentity, EmbeddingProvider};
