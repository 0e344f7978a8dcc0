//! Embedding provider implementations.

pub mod ollama;
pub mod timeout;
pub mod trigram;

pub use ollama::OllamaProvider;
pub use timeout::TimeoutProvider;
pub use trigram::TrigramProvider;
