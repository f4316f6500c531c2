//! Generative-completion backends.
//!
//! - [`base_llm`] - The [`CompletionBackend`] trait and its typed error
//! - [`providers`] - Concrete backends (OpenAI Chat Completions)

pub mod base_llm;
pub mod providers;

pub use base_llm::{ApiErrorBody, CompletionBackend, CompletionError};
pub use providers::openai::OpenAICompletion;
