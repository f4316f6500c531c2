//! Completion provider implementations.
//!
//! Each provider implements [`CompletionBackend`](crate::llms::base_llm::CompletionBackend)
//! and maps its transport's failures onto
//! [`CompletionError`](crate::llms::base_llm::CompletionError).

pub mod openai;
