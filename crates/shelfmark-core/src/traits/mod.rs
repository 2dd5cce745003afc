//! Capability traits implemented outside core
//!
//! The engine depends only on these seams; concrete vendors live in
//! `shelfmark-llm` and tests substitute in-memory fakes.

pub mod batch;
pub mod clock;
pub mod llm;

pub use batch::{BackendStatus, BatchBackend, BatchResultItem, BatchSnapshot, RequestCounts};
pub use clock::{Sleeper, TokioSleeper};
pub use llm::{
    Completion, CompletionProvider, CompletionRequest, EmbeddingProvider, LlmError, LlmResult,
    TokenUsage,
};
