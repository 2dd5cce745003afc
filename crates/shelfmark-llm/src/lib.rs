//! # Shelfmark LLM
//!
//! Concrete vendors behind the capability traits defined in `shelfmark-core`.
//!
//! ## Features
//!
//! - **Completion**: Anthropic Messages and OpenAI Chat Completions
//! - **Embeddings**: OpenAI-compatible `/embeddings`
//! - **Batch**: Anthropic Message Batches and OpenAI Batch API
//! - **Classified errors**: every failure maps onto `LlmError`
//!   (rate-limited, transport, malformed response, API status)
//!
//! Providers are selected once from configuration by the factory functions
//! in each module; callers only ever hold trait objects.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shelfmark_config::ShelfmarkConfig;
//! use shelfmark_core::CompletionRequest;
//! use shelfmark_llm::completion::create_completion_provider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ShelfmarkConfig::default();
//!     let provider = create_completion_provider(&config.provider, config.provider_api_key()?)?;
//!     let completion = provider.complete(CompletionRequest::new("Say hi", 64)).await?;
//!     println!("{}", completion.text);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod completion;
pub mod embeddings;
mod http;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use batch::{create_batch_backend, AnthropicBatchBackend, OpenAIBatchBackend};
pub use completion::{create_completion_provider, AnthropicProvider, OpenAIChatProvider};
pub use embeddings::{create_embedding_provider, OpenAIEmbeddingProvider};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockBatchBackend, MockCompletionProvider, MockEmbeddingProvider};
