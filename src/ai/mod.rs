//! AI completion providers and the local/cloud failover adapter.
//!
//! # Providers
//!
//! - [`OpenAiCompatibleProvider`]: any OpenAI-compatible chat completion
//!   endpoint. The local variant targets LM Studio / Ollama style servers,
//!   the cloud variant targets OpenAI.
//!
//! # Failover
//!
//! [`AiAdapter`] probes the primary provider once per session, falls over
//! to the secondary one when the primary is unreachable or times out, and
//! degrades to the unprocessed input when neither answers. AI enrichment
//! is optional: callers always have a non-AI answer to fall back on.
//!
//! # Example
//!
//! ```rust,ignore
//! use concierge::ai::AiAdapter;
//! use concierge::config::Config;
//! use std::time::Duration;
//!
//! let adapter = AiAdapter::from_config(&Config::default());
//! let response = adapter
//!     .complete("Summarize: ...", 250, 0.3, Duration::from_secs(30))
//!     .await;
//! if response.degraded {
//!     println!("(AI unavailable)");
//! }
//! ```

mod adapter;
mod openai;
mod prompts;
mod traits;

pub use adapter::{AiAdapter, ProviderState, ProviderStatus};
pub use openai::{clean_response, OpenAiCompatibleProvider, AUTO_MODEL};
pub use prompts::*;
pub use traits::{AiRequest, AiResponse, CompletionProvider};

use crate::config::{AiProviderConfig, AiProviderKind};
use crate::error::Result;

/// Create a completion provider from configuration.
pub fn create_provider(
    kind: AiProviderKind,
    config: &AiProviderConfig,
) -> Result<Box<dyn CompletionProvider>> {
    let provider = OpenAiCompatibleProvider::from_config(kind, config)?;
    Ok(Box::new(provider))
}
