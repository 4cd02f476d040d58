//! Language-model seam. The engine never holds a session open: it asks
//! the provider for a capability per call and drops it as soon as the
//! prompt returns, so the host can pool, meter, or deny sessions as it
//! likes.

use anyhow::Result;
use async_trait::async_trait;

/// A live model session able to answer one prompt at a time.
#[async_trait]
pub trait PromptCapability: Send + Sync {
    async fn send_prompt(&self, prompt: &str) -> Result<String>;
}

/// Hands out short-lived [`PromptCapability`] sessions.
///
/// `acquire` failing means the model is unavailable right now; callers
/// decide whether that degrades (rerank falls back to lexical order) or
/// aborts (answer composition cannot proceed).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn PromptCapability>>;
}
