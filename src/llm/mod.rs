//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Async is delegated to the underlying provider; the `complete` method is
//! `async fn` on the enum so callers need no trait-object machinery.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
    Dummy(providers::dummy::DummyProvider),
}

impl LlmProvider {
    /// Echo-only dummy backend.
    pub fn dummy() -> Self {
        LlmProvider::Dummy(providers::dummy::DummyProvider::new())
    }

    /// Dummy backend with scripted replies, matched in order against the
    /// combined system + user prompt.
    pub fn dummy_routed(rules: Vec<(String, providers::dummy::Reply)>) -> Self {
        LlmProvider::Dummy(providers::dummy::DummyProvider::routed(rules))
    }

    /// Completion calls made so far when backed by the dummy provider;
    /// zero for real backends.
    pub fn dummy_call_count(&self) -> usize {
        match self {
            LlmProvider::Dummy(p) => p.call_count(),
            _ => 0,
        }
    }

    /// One completion round trip: `content` as the user message, optional
    /// system prompt. Returns the trimmed reply text, which may be empty —
    /// callers decide what an empty completion means for them.
    pub async fn complete(
        &self,
        content: &str,
        system: Option<&str>,
    ) -> Result<String, ProviderError> {
        match self {
            LlmProvider::OpenAiCompatible(p) => p.complete(content, system).await,
            LlmProvider::Dummy(p) => p.complete(content, system).await,
        }
    }
}
