//! Dummy LLM provider — echoes input back prefixed with `[echo]`.
//!
//! Used for exercising the full orchestration path without a real API key.
//! Tests can attach routing rules: the first rule whose pattern occurs in the
//! prompt decides the reply (fixed text, a transport error, or a panic to
//! simulate a crashed source task). Prompts matching no rule are echoed.
//! Every call is counted so tests can assert the model was never invoked.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::llm::ProviderError;

/// What a routing rule replies with when its pattern matches.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    /// Panics inside the provider call. The orchestrator's join barrier must
    /// convert this into a per-source failure string.
    Panic,
}

#[derive(Debug)]
struct Inner {
    rules: Vec<(String, Reply)>,
    calls: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct DummyProvider {
    inner: Arc<Inner>,
}

impl DummyProvider {
    /// Pure echo provider — the default `"dummy"` backend.
    pub fn new() -> Self {
        Self::routed(Vec::new())
    }

    /// Provider with routing rules, matched in order against the combined
    /// system + user prompt.
    pub fn routed(rules: Vec<(String, Reply)>) -> Self {
        Self {
            inner: Arc::new(Inner {
                rules,
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of `complete` calls made so far (across all clones).
    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub async fn complete(
        &self,
        content: &str,
        system: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);

        let haystack = match system {
            Some(sys) => format!("{sys}\n{content}"),
            None => content.to_string(),
        };

        for (pattern, reply) in &self.inner.rules {
            if haystack.contains(pattern) {
                return match reply {
                    Reply::Text(text) => Ok(text.clone()),
                    Reply::Fail(msg) => Err(ProviderError::Request(msg.clone())),
                    Reply::Panic => panic!("dummy provider: scripted panic"),
                };
            }
        }

        Ok(format!("[echo] {content}"))
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_prefixes_echo() {
        let p = DummyProvider::new();
        assert_eq!(p.complete("hello", None).await.unwrap(), "[echo] hello");
        assert_eq!(p.call_count(), 1);
    }

    #[tokio::test]
    async fn rules_match_in_order() {
        let p = DummyProvider::routed(vec![
            ("alpha".into(), Reply::Text("first".into())),
            ("beta".into(), Reply::Text("second".into())),
        ]);
        assert_eq!(p.complete("alpha beta", None).await.unwrap(), "first");
        assert_eq!(p.complete("beta", None).await.unwrap(), "second");
        assert_eq!(p.complete("gamma", None).await.unwrap(), "[echo] gamma");
    }

    #[tokio::test]
    async fn rule_matches_system_prompt() {
        let p = DummyProvider::routed(vec![("tutor".into(), Reply::Text("routed".into()))]);
        let reply = p.complete("question", Some("You are a tutor.")).await.unwrap();
        assert_eq!(reply, "routed");
    }

    #[tokio::test]
    async fn fail_rule_returns_error() {
        let p = DummyProvider::routed(vec![("boom".into(), Reply::Fail("down".into()))]);
        let err = p.complete("boom", None).await.unwrap_err();
        assert!(err.to_string().contains("down"));
    }

    #[tokio::test]
    async fn call_count_shared_across_clones() {
        let p = DummyProvider::new();
        let clone = p.clone();
        let _ = clone.complete("x", None).await;
        let _ = p.complete("y", None).await;
        assert_eq!(p.call_count(), 2);
    }
}
