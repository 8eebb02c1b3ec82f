//! Per-source answer fetchers.
//!
//! Each fetcher produces a `String` — either a real answer or one of a fixed
//! set of failure messages the aggregator recognizes. Fetchers never return
//! `Err`: every internal failure is absorbed into its message so one bad
//! source cannot take down the batch.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::SubjectProfile;
use crate::docstore::{Retriever, SubjectStore};
use crate::llm::LlmProvider;
use crate::web::PageFetcher;

use super::rules::{self, AnswerQuality};

/// Combined web page text is capped at this many characters before synthesis.
const WEB_CONTENT_BUDGET: usize = 15_000;

// ── Documents ─────────────────────────────────────────────────────────────────

/// Answer from the subject's document index, if one exists and contains
/// relevant material.
pub async fn fetch_document_answer(
    docstore_root: &Path,
    profile: &SubjectProfile,
    llm: &LlmProvider,
    top_k: usize,
    question: &str,
) -> String {
    let Some(store) = SubjectStore::open_existing(docstore_root, &profile.slug) else {
        warn!(subject = %profile.name, "no document index found");
        return format!(
            "Error initializing retrieval for {}. The document index might be \
             missing or corrupt. Please create or update it first.",
            profile.name
        );
    };

    let retriever = Retriever::new(store, profile.rag_prompt.clone(), llm.clone(), top_k);
    match retriever.answer(question).await {
        Ok(answer) => match rules::DOCUMENT_RULES.classify(&answer) {
            AnswerQuality::Ok => answer,
            quality => {
                debug!(subject = %profile.name, ?quality, "document answer downgraded");
                format!(
                    "The documents for {} do not seem to contain an answer to this question.",
                    profile.name
                )
            }
        },
        Err(e) => {
            warn!(subject = %profile.name, error = %e, "document retrieval failed");
            "An error occurred while retrieving the document-based answer.".to_string()
        }
    }
}

// ── Baseline model ────────────────────────────────────────────────────────────

/// Answer straight from the model's own knowledge, with no grounding.
pub async fn fetch_baseline_answer(
    profile: &SubjectProfile,
    llm: &LlmProvider,
    question: &str,
) -> String {
    let prompt = format!(
        "You are an AI expert in {}. Answer the following question accurately \
         and concisely.\n\nQuestion: {}\n\nAnswer:",
        profile.name, question
    );
    match llm.complete(&prompt, None).await {
        Ok(answer) if answer.is_empty() => "LLM returned an empty response.".to_string(),
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %e, "baseline completion failed");
            "An error occurred while contacting the language model.".to_string()
        }
    }
}

// ── Web synthesis ─────────────────────────────────────────────────────────────

/// Scrape the given URLs concurrently and synthesize an answer from whatever
/// text came back. URLs that yield nothing (or whose scrape task panics)
/// are simply skipped.
pub async fn fetch_web_answer(
    pages: &PageFetcher,
    profile: &SubjectProfile,
    llm: &LlmProvider,
    question: &str,
    urls: &[String],
) -> String {
    if urls.is_empty() {
        return "No websites provided for scraping.".to_string();
    }

    let handles: Vec<_> = urls
        .iter()
        .map(|url| {
            let pages = pages.clone();
            let url = url.clone();
            tokio::spawn(async move { pages.scrape(&url).await })
        })
        .collect();

    let mut texts = Vec::new();
    for (handle, url) in handles.into_iter().zip(urls) {
        match handle.await {
            Ok(text) if !text.is_empty() => texts.push(text),
            Ok(_) => debug!(%url, "page yielded no usable text"),
            Err(e) => warn!(%url, error = %e, "scrape task failed"),
        }
    }

    if texts.is_empty() {
        return "Found websites, but failed to scrape content from any of them.".to_string();
    }
    info!(pages = texts.len(), of = urls.len(), "scraped web content");

    let joined = texts.join("\n\n");
    let combined = truncate_chars(&joined, WEB_CONTENT_BUDGET);
    let prompt = format!(
        "You are an educational assistant specialized in {subject}.\n\
         Based *only* on the following web content, answer the question concisely and \
         clearly.\n\
         If the answer is not found in the content, state that clearly and do not invent \
         information.\n\n\
         Web Content:\n{combined}\n\nQuestion: {question}\n\nAnswer:",
        subject = profile.name
    );

    match llm.complete(&prompt, None).await {
        Ok(answer) => {
            if rules::looks_like_llm_error(&answer) {
                warn!("web synthesis returned an upstream error message");
                return "Error synthesizing answer from web content.".to_string();
            }
            match rules::WEB_RULES.classify(&answer) {
                AnswerQuality::Ok => answer,
                quality => {
                    debug!(?quality, "web answer downgraded");
                    "Could not find a specific answer from the scraped web content.".to_string()
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "web synthesis failed");
            "Error synthesizing answer from web content.".to_string()
        }
    }
}

/// Truncate to at most `max` characters without splitting a char.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::config::SubjectRegistry;
    use crate::llm::providers::dummy::Reply;

    use super::*;

    fn profile() -> SubjectProfile {
        SubjectRegistry::default().resolve("Computer Science")
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        let long = "x".repeat(20_000);
        assert_eq!(truncate_chars(&long, WEB_CONTENT_BUDGET).len(), WEB_CONTENT_BUDGET);
    }

    #[tokio::test]
    async fn missing_index_reports_initialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let llm = LlmProvider::dummy();
        let answer = fetch_document_answer(dir.path(), &profile(), &llm, 4, "what is a stack?").await;
        assert!(answer.contains("Error initializing retrieval for Computer Science"));
    }

    #[tokio::test]
    async fn baseline_empty_completion_is_reported() {
        let llm = LlmProvider::dummy_routed(vec![(
            "You are an AI expert in".to_string(),
            Reply::Text(String::new()),
        )]);
        let answer = fetch_baseline_answer(&profile(), &llm, "what is a stack?").await;
        assert_eq!(answer, "LLM returned an empty response.");
    }

    #[tokio::test]
    async fn baseline_failure_is_reported() {
        let llm = LlmProvider::dummy_routed(vec![(
            "You are an AI expert in".to_string(),
            Reply::Fail("boom".to_string()),
        )]);
        let answer = fetch_baseline_answer(&profile(), &llm, "what is a stack?").await;
        assert_eq!(answer, "An error occurred while contacting the language model.");
    }

    #[tokio::test]
    async fn web_with_no_urls_short_circuits() {
        let pages = PageFetcher::fixed(HashMap::new());
        let llm = LlmProvider::dummy();
        let answer = fetch_web_answer(&pages, &profile(), &llm, "q", &[]).await;
        assert_eq!(answer, "No websites provided for scraping.");
        assert_eq!(llm.dummy_call_count(), 0);
    }

    #[tokio::test]
    async fn web_with_only_empty_pages_reports_scrape_failure() {
        let pages = PageFetcher::fixed(HashMap::from([(
            "https://a.example".to_string(),
            String::new(),
        )]));
        let llm = LlmProvider::dummy();
        let urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];
        let answer = fetch_web_answer(&pages, &profile(), &llm, "q", &urls).await;
        assert_eq!(answer, "Found websites, but failed to scrape content from any of them.");
        assert_eq!(llm.dummy_call_count(), 0);
    }

    #[tokio::test]
    async fn web_synthesis_uses_scraped_text() {
        let pages = PageFetcher::fixed(HashMap::from([(
            "https://a.example".to_string(),
            "A stack is a last-in first-out data structure.".to_string(),
        )]));
        let llm = LlmProvider::dummy_routed(vec![(
            "Web Content:".to_string(),
            Reply::Text(
                "A stack is a LIFO collection supporting push and pop in constant time."
                    .to_string(),
            ),
        )]);
        let urls = vec!["https://a.example".to_string()];
        let answer = fetch_web_answer(&pages, &profile(), &llm, "what is a stack?", &urls).await;
        assert!(answer.contains("LIFO"));
    }

    #[tokio::test]
    async fn web_synthesis_prompt_carries_subject_framing() {
        let pages = PageFetcher::fixed(HashMap::from([(
            "https://a.example".to_string(),
            "A stack is a last-in first-out data structure.".to_string(),
        )]));
        // The rule only fires if the framing line made it into the prompt.
        let reply = "A stack is a LIFO collection supporting push and pop in constant time.";
        let llm = LlmProvider::dummy_routed(vec![(
            "You are an educational assistant specialized in Computer Science.".to_string(),
            Reply::Text(reply.to_string()),
        )]);
        let urls = vec!["https://a.example".to_string()];
        let answer = fetch_web_answer(&pages, &profile(), &llm, "what is a stack?", &urls).await;
        assert_eq!(answer, reply);
    }

    #[tokio::test]
    async fn web_content_over_budget_is_truncated_before_synthesis() {
        // The first page fills the content cap exactly; the second page's
        // marker must be cut before the prompt is assembled.
        let pages = PageFetcher::fixed(HashMap::from([
            ("https://a.example".to_string(), "x".repeat(WEB_CONTENT_BUDGET)),
            ("https://b.example".to_string(), "OVERFLOWMARKER stack facts".to_string()),
        ]));
        let reply = "A stack is a LIFO collection supporting push and pop in constant time.";
        let llm = LlmProvider::dummy_routed(vec![
            ("OVERFLOWMARKER".to_string(), Reply::Text("leaked past the cap".to_string())),
            ("Web Content:".to_string(), Reply::Text(reply.to_string())),
        ]);
        let urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];
        let answer = fetch_web_answer(&pages, &profile(), &llm, "what is a stack?", &urls).await;
        assert_eq!(answer, reply);
    }

    #[tokio::test]
    async fn web_hedging_synthesis_is_downgraded() {
        let pages = PageFetcher::fixed(HashMap::from([(
            "https://a.example".to_string(),
            "unrelated page text".to_string(),
        )]));
        let llm = LlmProvider::dummy_routed(vec![(
            "Web Content:".to_string(),
            Reply::Text("The answer is not found in the provided content.".to_string()),
        )]);
        let urls = vec!["https://a.example".to_string()];
        let answer = fetch_web_answer(&pages, &profile(), &llm, "q", &urls).await;
        assert_eq!(answer, "Could not find a specific answer from the scraped web content.");
    }
}
