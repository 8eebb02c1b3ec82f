//! Final-answer aggregation.
//!
//! Takes the three raw source answers, decides availability per source,
//! and either composes a deterministic "no reliable answer" message (no
//! model call) or runs one synthesis completion. Synthesis failures fall
//! back to the single best raw answer rather than failing the request.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::llm::LlmProvider;

use super::rules;

const RAG_PLACEHOLDER: &str = "Not available or not found in documents.";
const LLM_PLACEHOLDER: &str = "LLM baseline failed or unavailable.";
const WEB_PLACEHOLDER: &str = "Not available or not found on web.";

/// Merge the three source answers into one final answer. Never fails:
/// every error path degrades to a descriptive string.
pub async fn aggregate(
    llm: &LlmProvider,
    subject: &str,
    question: &str,
    rag_answer: &str,
    llm_answer: &str,
    web_answer: &str,
) -> String {
    let rag_ok = rules::is_available(rag_answer, rules::RAG_UNAVAILABLE);
    let llm_ok = rules::is_available(llm_answer, rules::LLM_UNAVAILABLE);
    let web_ok = rules::is_available(web_answer, rules::WEB_UNAVAILABLE);

    if !rag_ok && !llm_ok && !web_ok {
        info!("aggregation skipped, no source produced a usable answer");
        return format!(
            "Sorry, I could not find a reliable answer from any source.\n\
             Details:\n\
             Documents: {rag_answer}\n\
             LLM: {llm_answer}\n\
             Web: {web_answer}"
        );
    }

    let rag_input = if rag_ok { rag_answer } else { RAG_PLACEHOLDER };
    let llm_input = if llm_ok { llm_answer } else { LLM_PLACEHOLDER };
    let web_input = if web_ok { web_answer } else { WEB_PLACEHOLDER };

    let system = format!(
        "You are a highly intelligent AI assistant specializing in {subject}. Your task is \
         to synthesize information from up to three different sources: a knowledge base \
         (RAG), a general language model (LLM), and web search results (Web). Analyze the \
         provided answers below, noting consensus and discrepancies. Construct a single, \
         comprehensive, accurate, and well-structured final answer to the user's original \
         question. Prioritize information confirmed by multiple sources, especially the RAG \
         source if it provided a relevant answer. If sources conflict significantly on key \
         points, you may briefly mention the differing views if crucial for understanding, \
         but aim for a unified answer. Ignore sources marked as 'Not available' or similar. \
         Do not mention the source names (RAG, LLM, Web) or the aggregation process in your \
         final output. Focus solely on providing the best possible answer to the original \
         question based on the information provided.\n\
         IMPORTANT: DO NOT include <think>...</think> tags in your final output."
    );
    let prompt = format!(
        "Original Question: {question}\n\n\
         ---\nAnswer from Document Knowledge Base (RAG):\n{rag_input}\n\n\
         ---\nAnswer from General Language Model (LLM):\n{llm_input}\n\n\
         ---\nAnswer from Web Search (Web):\n{web_input}\n\n\
         ---\nSynthesized Final Answer:"
    );

    match llm.complete(&prompt, Some(&system)).await {
        Ok(raw) => {
            let cleaned = strip_think_tags(&raw);
            if cleaned.is_empty() {
                debug!("synthesis completion was empty after cleaning");
                "Aggregation LLM returned an empty response after cleaning.".to_string()
            } else {
                cleaned
            }
        }
        Err(e) => {
            warn!(error = %e, "synthesis failed, falling back to best raw answer");
            if rag_ok {
                format!("(Aggregation Failed) Best answer from documents: {rag_input}")
            } else if web_ok {
                format!("(Aggregation Failed) Best answer from web: {web_input}")
            } else if llm_ok {
                format!("(Aggregation Failed) Best answer from baseline LLM: {llm_input}")
            } else {
                "An error occurred during final answer aggregation, and no fallback source \
                 was available."
                    .to_string()
            }
        }
    }
}

/// Remove `<think>...</think>` reasoning blocks (non-greedy, may span lines)
/// and trim.
pub fn strip_think_tags(text: &str) -> String {
    static THINK: OnceLock<Regex> = OnceLock::new();
    let re = THINK.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>\s*").expect("static regex"));
    re.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use crate::llm::providers::dummy::Reply;

    use super::*;

    const FAILED_RAG: &str = "An error occurred while retrieving the document-based answer.";
    const FAILED_LLM: &str = "LLM returned an empty response.";
    const FAILED_WEB: &str = "Web search failed: missing credentials.";

    #[tokio::test]
    async fn all_unavailable_skips_model_and_lists_details() {
        let llm = LlmProvider::dummy();
        let answer = aggregate(&llm, "Math", "q", FAILED_RAG, FAILED_LLM, FAILED_WEB).await;
        assert!(answer.starts_with("Sorry, I could not find a reliable answer from any source."));
        assert!(answer.contains(FAILED_RAG));
        assert!(answer.contains(FAILED_LLM));
        assert!(answer.contains(FAILED_WEB));
        assert_eq!(llm.dummy_call_count(), 0);
    }

    #[tokio::test]
    async fn available_sources_feed_one_synthesis_call() {
        let llm = LlmProvider::dummy_routed(vec![(
            "Synthesized Final Answer:".to_string(),
            Reply::Text("A stack is a LIFO data structure.".to_string()),
        )]);
        let rag = "A stack is a last-in first-out collection with push and pop operations.";
        let answer = aggregate(&llm, "Computer Science", "what is a stack?", rag, FAILED_LLM, FAILED_WEB).await;
        assert_eq!(answer, "A stack is a LIFO data structure.");
        assert_eq!(llm.dummy_call_count(), 1);
    }

    #[tokio::test]
    async fn unavailable_sources_are_replaced_with_placeholders() {
        // Echo provider returns the prompt, so the placeholders are visible.
        let llm = LlmProvider::dummy();
        let rag = "A stack is a last-in first-out collection with push and pop operations.";
        let answer = aggregate(&llm, "Computer Science", "q", rag, FAILED_LLM, FAILED_WEB).await;
        assert!(!answer.contains(RAG_PLACEHOLDER));
        assert!(answer.contains(rag));
        assert!(answer.contains(LLM_PLACEHOLDER));
        assert!(answer.contains(WEB_PLACEHOLDER));
        assert!(!answer.contains(FAILED_WEB));
    }

    #[tokio::test]
    async fn synthesis_failure_falls_back_to_web_when_only_web_available() {
        let llm = LlmProvider::dummy_routed(vec![(
            "Synthesized Final Answer:".to_string(),
            Reply::Fail("gateway down".to_string()),
        )]);
        let web = "Photosynthesis converts light energy into chemical energy in plants.";
        let answer = aggregate(&llm, "Physics", "q", FAILED_RAG, FAILED_LLM, web).await;
        assert!(answer.starts_with("(Aggregation Failed)"));
        assert!(answer.contains(web));
        assert!(!answer.contains(FAILED_RAG));
        assert!(!answer.contains(FAILED_LLM));
    }

    #[tokio::test]
    async fn synthesis_failure_prefers_documents_over_web() {
        let llm = LlmProvider::dummy_routed(vec![(
            "Synthesized Final Answer:".to_string(),
            Reply::Fail("gateway down".to_string()),
        )]);
        let rag = "Documents say stacks are LIFO collections with push and pop operations.";
        let web = "Web says stacks are LIFO too.";
        let answer = aggregate(&llm, "Computer Science", "q", rag, FAILED_LLM, web).await;
        assert!(answer.contains("Best answer from documents:"));
        assert!(answer.contains(rag));
    }

    #[tokio::test]
    async fn empty_synthesis_after_cleaning_is_reported() {
        let llm = LlmProvider::dummy_routed(vec![(
            "Synthesized Final Answer:".to_string(),
            Reply::Text("<think>only internal notes</think>".to_string()),
        )]);
        let rag = "A stack is a last-in first-out collection with push and pop operations.";
        let answer = aggregate(&llm, "Computer Science", "q", rag, FAILED_LLM, FAILED_WEB).await;
        assert_eq!(answer, "Aggregation LLM returned an empty response after cleaning.");
    }

    #[test]
    fn think_tags_are_stripped() {
        assert_eq!(strip_think_tags("<think>internal notes</think>Final text."), "Final text.");
        assert_eq!(
            strip_think_tags("<think>line one\nline two</think>\n  Answer."),
            "Answer."
        );
        assert_eq!(strip_think_tags("No tags here."), "No tags here.");
        assert_eq!(
            strip_think_tags("<think>a</think>First. <think>b</think>Second."),
            "First. Second."
        );
    }
}
