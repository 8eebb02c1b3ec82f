//! Answer orchestration.
//!
//! [`SubjectAgent`] answers one question by consulting three sources
//! concurrently — the subject's document index, the bare model, and web
//! search results — then aggregating the three raw answers into one final
//! answer. The request moves through three phases:
//!
//!   SEARCHING  web search runs first so its URLs are ready for the web
//!              fetcher (and for the answer's source list)
//!   FETCHING   all three source fetchers run as independent tasks joined
//!              with a wait-for-all barrier; a panicked task becomes that
//!              source's failure string, never the request's
//!   DONE       the aggregator merges whatever the fetchers produced
//!
//! Every failure path degrades to a descriptive string in the answer
//! bundle. `comprehensive_answer` itself is infallible.

pub mod aggregate;
pub mod fetchers;
pub mod rules;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{Config, RetrievalConfig, SubjectProfile};
use crate::llm::LlmProvider;
use crate::web::{self, PageFetcher, SearchProvider};

// ── Answer bundle ─────────────────────────────────────────────────────────────

/// Everything one question produced: the final answer plus each source's
/// raw answer and the URLs consulted. Discarded after the response is
/// returned; the orchestrator keeps no cross-request state.
#[derive(Debug, Clone)]
pub struct ComprehensiveAnswer {
    pub final_answer: String,
    pub rag_answer: String,
    pub llm_answer: String,
    pub web_answer: String,
    pub sources: Vec<String>,
}

// ── Agent ─────────────────────────────────────────────────────────────────────

/// One subject's answer pipeline. Cheap to construct per request; the
/// collaborators it holds are shared immutable capabilities.
pub struct SubjectAgent {
    profile: SubjectProfile,
    llm: LlmProvider,
    search: SearchProvider,
    pages: PageFetcher,
    docstore_root: PathBuf,
    retrieval: RetrievalConfig,
}

impl SubjectAgent {
    pub fn new(
        profile: SubjectProfile,
        llm: LlmProvider,
        search: SearchProvider,
        pages: PageFetcher,
        docstore_root: PathBuf,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self { profile, llm, search, pages, docstore_root, retrieval }
    }

    /// Wire an agent from resolved configuration.
    pub fn from_config(config: &Config, subject: &str) -> Result<Self, crate::error::AppError> {
        let profile = config.subjects.resolve(subject);
        let llm = crate::llm::providers::build(&config.llm, config.llm_api_key.clone())
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        let search = SearchProvider::from_config(&config.search);
        let pages = PageFetcher::http()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        Ok(Self::new(
            profile,
            llm,
            search,
            pages,
            config.docstore_root(),
            config.retrieval.clone(),
        ))
    }

    pub fn subject(&self) -> &str {
        &self.profile.name
    }

    /// Answer `question` from all three sources and aggregate.
    pub async fn comprehensive_answer(&self, question: &str) -> ComprehensiveAnswer {
        info!(subject = %self.profile.name, %question, "answering question");

        // SEARCHING — the web fetcher and the source list both need the URLs.
        let search_results = self.search.search(question).await;
        let (web_urls, search_failure, sources) = if search_results.is_empty() {
            (
                Vec::new(),
                Some("Could not find relevant websites for this question.".to_string()),
                vec!["No relevant websites found.".to_string()],
            )
        } else if web::is_error_sentinel(&search_results) {
            warn!(detail = %search_results[0], "web search failed");
            (
                Vec::new(),
                Some(format!("Web search failed: {}", search_results[0])),
                vec!["Web search failed.".to_string()],
            )
        } else {
            (search_results.clone(), None, search_results)
        };

        // FETCHING — independent tasks, joined with a wait-for-all barrier.
        // A panicked task yields that source's failure string.
        let rag_task = {
            let root = self.docstore_root.clone();
            let profile = self.profile.clone();
            let llm = self.llm.clone();
            let top_k = self.retrieval.top_k;
            let question = question.to_string();
            tokio::spawn(async move {
                fetchers::fetch_document_answer(&root, &profile, &llm, top_k, &question).await
            })
        };
        let llm_task = {
            let profile = self.profile.clone();
            let llm = self.llm.clone();
            let question = question.to_string();
            tokio::spawn(
                async move { fetchers::fetch_baseline_answer(&profile, &llm, &question).await },
            )
        };
        let web_task = search_failure.is_none().then(|| {
            let pages = self.pages.clone();
            let profile = self.profile.clone();
            let llm = self.llm.clone();
            let question = question.to_string();
            let urls = web_urls.clone();
            tokio::spawn(async move {
                fetchers::fetch_web_answer(&pages, &profile, &llm, &question, &urls).await
            })
        });

        let rag_answer = settle(rag_task.await, "documents");
        let llm_answer = settle(llm_task.await, "baseline model");
        let web_answer = match (web_task, search_failure) {
            (Some(task), _) => settle(task.await, "web"),
            (None, Some(failure)) => failure,
            // search_failure is always Some when the web task was skipped
            (None, None) => "Error in web source task.".to_string(),
        };

        // DONE — merge whatever the fetchers produced.
        let mut final_answer = aggregate::aggregate(
            &self.llm,
            &self.profile.name,
            question,
            &rag_answer,
            &llm_answer,
            &web_answer,
        )
        .await;
        if final_answer.is_empty() {
            final_answer = "Aggregation resulted in an empty answer.".to_string();
        }

        info!(subject = %self.profile.name, "answer complete");
        ComprehensiveAnswer { final_answer, rag_answer, llm_answer, web_answer, sources }
    }
}

/// Convert a join result into the source's answer, substituting a failure
/// string when the task panicked.
fn settle(result: Result<String, tokio::task::JoinError>, source: &str) -> String {
    match result {
        Ok(answer) => answer,
        Err(e) => {
            warn!(%source, error = %e, "source task failed");
            format!("Error in {source} source task.")
        }
    }
}
