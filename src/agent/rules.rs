//! Heuristic answer-quality classification.
//!
//! The per-source fetchers run model output through a [`Ruleset`] before
//! reporting it: explicit non-answer phrasing and short hedging replies are
//! both downgraded to the source's fixed "no answer" message. The aggregator
//! then uses per-source marker lists to decide which source answers are real
//! before merging them.
//!
//! All matching is case-insensitive substring containment over the full text.

// ── Classification ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerQuality {
    /// The model explicitly said it has no answer.
    Unavailable,
    /// Short reply that only hedges about the provided material.
    TooShortHedge,
    /// Usable answer.
    Ok,
}

/// Marker phrases and the hedge length cutoff for one source's output.
pub struct Ruleset {
    non_answer_markers: &'static [&'static str],
    hedge_markers: &'static [&'static str],
    hedge_max_len: usize,
}

impl Ruleset {
    pub fn classify(&self, text: &str) -> AnswerQuality {
        let lowered = text.to_lowercase();
        if self.non_answer_markers.iter().any(|m| lowered.contains(m)) {
            return AnswerQuality::Unavailable;
        }
        if text.chars().count() < self.hedge_max_len
            && self.hedge_markers.iter().any(|m| lowered.contains(m))
        {
            return AnswerQuality::TooShortHedge;
        }
        AnswerQuality::Ok
    }
}

/// Rules applied to document-grounded answers.
pub const DOCUMENT_RULES: Ruleset = Ruleset {
    non_answer_markers: &[
        "cannot find relevant information",
        "context doesn't contain",
        "context does not contain",
        "based on the context provided",
        "based on the text provided",
        "information provided does not",
        "i cannot answer",
    ],
    hedge_markers: &["based on", "context", "content"],
    hedge_max_len: 50,
};

/// Rules applied to web-synthesized answers. Web models hedge about "the
/// provided content" in more variations, and get a slightly longer leash.
pub const WEB_RULES: Ruleset = Ruleset {
    non_answer_markers: &[
        "cannot find relevant information",
        "context doesn't contain",
        "context does not contain",
        "based on the context provided",
        "based on the text provided",
        "information provided does not",
        "i cannot answer",
        "answer is not found",
        "content does not provide",
        "based on the provided content",
        "information given does not",
        "provided text does not contain",
    ],
    hedge_markers: &["based on", "context", "content"],
    hedge_max_len: 60,
};

/// Detects completions that are themselves error reports from an upstream
/// model gateway rather than answers.
pub fn looks_like_llm_error(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("error") && (lowered.contains("llm") || lowered.contains("generating response"))
}

// ── Aggregator availability ───────────────────────────────────────────────────

/// Markers identifying the document fetcher's own failure messages.
pub const RAG_UNAVAILABLE: &[&str] = &[
    "please create",
    "error initializing",
    "failed to load",
    "an error occurred",
    "do not seem to contain",
    "source task",
];

/// Markers identifying the baseline fetcher's own failure messages.
pub const LLM_UNAVAILABLE: &[&str] = &[
    "llm returned an empty",
    "an error occurred",
    "source task",
];

/// Markers identifying the web fetcher's own failure messages.
pub const WEB_UNAVAILABLE: &[&str] = &[
    "web search failed",
    "could not find relevant websites",
    "failed to scrape content",
    "could not extract meaningful content",
    "could not find a specific answer",
    "error synthesizing answer",
    "no websites provided",
    "an error occurred",
    "source task",
];

/// A source answer is available when it is non-empty and contains none of
/// that source's failure markers.
pub fn is_available(answer: &str, markers: &[&str]) -> bool {
    if answer.trim().is_empty() {
        return false;
    }
    let lowered = answer.to_lowercase();
    !markers.iter().any(|m| lowered.contains(m))
}
