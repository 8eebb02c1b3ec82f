//! Configuration loading with env-var overrides.
//!
//! Reads a TOML file (`--config` path or `config/default.toml`), applies
//! `EDUAGENT_WORK_DIR` / `EDUAGENT_LOG_LEVEL` env overrides, and builds the
//! immutable subject registry. Secrets (`LLM_API_KEY`, `GOOGLE_API_KEY`,
//! `GOOGLE_CSE_ID`) come from the environment only — never from TOML.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

// ── Resolved config ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub agent_name: String,
    pub work_dir: PathBuf,
    pub log_level: String,
    pub llm: LlmConfig,
    /// From `LLM_API_KEY` env. `None` for keyless local models.
    pub llm_api_key: Option<String>,
    pub search: SearchConfig,
    pub retrieval: RetrievalConfig,
    pub subjects: SubjectRegistry,
}

impl Config {
    /// Root directory holding one sub-directory per subject index.
    pub fn docstore_root(&self) -> PathBuf {
        self.work_dir.join("docstore")
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// `"openai"` / `"openai-compatible"` / `"dummy"`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Number of results requested from the search provider.
    pub num_results: u8,
    pub timeout_seconds: u64,
    /// From `GOOGLE_API_KEY` env.
    pub google_api_key: Option<String>,
    /// From `GOOGLE_CSE_ID` env.
    pub google_cse_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Chunks fed into the retrieval prompt per question.
    pub top_k: usize,
    /// Chunk size in bytes used at ingest time.
    pub chunk_size: usize,
}

// ── Subject registry ──────────────────────────────────────────────────────────

/// Prompt specialization and index location for one subject.
#[derive(Debug, Clone)]
pub struct SubjectProfile {
    pub name: String,
    /// Directory name under `docstore/` — lowercased, spaces to underscores.
    pub slug: String,
    /// System prompt for the retrieval-grounded completion call.
    pub rag_prompt: String,
}

/// Immutable map from subject name to profile, built once at startup.
///
/// Unknown subjects resolve to a generic profile parameterized by name, so a
/// question for an unconfigured subject still runs (its index is simply
/// absent until someone ingests documents for it).
#[derive(Debug, Clone)]
pub struct SubjectRegistry {
    profiles: HashMap<String, SubjectProfile>,
}

impl SubjectRegistry {
    fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for (name, prompt) in [
            (
                "Computer Science",
                "You are an educational assistant specialized in Computer Science. \
                 When asked to define or explain a concept using the provided context, \
                 provide a clear and concise definition or explanation based *only* on that context. \
                 Avoid discussing unrelated topics such as job market impact unless explicitly \
                 requested and present in the context. \
                 If the context doesn't contain the answer, state that."
                    .to_string(),
            ),
            (
                "Math",
                "You are an educational assistant specialized in Math. \
                 Using *only* the provided context, provide precise definitions and \
                 step-by-step explanations for mathematical concepts. \
                 Include examples and proofs *if* they are available in the context. \
                 If the context doesn't contain the answer, state that."
                    .to_string(),
            ),
            (
                "Physics",
                "You are an educational assistant specialized in Physics. \
                 Using *only* the provided context, offer clear definitions and detailed \
                 explanations for physics concepts. \
                 Use real-world examples *if* they are present in the context. \
                 If the context doesn't contain the answer, state that."
                    .to_string(),
            ),
        ] {
            profiles.insert(
                name.to_string(),
                SubjectProfile {
                    name: name.to_string(),
                    slug: subject_slug(name),
                    rag_prompt: prompt,
                },
            );
        }
        Self { profiles }
    }

    /// Resolve a subject name to its profile. Unknown subjects get the
    /// generic prompt template.
    pub fn resolve(&self, name: &str) -> SubjectProfile {
        self.profiles.get(name).cloned().unwrap_or_else(|| SubjectProfile {
            name: name.to_string(),
            slug: subject_slug(name),
            rag_prompt: generic_rag_prompt(name),
        })
    }

    /// Configured subject names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SubjectRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn subject_slug(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn generic_rag_prompt(name: &str) -> String {
    format!(
        "You are an educational assistant for {name}. Provide clear, concise, and accurate \
         answers based *only* on the given context. \
         If the context doesn't contain the answer, state that."
    )
}

// ── Raw TOML shapes ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    agent: RawAgent,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    search: RawSearch,
    #[serde(default)]
    retrieval: RawRetrieval,
    /// `[subjects."Subject Name"] prompt = "..."` — adds or overrides profiles.
    #[serde(default)]
    subjects: HashMap<String, RawSubject>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAgent {
    #[serde(default = "default_agent_name")]
    name: String,
    #[serde(default = "default_work_dir")]
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawAgent {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            work_dir: default_work_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLlm {
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_llm_timeout")]
    timeout_seconds: u64,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_base_url: default_api_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSearch {
    #[serde(default = "default_num_results")]
    num_results: u8,
    #[serde(default = "default_search_timeout")]
    timeout_seconds: u64,
}

impl Default for RawSearch {
    fn default() -> Self {
        Self {
            num_results: default_num_results(),
            timeout_seconds: default_search_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRetrieval {
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
}

impl Default for RawRetrieval {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSubject {
    prompt: String,
}

fn default_agent_name() -> String {
    "eduagent".to_string()
}
fn default_work_dir() -> String {
    "~/.eduagent".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_provider() -> String {
    "dummy".to_string()
}
fn default_api_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_num_results() -> u8 {
    5
}
fn default_search_timeout() -> u64 {
    10
}
fn default_top_k() -> usize {
    4
}
fn default_chunk_size() -> usize {
    1000
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. If no path is given and `config/default.toml` does not
/// exist, returns the built-in defaults.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("EDUAGENT_WORK_DIR").ok();
    let log_level_override = env::var("EDUAGENT_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(
            default_path,
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        )
    } else {
        Ok(resolve(
            RawConfig::default(),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        ))
    }
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    Ok(resolve(parsed, work_dir_override, log_level_override))
}

fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Config {
    let work_dir_str = work_dir_override.unwrap_or(&parsed.agent.work_dir).to_string();
    let work_dir = expand_home(&work_dir_str);
    let log_level = log_level_override.unwrap_or(&parsed.agent.log_level).to_string();

    let mut subjects = SubjectRegistry::builtin();
    for (name, raw) in parsed.subjects {
        let profile = SubjectProfile {
            slug: subject_slug(&name),
            rag_prompt: raw.prompt,
            name: name.clone(),
        };
        subjects.profiles.insert(name, profile);
    }

    Config {
        agent_name: parsed.agent.name,
        work_dir,
        log_level,
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.api_base_url,
                model: parsed.llm.model,
                temperature: parsed.llm.temperature,
                timeout_seconds: parsed.llm.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        search: SearchConfig {
            num_results: parsed.search.num_results,
            timeout_seconds: parsed.search.timeout_seconds,
            google_api_key: env::var("GOOGLE_API_KEY").ok(),
            google_cse_id: env::var("GOOGLE_CSE_ID").ok(),
        },
        retrieval: RetrievalConfig {
            top_k: parsed.retrieval.top_k,
            chunk_size: parsed.retrieval.chunk_size,
        },
        subjects,
    }
}

/// Expand a leading `~` or `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
