//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory — called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local models.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider::new())),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAiConfig;

    fn llm_config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            openai: OpenAiConfig {
                api_base_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
                model: "test-model".to_string(),
                temperature: 0.3,
                timeout_seconds: 5,
            },
        }
    }

    #[test]
    fn builds_dummy() {
        assert!(matches!(
            build(&llm_config("dummy"), None),
            Ok(LlmProvider::Dummy(_))
        ));
    }

    #[test]
    fn builds_openai_compatible() {
        assert!(matches!(
            build(&llm_config("openai"), Some("k".into())),
            Ok(LlmProvider::OpenAiCompatible(_))
        ));
    }

    #[test]
    fn unknown_provider_errors() {
        assert!(matches!(
            build(&llm_config("magic"), None),
            Err(ProviderError::UnknownProvider(_))
        ));
    }
}
