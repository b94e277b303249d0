//! Configuration: per-request LLM knobs, pipeline knobs, and runtime settings.
//!
//! [`LlmConfig`] travels with every [`LlmRequest`](crate::backend::LlmRequest).
//! [`PipelineConfig`] parameterizes the four stages (targets and caps).
//! [`Settings`] is loaded from the process environment (and `.env`) by the
//! binary and the demos.

use crate::{error::Result, PipelineError};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Configuration for LLM requests.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate. `None` leaves the provider default.
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Knobs shared by the four pipeline stages.
///
/// Targets are phrased the way they appear in prompts (`"3–6"`), so a
/// single number (`"4"`) works just as well as a range.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// How many chunks stage 2 asks for.
    pub chunk_target: String,
    /// How many questions stage 3 asks for.
    pub question_target: String,
    /// Length ceiling stage 1 asks the model to respect.
    pub explanation_ceiling: String,
    /// Chunk titles included in the stage 4 context.
    pub max_summary_chunk_titles: usize,
    /// Questions included in the stage 4 context.
    pub max_summary_questions: usize,
    /// Upper bound on questions synthesized from chunk titles.
    pub max_fallback_questions: usize,
    /// Request settings used for every stage call.
    pub llm: LlmConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_target: "3–6".to_string(),
            question_target: "3–5".to_string(),
            explanation_ceiling: "around 2–4 short paragraphs".to_string(),
            max_summary_chunk_titles: 6,
            max_summary_questions: 5,
            max_fallback_questions: 5,
            llm: LlmConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_chunk_target(mut self, target: impl Into<String>) -> Self {
        self.chunk_target = target.into();
        self
    }

    pub fn with_question_target(mut self, target: impl Into<String>) -> Self {
        self.question_target = target.into();
        self
    }

    pub fn with_explanation_ceiling(mut self, ceiling: impl Into<String>) -> Self {
        self.explanation_ceiling = ceiling.into();
        self
    }

    pub fn with_max_fallback_questions(mut self, cap: usize) -> Self {
        self.max_fallback_questions = cap;
        self
    }

    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    /// Reject configurations that would produce degenerate prompts.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("chunk_target", &self.chunk_target),
            ("question_target", &self.question_target),
            ("explanation_ceiling", &self.explanation_ceiling),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "{} cannot be empty",
                    name
                )));
            }
        }
        for (name, value) in [
            ("max_summary_chunk_titles", self.max_summary_chunk_titles),
            ("max_summary_questions", self.max_summary_questions),
            ("max_fallback_questions", self.max_fallback_questions),
        ] {
            if value == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(PipelineError::InvalidConfig(format!(
                "temperature {} is outside 0.0..=2.0",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

/// Runtime settings read from the environment.
#[derive(Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub embedding_model: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: LlmConfig::default().temperature,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv_loaded(dotenvy::dotenv())?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let temperature = match non_empty("CHUNKBUDDY_TEMPERATURE") {
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
                PipelineError::InvalidConfig(format!(
                    "CHUNKBUDDY_TEMPERATURE must be a number, got '{}'",
                    raw
                ))
            })?,
            None => defaults.temperature,
        };

        Ok(Self {
            api_key: non_empty("OPENAI_API_KEY"),
            base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: non_empty("CHUNKBUDDY_MODEL").unwrap_or(defaults.model),
            temperature,
            embedding_model: non_empty("CHUNKBUDDY_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
        })
    }

    /// The API key, or an error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            PipelineError::InvalidConfig("OPENAI_API_KEY must be set".to_string())
        })
    }

    /// Pipeline configuration seeded with these settings.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_llm(LlmConfig::default().with_temperature(self.temperature))
    }
}

/// A missing `.env` is fine; an unreadable or malformed one is not.
fn dotenv_loaded(result: std::result::Result<PathBuf, dotenvy::Error>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(PipelineError::InvalidConfig(format!(
            "failed to load .env: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_dotenv_is_ignored() {
        assert!(dotenv_loaded(Ok(PathBuf::from(".env"))).is_ok());
        let missing = dotenvy::Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no .env",
        ));
        assert!(dotenv_loaded(Err(missing)).is_ok());
    }

    #[test]
    fn malformed_dotenv_is_invalid_config() {
        let bad = dotenvy::Error::LineParse("OPENAI_API_KEY sk-abc".to_string(), 14);
        let err = dotenv_loaded(Err(bad)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref msg) if msg.contains(".env")));

        let denied = dotenvy::Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(matches!(dotenv_loaded(Err(denied)), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_llm_config_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.temperature, 0.5);
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn test_llm_config_builder() {
        let config = LlmConfig::default()
            .with_temperature(0.2)
            .with_max_tokens(500);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, Some(500));
    }

    #[test]
    fn test_pipeline_config_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pipeline_config_rejects_empty_target() {
        let config = PipelineConfig::default().with_chunk_target("  ");
        match config.validate().unwrap_err() {
            PipelineError::InvalidConfig(msg) => assert!(msg.contains("chunk_target")),
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_config_rejects_zero_cap() {
        let config = PipelineConfig::default().with_max_fallback_questions(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_config_rejects_wild_temperature() {
        let config =
            PipelineConfig::default().with_llm(LlmConfig::default().with_temperature(3.5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert!(settings.api_key.is_none());
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.temperature, 0.5);
        assert_eq!(settings.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert!(settings.require_api_key().is_err());
    }

    #[test]
    fn test_settings_reads_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080"),
            ("CHUNKBUDDY_MODEL", "gpt-4.1-mini"),
            ("CHUNKBUDDY_TEMPERATURE", "0.2"),
        ]))
        .unwrap();
        assert_eq!(settings.require_api_key().unwrap(), "sk-test");
        assert_eq!(settings.base_url, "http://localhost:8080");
        assert_eq!(settings.model, "gpt-4.1-mini");
        assert_eq!(settings.pipeline_config().llm.temperature, 0.2);
    }

    #[test]
    fn test_settings_blank_values_fall_back() {
        let settings =
            Settings::from_lookup(lookup(&[("OPENAI_API_KEY", " "), ("CHUNKBUDDY_MODEL", "")]))
                .unwrap();
        assert!(settings.api_key.is_none());
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_settings_bad_temperature() {
        let result = Settings::from_lookup(lookup(&[("CHUNKBUDDY_TEMPERATURE", "warm")]));
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_settings_debug_hides_key() {
        let settings = Settings::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("sk-secret"));
    }
}
