use std::str::FromStr;
use std::time::Duration;

use crate::tutor::content::BlockThreshold;
use crate::tutor::{gemini, openai, translate};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("TUTOR_PROVIDER must be \"gemini\" or \"openai\", got \"{0}\"")]
    UnknownProvider(String),
    #[error("{name} must be a positive number of seconds, got \"{value}\"")]
    InvalidTimeout { name: &'static str, value: String },
    #[error("TUTOR_SAFETY_THRESHOLD is invalid: {0}")]
    InvalidThreshold(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl Provider {
    /// Environment variable holding this provider's API key.
    pub fn key_variable(&self) -> &'static str {
        match self {
            Provider::Gemini => "GOOGLE_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => gemini::DEFAULT_MODEL,
            Provider::OpenAi => openai::DEFAULT_MODEL,
        }
    }

    /// Whether `key` has the shape this provider hands out.
    pub fn looks_like_key(&self, key: &str) -> bool {
        match self {
            Provider::Gemini => key.starts_with("AI"),
            Provider::OpenAi => key.starts_with("sk-"),
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" | "chatgpt" => Ok(Provider::OpenAi),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: Provider,
    /// Absent keys are not an error; generation asks the user for one instead.
    pub api_key: Option<String>,
    /// Key for the translation service, `GOOGLE_API_KEY` regardless of provider.
    pub translation_key: Option<String>,
    pub model: String,
    pub gemini_url: String,
    pub openai_url: String,
    pub translate_url: String,
    pub request_timeout: Duration,
    pub safety_threshold: Option<BlockThreshold>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match var("TUTOR_PROVIDER") {
            Some(value) => value.parse()?,
            None => Provider::Gemini,
        };

        let request_timeout = match var("TUTOR_TIMEOUT_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        name: "TUTOR_TIMEOUT_SECS",
                        value,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let safety_threshold = var("TUTOR_SAFETY_THRESHOLD")
            .map(|value| value.parse::<BlockThreshold>())
            .transpose()
            .map_err(|e| ConfigError::InvalidThreshold(e.to_string()))?;

        Ok(Self {
            provider,
            api_key: var(provider.key_variable()),
            translation_key: var("GOOGLE_API_KEY"),
            model: var("TUTOR_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            gemini_url: var("TUTOR_GEMINI_URL").unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
            openai_url: var("TUTOR_OPENAI_URL").unwrap_or_else(|| openai::DEFAULT_API_URL.to_string()),
            translate_url: var("TUTOR_TRANSLATE_URL")
                .unwrap_or_else(|| translate::DEFAULT_BASE_URL.to_string()),
            request_timeout,
            safety_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_need_no_environment() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.provider, Provider::Gemini);
        assert_eq!(settings.api_key, None);
        assert_eq!(settings.model, "gemini-pro");
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert_eq!(settings.safety_threshold, None);
        assert_eq!(settings.openai_url, openai::DEFAULT_API_URL);
    }

    #[test]
    fn key_follows_the_provider() {
        let vars = [
            ("GOOGLE_API_KEY", "AIzaGoogle"),
            ("OPENAI_API_KEY", "sk-openai"),
        ];
        assert_eq!(settings(&vars).unwrap().api_key.as_deref(), Some("AIzaGoogle"));

        let openai = settings(&[vars[0], vars[1], ("TUTOR_PROVIDER", "OpenAI")]).unwrap();
        assert_eq!(openai.provider, Provider::OpenAi);
        assert_eq!(openai.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(openai.translation_key.as_deref(), Some("AIzaGoogle"));
        assert_eq!(openai.model, "gpt-3.5-turbo");
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert_eq!(settings(&[("GOOGLE_API_KEY", "  ")]).unwrap().api_key, None);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_eq!(
            settings(&[("TUTOR_PROVIDER", "bard")]).unwrap_err(),
            ConfigError::UnknownProvider("bard".to_string())
        );
        assert!(matches!(
            settings(&[("TUTOR_TIMEOUT_SECS", "0")]),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        assert!(matches!(
            settings(&[("TUTOR_SAFETY_THRESHOLD", "paranoid")]),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn overrides_are_read() {
        let settings = settings(&[
            ("TUTOR_MODEL", "gemini-1.5-flash"),
            ("TUTOR_TIMEOUT_SECS", "15"),
            ("TUTOR_SAFETY_THRESHOLD", "block_only_high"),
            ("TUTOR_GEMINI_URL", "http://localhost:9000"),
            ("TUTOR_OPENAI_URL", "http://localhost:9001/v1/chat/completions"),
        ])
        .unwrap();
        assert_eq!(settings.model, "gemini-1.5-flash");
        assert_eq!(settings.request_timeout, Duration::from_secs(15));
        assert_eq!(settings.safety_threshold, Some(BlockThreshold::BlockOnlyHigh));
        assert_eq!(settings.gemini_url, "http://localhost:9000");
        assert_eq!(settings.openai_url, "http://localhost:9001/v1/chat/completions");
    }

    #[test]
    fn key_shapes() {
        assert!(Provider::Gemini.looks_like_key("AIzaSyExample"));
        assert!(!Provider::Gemini.looks_like_key("sk-123"));
        assert!(Provider::OpenAi.looks_like_key("sk-123"));
    }
}
