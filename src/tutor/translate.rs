use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_BASE_URL: &str = "https://translation.googleapis.com";

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TranslationError {
    #[error("the translation service is unavailable: {0}")]
    ServiceUnavailable(String),
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &str) -> Result<String, TranslationError>;
}

pub fn is_default_language(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(DEFAULT_LANGUAGE)
}

/// Accepts codes such as `es`, `uk`, `haw` or `zh-TW`.
pub fn is_valid_language_code(code: &str) -> bool {
    let mut parts = code.split('-');
    let primary = parts.next().unwrap_or_default();
    let region = parts.next();

    (2..=3).contains(&primary.len())
        && primary.chars().all(|c| c.is_ascii_alphabetic())
        && region.map_or(true, |r| {
            (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric())
        })
        && parts.next().is_none()
}

/// Translates `text`, or hands it back untouched for the default language
/// without calling the service.
pub async fn translate(
    translator: &dyn Translator,
    text: String,
    target: &str,
) -> Result<String, TranslationError> {
    if is_default_language(target) {
        return Ok(text);
    }
    translator.translate(&text, target.trim()).await
}

#[derive(Debug, Clone, PartialEq)]
pub struct Localized {
    pub text: String,
    /// Set when the translation failed and `text` is the original.
    pub fallback: Option<TranslationError>,
}

pub async fn translate_or_original(
    translator: &dyn Translator,
    text: String,
    target: &str,
) -> Localized {
    match translate(translator, text.clone(), target).await {
        Ok(text) => Localized {
            text,
            fallback: None,
        },
        Err(e) => {
            warn!("Translation to {} failed, showing the original text: {}", target, e);
            Localized {
                text,
                fallback: Some(e),
            }
        }
    }
}

/// Google Cloud Translation (v2) client.
pub struct GoogleTranslator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl GoogleTranslator {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String, TranslationError> {
        debug!("Translating {} characters to {}", text.len(), target);

        let url = format!(
            "{}/language/translate/v2",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&TranslateRequest {
                q: text,
                target,
                format: "text",
            })
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::ServiceUnavailable(format!(
                "service answered {}",
                status
            )));
        }

        let body: TranslateResponse = response.json().await.map_err(unavailable)?;
        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| TranslationError::ServiceUnavailable("no translation returned".into()))
    }
}

fn unavailable(err: reqwest::Error) -> TranslationError {
    TranslationError::ServiceUnavailable(err.to_string())
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslationList,
}

#[derive(Deserialize)]
struct TranslationList {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}
