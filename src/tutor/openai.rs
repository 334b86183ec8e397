use std::time::Duration;

use async_trait::async_trait;
use chatgpt::{
    client::ChatGPT,
    config::{ChatGPTEngine, ModelConfiguration},
    types::CompletionResponse,
};
use log::{debug, warn};

use crate::tutor::content::{GenerationError, GenerationRequest, TextGenerator};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Generation backed by the OpenAI chat API.
///
/// A fresh `ChatGPT` client is configured for every request since temperature
/// and token cap differ between tutorials and quizzes.
pub struct ChatGptGenerator {
    api_key: String,
    engine: ChatGPTEngine,
    api_url: String,
    timeout: Duration,
}

impl ChatGptGenerator {
    pub fn new(
        api_key: impl Into<String>,
        model: &str,
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            engine: engine_for(model),
            api_url: api_url.into(),
            timeout,
        }
    }

    /// The timeout has to be part of the configuration the client is built
    /// from, it is baked into the underlying http client.
    fn client(&self, request: &GenerationRequest) -> Result<ChatGPT, GenerationError> {
        let api_url = reqwest::Url::parse(&self.api_url).map_err(|e| {
            GenerationError::Unreachable(format!("invalid API URL {:?}: {}", self.api_url, e))
        })?;
        let config = ModelConfiguration {
            engine: self.engine,
            temperature: request.temperature,
            max_tokens: Some(request.max_output_tokens),
            api_url,
            timeout: self.timeout,
            ..Default::default()
        };

        ChatGPT::new_with_config(self.api_key.clone(), config).map_err(|e| {
            warn!("Unable to set up the ChatGPT client: {}", e);
            GenerationError::AuthFailure
        })
    }
}

fn engine_for(model: &str) -> ChatGPTEngine {
    match model {
        "gpt-4" => ChatGPTEngine::Gpt4,
        "gpt-3.5-turbo" => ChatGPTEngine::Gpt35Turbo,
        other => {
            warn!("Unknown OpenAI model {:?}, falling back to {}", other, DEFAULT_MODEL);
            ChatGPTEngine::Gpt35Turbo
        }
    }
}

#[async_trait]
impl TextGenerator for ChatGptGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        debug!("Generating content with ChatGPT: {:?}", request.prompt);

        let gpt = self.client(request)?;
        let response: CompletionResponse = gpt
            .send_message(request.prompt.as_str())
            .await
            .map_err(|e| classify(e, self.timeout))?;
        let content = response.message().clone().content;

        debug!("Completion: {:?}", content);

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(content)
    }
}

fn classify(err: chatgpt::err::Error, timeout: Duration) -> GenerationError {
    match err {
        chatgpt::err::Error::BackendError {
            message,
            error_type,
        } => classify_backend(&message, &error_type),
        chatgpt::err::Error::ClientError(e) if e.is_timeout() => {
            GenerationError::Timeout(timeout.as_secs())
        }
        other => GenerationError::Unreachable(other.to_string()),
    }
}

fn classify_backend(message: &str, error_type: &str) -> GenerationError {
    if message.contains("API key") || error_type.contains("auth") {
        GenerationError::AuthFailure
    } else {
        GenerationError::RequestRejected(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve_nothing, serve_once};

    #[test]
    fn invalid_keys_are_auth_failures() {
        assert_eq!(
            classify_backend(
                "Incorrect API key provided: sk-abc. You can find your API key at https://platform.openai.com/account/api-keys.",
                "invalid_request_error"
            ),
            GenerationError::AuthFailure
        );
    }

    #[test]
    fn quota_and_policy_errors_are_rejections() {
        assert_eq!(
            classify_backend("You exceeded your current quota", "insufficient_quota"),
            GenerationError::RequestRejected("You exceeded your current quota".to_string())
        );
    }

    #[test]
    fn known_models_map_to_engines() {
        assert!(matches!(engine_for("gpt-3.5-turbo"), ChatGPTEngine::Gpt35Turbo));
        assert!(matches!(engine_for("gpt-4"), ChatGPTEngine::Gpt4));
        assert!(matches!(engine_for("davinci"), ChatGPTEngine::Gpt35Turbo));
    }

    #[tokio::test]
    async fn sends_the_configured_request() {
        let (url, server) = serve_once(
            200,
            r#"{"id":"chatcmpl-1","object":"chat.completion","created":1700000000,"model":"gpt-3.5-turbo","choices":[{"index":0,"message":{"role":"assistant","content":"Open the File menu."},"finish_reason":"stop"}],"usage":{"prompt_tokens":9,"completion_tokens":5,"total_tokens":14}}"#,
        )
        .await;
        let generator = ChatGptGenerator::new(
            "sk-test",
            "gpt-3.5-turbo",
            format!("{}/v1/chat/completions", url),
            Duration::from_secs(5),
        );

        let text = generator
            .generate(&GenerationRequest::quiz("Create a quiz about files"))
            .await;
        assert_eq!(text, Ok("Open the File menu.".to_string()));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(raw.contains(r#""max_tokens":1024"#));
        assert!(raw.contains("Create a quiz about files"));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let (url, _server) = serve_nothing().await;
        let generator = ChatGptGenerator::new(
            "sk-test",
            "gpt-3.5-turbo",
            format!("{}/v1/chat/completions", url),
            Duration::from_millis(200),
        );

        let result = generator.generate(&GenerationRequest::tutorial("Anything")).await;
        assert!(matches!(result, Err(GenerationError::Timeout(_))));
    }

    #[tokio::test]
    async fn invalid_api_url_is_unreachable() {
        let generator =
            ChatGptGenerator::new("sk-test", "gpt-4", "not a url", Duration::from_secs(5));
        let result = generator.generate(&GenerationRequest::quiz("Quiz")).await;
        assert!(matches!(result, Err(GenerationError::Unreachable(_))));
    }
}
