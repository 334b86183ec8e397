use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::tutor::content::{GenerationError, GenerationRequest, SafetySetting, TextGenerator};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Finish reasons that mean the answer was withheld rather than empty.
const BLOCKING_FINISH_REASONS: [&str; 4] = ["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT"];

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        debug!("Generating content with {}: {:?}", self.model, request.prompt);

        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
            safety_settings: request.safety.clone(),
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !status.is_success() {
            let error = classify_failure(status, &text);
            warn!("Gemini request failed with {}: {}", status, error);
            return Err(error);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Unreachable(format!("unexpected response: {}", e)))?;
        let content = extract_text(parsed)?;

        debug!("Completion: {:?}", content);
        Ok(content)
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout.as_secs())
    } else {
        GenerationError::Unreachable(err.to_string())
    }
}

fn classify_failure(status: StatusCode, body: &str) -> GenerationError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::AuthFailure,
        StatusCode::BAD_REQUEST
            if body.contains("API_KEY_INVALID") || message.contains("API key") =>
        {
            GenerationError::AuthFailure
        }
        StatusCode::TOO_MANY_REQUESTS => {
            GenerationError::RequestRejected(format!("quota exceeded: {}", message))
        }
        _ => GenerationError::RequestRejected(message),
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::RequestRejected(format!(
            "prompt blocked ({})",
            reason
        )));
    }

    let candidate = match response.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => return Err(GenerationError::EmptyResponse),
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    match candidate.finish_reason {
        Some(reason) if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) => Err(
            GenerationError::RequestRejected(format!("response blocked ({})", reason)),
        ),
        _ => Err(GenerationError::EmptyResponse),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{http_client, serve_nothing, serve_once};
    use crate::tutor::content::BlockThreshold;

    fn parse(json: &str) -> Result<String, GenerationError> {
        extract_text(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn text_parts_are_joined() {
        let text = parse(
            r###"{"candidates":[{"content":{"role":"model","parts":[{"text":"## Excel\n"},{"text":"Cells hold values."}]},"finishReason":"STOP"}]}"###,
        );
        assert_eq!(text, Ok("## Excel\nCells hold values.".to_string()));
    }

    #[test]
    fn missing_text_is_an_empty_response() {
        assert_eq!(parse(r#"{"candidates":[]}"#), Err(GenerationError::EmptyResponse));
        assert_eq!(parse(r#"{}"#), Err(GenerationError::EmptyResponse));
        assert_eq!(
            parse(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]},"finishReason":"STOP"}]}"#),
            Err(GenerationError::EmptyResponse)
        );
    }

    #[test]
    fn safety_blocks_are_rejections() {
        assert!(matches!(
            parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            Err(GenerationError::RequestRejected(reason)) if reason.contains("SAFETY")
        ));
        assert!(matches!(
            parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#),
            Err(GenerationError::RequestRejected(_))
        ));
    }

    #[test]
    fn failures_are_classified_by_status() {
        assert_eq!(
            classify_failure(
                StatusCode::BAD_REQUEST,
                r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#
            ),
            GenerationError::AuthFailure
        );
        assert_eq!(
            classify_failure(StatusCode::FORBIDDEN, ""),
            GenerationError::AuthFailure
        );
        assert!(matches!(
            classify_failure(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#
            ),
            GenerationError::RequestRejected(reason) if reason.starts_with("quota exceeded")
        ));
        assert!(matches!(
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            GenerationError::RequestRejected(_)
        ));
    }

    #[tokio::test]
    async fn sends_prompt_and_settings_to_the_model_endpoint() {
        let (url, server) = serve_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"Lesson text"}]},"finishReason":"STOP"}]}"#,
        )
        .await;
        let client = GeminiClient::new(
            http_client(),
            url,
            "gemini-pro",
            "AIzaTestKey",
            Duration::from_secs(5),
        );
        let request = GenerationRequest::tutorial("Create a tutorial for Excel basics")
            .with_safety(SafetySetting::uniform(BlockThreshold::BlockOnlyHigh));

        let text = client.generate(&request).await;
        assert_eq!(text, Ok("Lesson text".to_string()));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /models/gemini-pro:generateContent"));
        assert!(raw.to_ascii_lowercase().contains("x-goog-api-key: aizatestkey"));
        assert!(raw.contains(r#""maxOutputTokens":2048"#));
        assert!(raw.contains("Create a tutorial for Excel basics"));
        assert!(raw.contains("BLOCK_ONLY_HIGH"));
    }

    #[tokio::test]
    async fn rejected_key_is_an_auth_failure() {
        let (url, _server) = serve_once(
            400,
            r#"{"error":{"code":400,"message":"API key not valid.","details":[{"reason":"API_KEY_INVALID"}]}}"#,
        )
        .await;
        let client = GeminiClient::new(http_client(), url, "gemini-pro", "bad", Duration::from_secs(5));

        let result = client.generate(&GenerationRequest::quiz("Quiz")).await;
        assert_eq!(result, Err(GenerationError::AuthFailure));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let (url, _server) = serve_nothing().await;
        let client = GeminiClient::new(
            http_client(),
            url,
            "gemini-pro",
            "AIzaTestKey",
            Duration::from_millis(200),
        );

        let result = client.generate(&GenerationRequest::tutorial("Anything")).await;
        assert!(matches!(result, Err(GenerationError::Timeout(_))));
    }
}
