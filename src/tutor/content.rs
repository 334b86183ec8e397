use std::str::FromStr;

use async_trait::async_trait;

pub const TUTORIAL_TEMPERATURE: f32 = 0.8;
pub const TUTORIAL_MAX_OUTPUT_TOKENS: u32 = 2048;
pub const QUIZ_TEMPERATURE: f32 = 0.8;
pub const QUIZ_MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum GenerationError {
    #[error("the API key is missing or was not accepted")]
    AuthFailure,
    #[error("the generation service rejected the request: {0}")]
    RequestRejected(String),
    #[error("the generation service returned no text")]
    EmptyResponse,
    #[error("the generation service did not answer within {0} seconds")]
    Timeout(u64),
    #[error("could not reach the generation service: {0}")]
    Unreachable(String),
}

/// Something that turns a prompt into text. Each call is one remote request.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown safety threshold \"{0}\"")]
pub struct UnknownThreshold(pub String);

impl FromStr for BlockThreshold {
    type Err = UnknownThreshold;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block_none" => Ok(BlockThreshold::BlockNone),
            "block_only_high" => Ok(BlockThreshold::BlockOnlyHigh),
            "block_medium_and_above" => Ok(BlockThreshold::BlockMediumAndAbove),
            "block_low_and_above" => Ok(BlockThreshold::BlockLowAndAbove),
            _ => Err(UnknownThreshold(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: BlockThreshold,
}

impl SafetySetting {
    /// The same threshold for every harm category.
    pub fn uniform(threshold: BlockThreshold) -> Vec<SafetySetting> {
        HarmCategory::ALL
            .into_iter()
            .map(|category| SafetySetting {
                category,
                threshold,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub safety: Vec<SafetySetting>,
}

impl GenerationRequest {
    /// Temperature is clamped into `[0, 1]` and the token cap is at least 1.
    pub fn new(prompt: impl Into<String>, temperature: f32, max_output_tokens: u32) -> Self {
        let temperature = if temperature.is_nan() {
            0.0
        } else {
            temperature.clamp(0.0, 1.0)
        };
        Self {
            prompt: prompt.into(),
            temperature,
            max_output_tokens: max_output_tokens.max(1),
            safety: Vec::new(),
        }
    }

    pub fn tutorial(prompt: impl Into<String>) -> Self {
        Self::new(prompt, TUTORIAL_TEMPERATURE, TUTORIAL_MAX_OUTPUT_TOKENS)
    }

    pub fn quiz(prompt: impl Into<String>) -> Self {
        Self::new(prompt, QUIZ_TEMPERATURE, QUIZ_MAX_OUTPUT_TOKENS)
    }

    pub fn with_safety(mut self, safety: Vec<SafetySetting>) -> Self {
        self.safety = safety;
        self
    }
}
