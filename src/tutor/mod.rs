pub mod content;
pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod translate;

use log::info;

use crate::config::{Provider, Settings};
use content::{GenerationError, GenerationRequest, SafetySetting, TextGenerator};
use gemini::GeminiClient;
use openai::ChatGptGenerator;
use translate::{is_default_language, translate_or_original, GoogleTranslator, Translator};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TutorError {
    #[error("No API key is configured yet. Send /apikey followed by your key to add one.")]
    MissingCredential,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Generated text ready to be shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    pub heading: String,
    pub body: String,
    pub notice: Option<String>,
}

const TRANSLATION_FAILED: &str = "Translation is unavailable right now, showing the original text.";
const TRANSLATION_NOT_CONFIGURED: &str =
    "Translation needs a Google API key, showing the original text.";

/// Generates text for `request` and translates it into `language`.
///
/// An empty answer yields `Ok(None)` so nothing gets rendered. Translation
/// problems never fail the lesson.
pub async fn deliver(
    generator: &dyn TextGenerator,
    translator: Option<&dyn Translator>,
    request: &GenerationRequest,
    heading: &str,
    language: &str,
) -> Result<Option<Lesson>, GenerationError> {
    let text = match generator.generate(request).await {
        Ok(text) => text,
        Err(GenerationError::EmptyResponse) => {
            info!("Generation returned no text, nothing to show");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let (body, notice) = match translator {
        Some(translator) => {
            let localized = translate_or_original(translator, text, language).await;
            let notice = localized.fallback.map(|_| TRANSLATION_FAILED.to_string());
            (localized.text, notice)
        }
        None if !is_default_language(language) => {
            (text, Some(TRANSLATION_NOT_CONFIGURED.to_string()))
        }
        None => (text, None),
    };

    Ok(Some(Lesson {
        heading: heading.to_string(),
        body,
        notice,
    }))
}

/// Builds backends from the settings and a session's own key.
pub struct Tutor {
    settings: Settings,
    http: reqwest::Client,
}

impl Tutor {
    /// The shared client never waits longer than `request_timeout`, even for
    /// calls that do not set their own deadline.
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self::with_client(settings, http))
    }

    pub fn with_client(settings: Settings, http: reqwest::Client) -> Self {
        Self { settings, http }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A key sent with `/apikey` wins over the environment one.
    fn api_key<'a>(&'a self, session_key: Option<&'a str>) -> Option<&'a str> {
        session_key.or(self.settings.api_key.as_deref())
    }

    pub fn has_credential(&self, session_key: Option<&str>) -> bool {
        self.api_key(session_key).is_some()
    }

    pub fn generator(
        &self,
        session_key: Option<&str>,
    ) -> Result<Box<dyn TextGenerator>, TutorError> {
        let key = self
            .api_key(session_key)
            .ok_or(TutorError::MissingCredential)?;

        let generator: Box<dyn TextGenerator> = match self.settings.provider {
            Provider::Gemini => Box::new(GeminiClient::new(
                self.http.clone(),
                self.settings.gemini_url.clone(),
                self.settings.model.clone(),
                key,
                self.settings.request_timeout,
            )),
            Provider::OpenAi => Box::new(ChatGptGenerator::new(
                key,
                &self.settings.model,
                self.settings.openai_url.clone(),
                self.settings.request_timeout,
            )),
        };
        Ok(generator)
    }

    /// Translation uses a Google key: the session's key when Gemini is the
    /// provider, otherwise `GOOGLE_API_KEY`.
    pub fn translator(&self, session_key: Option<&str>) -> Option<Box<dyn Translator>> {
        let key = match self.settings.provider {
            Provider::Gemini => self.api_key(session_key),
            Provider::OpenAi => self.settings.translation_key.as_deref(),
        }?;

        Some(Box::new(GoogleTranslator::new(
            self.http.clone(),
            self.settings.translate_url.clone(),
            key,
            self.settings.request_timeout,
        )))
    }

    /// Applies the configured safety threshold.
    pub fn prepare(&self, request: GenerationRequest) -> GenerationRequest {
        match self.settings.safety_threshold {
            Some(threshold) => request.with_safety(SafetySetting::uniform(threshold)),
            None => request,
        }
    }

    pub async fn lesson(
        &self,
        session_key: Option<&str>,
        language: &str,
        request: GenerationRequest,
        heading: &str,
    ) -> Result<Option<Lesson>, TutorError> {
        let generator = self.generator(session_key)?;
        let translator = if is_default_language(language) {
            None
        } else {
            self.translator(session_key)
        };
        let request = self.prepare(request);

        Ok(deliver(
            generator.as_ref(),
            translator.as_deref(),
            &request,
            heading,
            language,
        )
        .await?)
    }
}
