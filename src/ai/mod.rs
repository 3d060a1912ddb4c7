//! AI Extraction Gateway
//!
//! Sends free text (documentation, a cheat sheet, a menu dump) to a language
//! model and turns the reply into shortcut candidates.
//!
//! One attempt per call, no retries. Failures are classified into
//! [`AiError`] so callers can decide whether to ask for a key, retry, or
//! show the raw reply.

pub mod gemini;
pub mod openai;
pub mod parse;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{AiProvider, AiSettings};
use crate::error::AiError;
use crate::models::Shortcut;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use parse::{extract_json_array, parse_candidates, parse_shortcut_lines};

/// Built-in extraction prompt; `{text}` is replaced by the input
pub const DEFAULT_PROMPT: &str = "\
You extract keyboard shortcuts from documentation.
Return ONLY a JSON array. Each element is an object with the fields
\"title\" (what the shortcut does), \"keys\" (the key combination using the
symbols ⌃ ⌥ ⇧ ⌘ followed by the key, e.g. \"⇧⌘N\"), and optionally
\"description\" and \"category\". Return [] when there are none.

Text:
{text}";

/// An extracted shortcut that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub keys: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Candidate {
    pub fn into_shortcut(self, app_id: Uuid) -> Shortcut {
        let mut shortcut = Shortcut::new(app_id, self.title, &self.keys);
        shortcut.description = self.description;
        shortcut.category = self.category;
        shortcut
    }
}

/// Fill the prompt template. A template without `{text}` gets the input
/// appended.
pub fn build_prompt(template: Option<&str>, text: &str) -> String {
    let template = template
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_PROMPT);
    if template.contains("{text}") {
        template.replace("{text}", text)
    } else {
        format!("{}\n\n{}", template, text)
    }
}

/// Provider-specific client selected from settings
pub enum ExtractionGateway {
    Gemini(GeminiClient),
    OpenAi(OpenAiClient),
}

impl ExtractionGateway {
    /// Build the configured provider's client. Fails with
    /// [`AiError::MissingCredential`] when no API key is available.
    pub fn from_settings(settings: &AiSettings) -> Result<Self, AiError> {
        let provider = settings.provider;
        let api_key = settings
            .api_key(provider)
            .ok_or_else(|| AiError::MissingCredential {
                provider: provider.to_string(),
            })?;
        let http = http_client(settings.timeout_secs)?;
        let model = settings.effective_model().to_string();
        let base_url = settings.base_url_for(provider).map(str::to_string);

        Ok(match provider {
            AiProvider::Gemini => ExtractionGateway::Gemini(GeminiClient::new(
                http,
                api_key,
                model,
                base_url,
                settings.timeout_secs,
            )),
            AiProvider::OpenAi => ExtractionGateway::OpenAi(OpenAiClient::new(
                http,
                api_key,
                model,
                base_url,
                settings.timeout_secs,
            )),
        }
        .with_prompt(settings.prompt_override.clone()))
    }

    fn with_prompt(mut self, prompt: Option<String>) -> Self {
        match &mut self {
            ExtractionGateway::Gemini(c) => c.prompt = prompt,
            ExtractionGateway::OpenAi(c) => c.prompt = prompt,
        }
        self
    }

    pub fn provider(&self) -> AiProvider {
        match self {
            ExtractionGateway::Gemini(_) => AiProvider::Gemini,
            ExtractionGateway::OpenAi(_) => AiProvider::OpenAi,
        }
    }

    /// Extract shortcut candidates from `text`
    pub async fn extract_shortcuts(&self, text: &str) -> Result<Vec<Candidate>, AiError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        log::info!("Extracting shortcuts via {} ({} chars)", self.provider(), text.len());
        let reply = match self {
            ExtractionGateway::Gemini(c) => c.complete(text).await?,
            ExtractionGateway::OpenAi(c) => c.complete(text).await?,
        };
        log::debug!("Provider reply: {}", reply);

        let candidates = parse_candidates(&reply)?;
        log::info!("Extracted {} candidate(s)", candidates.len());
        Ok(candidates)
    }
}

fn http_client(timeout_secs: u64) -> Result<Client, AiError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AiError::Network(e.to_string()))
}

pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> AiError {
    if e.is_timeout() {
        AiError::Timeout(timeout_secs)
    } else {
        AiError::Network(e.to_string())
    }
}

/// Read a response body, classifying non-success statuses
pub(crate) async fn read_body(response: Response, timeout_secs: u64) -> Result<String, AiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| send_error(e, timeout_secs))?;

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AiError::RateLimited(body));
    }
    if !status.is_success() {
        return Err(AiError::InvalidResponse {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Deserialize a provider envelope, keeping the body on failure
pub(crate) fn decode_envelope<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, AiError> {
    serde_json::from_str(body).map_err(|_| AiError::InvalidResponse {
        status: 200,
        body: body.to_string(),
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_placeholder() {
        let prompt = build_prompt(None, "⌘N New");
        assert!(prompt.ends_with("Text:\n⌘N New"));
        assert!(!prompt.contains("{text}"));

        assert_eq!(build_prompt(Some("List: {text}!"), "abc"), "List: abc!");
        assert_eq!(build_prompt(Some("Extract."), "abc"), "Extract.\n\nabc");
        assert_eq!(build_prompt(Some("  "), "x"), build_prompt(None, "x"));
    }

    #[test]
    fn test_missing_credential() {
        let settings = AiSettings {
            provider: AiProvider::OpenAi,
            openai_api_key: Some("   ".into()),
            ..Default::default()
        };
        // Only meaningful when the environment does not provide a key
        if std::env::var("OPENAI_API_KEY").is_err() {
            let err = ExtractionGateway::from_settings(&settings).err().unwrap();
            assert!(err.needs_credential());
        }
    }

    #[test]
    fn test_gateway_selects_provider() {
        let settings = AiSettings {
            provider: AiProvider::Gemini,
            gemini_api_key: Some("k".into()),
            prompt_override: Some("P {text}".into()),
            ..Default::default()
        };
        let gateway = ExtractionGateway::from_settings(&settings).unwrap();
        assert_eq!(gateway.provider(), AiProvider::Gemini);
        match gateway {
            ExtractionGateway::Gemini(c) => assert_eq!(c.prompt.as_deref(), Some("P {text}")),
            ExtractionGateway::OpenAi(_) => panic!("wrong provider"),
        }
    }

    #[test]
    fn test_gemini_ignores_openai_base_url() {
        let settings = AiSettings {
            provider: AiProvider::Gemini,
            gemini_api_key: Some("k".into()),
            base_url: Some("http://localhost:11434/v1".into()),
            ..Default::default()
        };
        match ExtractionGateway::from_settings(&settings).unwrap() {
            ExtractionGateway::Gemini(c) => assert!(c
                .endpoint()
                .starts_with("https://generativelanguage.googleapis.com/v1beta/models/")),
            ExtractionGateway::OpenAi(_) => panic!("wrong provider"),
        }
    }

    #[tokio::test]
    async fn test_empty_text_skips_request() {
        let settings = AiSettings {
            provider: AiProvider::OpenAi,
            openai_api_key: Some("k".into()),
            base_url: Some("http://127.0.0.1:9".into()),
            ..Default::default()
        };
        let gateway = ExtractionGateway::from_settings(&settings).unwrap();
        assert!(gateway.extract_shortcuts("  \n").await.unwrap().is_empty());
    }

    #[test]
    fn test_candidate_into_shortcut() {
        let app_id = Uuid::new_v4();
        let shortcut = Candidate {
            title: "Quit".into(),
            keys: "Cmd+Q".into(),
            description: None,
            category: Some("App".into()),
        }
        .into_shortcut(app_id);
        assert_eq!(shortcut.app_id, app_id);
        assert_eq!(shortcut.keys, "⌘Q");
        assert_eq!(shortcut.category.as_deref(), Some("App"));
    }
}
