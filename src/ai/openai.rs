//! OpenAI-compatible chat completions (OpenAI, or any server speaking the
//! same protocol via `ai.base_url`)

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{build_prompt, decode_envelope, read_body, send_error};
use crate::error::AiError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout_secs: u64,
    pub(crate) prompt: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChatMessage>,
}

impl OpenAiClient {
    pub fn new(
        http: Client,
        api_key: String,
        model: String,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http,
            api_key,
            model,
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs,
            prompt: None,
        }
    }

    pub async fn complete(&self, text: &str) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(build_prompt(self.prompt.as_deref(), text)),
            }],
            temperature: 0.2,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let body = read_body(response, self.timeout_secs).await?;
        let envelope: ChatResponse = decode_envelope(&body)?;

        match envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
        {
            Some(reply) if !reply.trim().is_empty() => Ok(reply),
            _ => Err(AiError::InvalidResponse { status: 200, body }),
        }
    }
}
