// OpenAI-compatible chat-completions oracle
//
// One blocking request per prompt, no retries. Failures are returned to the
// labeling driver, which applies the unparsed policy.

use std::time::Duration;

use concord_recon::config::OracleConfig;
use concord_recon::{Oracle, OracleError};
use serde::{Deserialize, Serialize};

const USER_AGENT: &str = concat!("concord/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// OpenAI API types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

pub struct OpenAiOracle {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiOracle {
    pub fn new(config: &OracleConfig, model: &str, api_key: String) -> Result<Self, OracleError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| OracleError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            max_tokens: config.max_tokens,
        })
    }
}

impl Oracle for OpenAiOracle {
    fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| OracleError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(OracleError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| OracleError::Response(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| OracleError::Response("no choices in response".into()))
    }
}

/// `--api-key`, then `OPENAI_API_KEY`, then `CONCORD_OPENAI_KEY`. Blank values are skipped.
pub fn resolve_api_key<F>(flag: Option<String>, env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    flag.into_iter()
        .chain(env("OPENAI_API_KEY"))
        .chain(env("CONCORD_OPENAI_KEY"))
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
}
