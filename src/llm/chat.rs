//! OpenAI-compatible chat-completions backend.
//!
//! Used for both the paid API and free aggregators that expose the same
//! `/chat/completions` shape.

use std::io;
use std::time::Duration;

use log::debug;

use super::{LlmClient, LlmError};

pub struct ChatCompletionsClient {
    base_url: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ChatCompletionsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, prompt: &str, model: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

impl LlmClient for ChatCompletionsClient {
    fn complete(&self, prompt: &str, timeout: Duration, model: &str) -> Result<String, LlmError> {
        let url = self.endpoint();
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        let body = self.request_body(prompt, model);

        debug!("POST {} (model {})", url, model);

        let mut request = agent.post(&url).set("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }

        let response = request
            .send_json(body)
            .map_err(|e| classify_error(e, timeout))?;

        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| LlmError::Provider(format!("Malformed response JSON: {}", e)))?;

        parse_chat_response(&json)
    }
}

/// Extract the first choice's message content from a chat-completions body.
pub(crate) fn parse_chat_response(json: &serde_json::Value) -> Result<String, LlmError> {
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LlmError::Provider("Response has no message content".to_string()))?;

    if content.trim().is_empty() {
        return Err(LlmError::Provider("Empty completion".to_string()));
    }

    Ok(content.trim().to_string())
}

fn classify_error(err: ureq::Error, timeout: Duration) -> LlmError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            LlmError::Provider(format!(
                "HTTP {}: {}",
                code,
                body.chars().take(200).collect::<String>()
            ))
        }
        ureq::Error::Transport(transport) => {
            if is_timeout(&transport) {
                LlmError::Timeout(timeout)
            } else if matches!(
                transport.kind(),
                ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed
            ) {
                LlmError::Unavailable(transport.to_string())
            } else {
                LlmError::Provider(transport.to_string())
            }
        }
    }
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    let io_timeout = std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .map(|e| matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock))
        .unwrap_or(false);
    io_timeout || transport.to_string().contains("timed out")
}
