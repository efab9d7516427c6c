use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use ctvp_core::api::{HttpOracleConfig, Oracle, OracleError};

use super::snippet;

const BODY_SNIPPET_LEN: usize = 200;

/// OpenAI-compatible chat-completions oracle.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpOracle {
    pub fn new(cfg: &HttpOracleConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn map_send_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else if e.is_connect() {
        OracleError::Unavailable(e.to_string())
    } else {
        OracleError::Transport(e.into())
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    fn name(&self) -> &str {
        "http"
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await.map_err(map_send_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::debug!(
                target: "ctvp.oracle",
                status = status.as_u16(),
                body = %snippet(&text, BODY_SNIPPET_LEN),
                "oracle request rejected"
            );
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OracleError::Unauthorized,
                StatusCode::TOO_MANY_REQUESTS => OracleError::RateLimited,
                s if s.is_server_error() => {
                    OracleError::Unavailable(format!("server returned {}", s.as_u16()))
                }
                s => OracleError::HttpStatus {
                    status: s.as_u16(),
                    body_snippet: snippet(&text, BODY_SNIPPET_LEN),
                },
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Decode(e.into()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let cfg = HttpOracleConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..HttpOracleConfig::default()
        };
        let oracle = HttpOracle::new(&cfg).unwrap();
        assert_eq!(oracle.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn request_shape() {
        let body = ChatRequest {
            model: "m",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            max_tokens: 16,
            temperature: 0.0,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["messages"][1]["role"], "user");
        assert_eq!(v["max_tokens"], 16);
    }
}
