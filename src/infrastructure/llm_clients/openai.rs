use super::LLMClient;
use crate::domain::error::{AppError, RemoteErrorKind, Result};
use crate::domain::llm_config::{ChatMessage, LLMConfig, LLMProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (OpenAI, OpenRouter, local servers).
pub struct OpenAIClient {
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    fn completions_url(base_url: &str) -> String {
        if base_url.ends_with('/') {
            format!("{}chat/completions", base_url)
        } else {
            format!("{}/chat/completions", base_url)
        }
    }
}

impl Default for OpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn parse_completion(body: &str) -> Result<String> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        AppError::remote(
            RemoteErrorKind::MalformedResponse,
            None,
            format!("Failed to parse JSON: {}", e),
        )
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            AppError::remote(
                RemoteErrorKind::MalformedResponse,
                None,
                "Invalid response format: missing choices[0].message.content",
            )
        })
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, config: &LLMConfig, messages: &[ChatMessage]) -> Result<String> {
        let url = Self::completions_url(&config.base_url);
        let body = CompletionRequest {
            model: &config.model,
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        let mut request = self.client.post(&url).json(&body);
        match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => request = request.bearer_auth(key),
            _ if config.provider != LLMProvider::Local => {
                return Err(AppError::remote(
                    RemoteErrorKind::Auth,
                    None,
                    format!("Missing API key for {:?}", config.provider),
                ));
            }
            _ => {}
        }
        if config.provider == LLMProvider::OpenRouter {
            request = request.header("X-Title", "pagewise");
        }

        debug!(url = %url, model = %config.model, messages = messages.len(), "Sending completion request");

        let response = request.send().await.map_err(|e| {
            AppError::remote(
                RemoteErrorKind::Network,
                None,
                format!("Request failed: {}", e),
            )
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AppError::remote(
                RemoteErrorKind::Network,
                Some(status.as_u16()),
                format!("Failed to read response: {}", e),
            )
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Completion endpoint returned an error");
            return Err(AppError::remote(
                RemoteErrorKind::from_status(status.as_u16()),
                Some(status.as_u16()),
                format!("API error ({}): {}", status, text),
            ));
        }

        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP response on a random local port.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if received.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/v1", addr)
    }

    fn config(base_url: String) -> LLMConfig {
        LLMConfig {
            provider: LLMProvider::OpenAI,
            base_url,
            model: "gpt-test".to_string(),
            api_key: Some("sk-test".to_string()),
            max_tokens: Some(64),
            temperature: Some(0.2),
        }
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            OpenAIClient::completions_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            OpenAIClient::completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Hello");

        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert_eq!(err.remote_kind(), RemoteErrorKind::MalformedResponse);

        let err = parse_completion("<html>").unwrap_err();
        assert_eq!(err.remote_kind(), RemoteErrorKind::MalformedResponse);
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = CompletionRequest {
            model: "m",
            messages: &messages,
            temperature: Some(0.5),
            max_tokens: Some(10),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 10);
    }

    #[tokio::test]
    async fn test_rate_limit_status_is_classified() {
        let base = one_shot_server("429 Too Many Requests", r#"{"error":"slow down"}"#).await;
        let client = OpenAIClient::new();
        let err = client
            .complete(&config(base), &[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind(), RemoteErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let base = one_shot_server(
            "200 OK",
            r#"{"choices":[{"message":{"content":"Answer from model"}}]}"#,
        )
        .await;
        let client = OpenAIClient::new();
        let answer = client
            .complete(&config(base), &[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(answer, "Answer from model");
    }

    #[tokio::test]
    async fn test_missing_key_for_hosted_provider() {
        let client = OpenAIClient::new();
        let mut cfg = config("http://127.0.0.1:9/v1".to_string());
        cfg.api_key = None;
        let err = client
            .complete(&cfg, &[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind(), RemoteErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OpenAIClient::new();
        let err = client
            .complete(&config(format!("http://{}/v1", addr)), &[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind(), RemoteErrorKind::Network);
    }
}
