//! Gemini REST 客户端
//!
//! `POST {api_url}?key=...`，请求体 `{"contents":[{"parts":[{"text": prompt}]}]}`，
//! 回复取 `candidates[0].content.parts[0].text`。多条消息按顺序拼成一段 prompt。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{LlmClient, LlmError, Message};

pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// 按模型名生成 generateContent 端点
pub fn gemini_endpoint(model: &str) -> String {
    format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
        model
    )
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// 带 HTTP 层超时的客户端（构建失败时退回默认客户端）
    pub fn with_http_timeout(mut self, limit: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(limit)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }
}

/// 从 Gemini 回复中取出首个候选文本
pub fn extract_text(data: &Value) -> Option<&str> {
    data.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured("API key not configured".to_string()));
        }
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

        let response = self
            .http
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Request(format!("timeout: {}", e))
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Request(format!("API error: {}", status.as_u16())));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;
        extract_text(&data)
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text() {
        let data = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"a\":1}" }] } }]
        });
        assert_eq!(extract_text(&data), Some("{\"a\":1}"));
        assert_eq!(extract_text(&json!({"candidates": []})), None);
    }

    #[test]
    fn test_endpoint_contains_model() {
        assert!(gemini_endpoint("gemini-pro").ends_with("models/gemini-pro:generateContent"));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = GeminiClient::new(gemini_endpoint(GEMINI_DEFAULT_MODEL), "");
        let err = client.complete(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }
}
