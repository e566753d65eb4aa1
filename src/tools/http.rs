//! http.get / http.post：通用 HTTP 请求
//!
//! 响应 content-type 为 JSON 时返回解析后的值，否则返回文本；非 2xx 视为失败。

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolContext};

#[derive(Debug, Deserialize, JsonSchema)]
struct GetArgs {
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PostArgs {
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// 任意 JSON 请求体
    #[serde(default)]
    body: Option<Value>,
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

fn check_url(url: &str) -> Result<(), String> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("Invalid URL: {}", url))
    }
}

fn with_headers(mut req: RequestBuilder, headers: &BTreeMap<String, String>) -> RequestBuilder {
    for (k, v) in headers {
        req = req.header(k.as_str(), v.as_str());
    }
    req
}

async fn send(req: RequestBuilder) -> Result<Value, String> {
    let resp = req.send().await.map_err(|e| format!("Request failed: {}", e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status));
    }
    let is_json = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);
    let text = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
    if is_json {
        serde_json::from_str(&text).map_err(|e| format!("Invalid JSON body: {}", e))
    } else {
        Ok(Value::String(text))
    }
}

pub struct HttpGetTool {
    client: Client,
}

impl HttpGetTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
        }
    }
}

#[async_trait]
impl Tool for HttpGetTool {
    fn name(&self) -> &str {
        "http.get"
    }

    fn description(&self) -> &str {
        "HTTP GET a URL. Returns JSON when the response is JSON, text otherwise."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<GetArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: GetArgs = parse_args(args)?;
        check_url(&args.url)?;
        tracing::debug!(url = %args.url, "http.get");
        send(with_headers(self.client.get(args.url.trim()), &args.headers)).await
    }
}

pub struct HttpPostTool {
    client: Client,
}

impl HttpPostTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: build_client(timeout_secs),
        }
    }
}

#[async_trait]
impl Tool for HttpPostTool {
    fn name(&self) -> &str {
        "http.post"
    }

    fn description(&self) -> &str {
        "HTTP POST a JSON body to a URL. Returns JSON when the response is JSON, text otherwise."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<PostArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        let args: PostArgs = parse_args(args)?;
        check_url(&args.url)?;
        tracing::debug!(url = %args.url, "http.post");
        let mut req = with_headers(self.client.post(args.url.trim()), &args.headers);
        if let Some(body) = &args.body {
            req = req.json(body);
        }
        send(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_url() {
        assert!(check_url("https://example.com/x").is_ok());
        assert!(check_url(" http://localhost:8080 ").is_ok());
        assert!(check_url("file:///etc/passwd").is_err());
        assert!(check_url("example.com").is_err());
    }

    #[tokio::test]
    async fn test_rejects_bad_args_without_network() {
        let ctx = ToolContext::default();
        let get = HttpGetTool::new(1);
        assert!(get.execute(json!({}), &ctx).await.unwrap_err().starts_with("Invalid args"));
        assert!(get
            .execute(json!({"url": "ftp://x"}), &ctx)
            .await
            .unwrap_err()
            .starts_with("Invalid URL"));

        let post = HttpPostTool::new(1);
        assert!(post
            .execute(json!({"url": "nope", "body": {"a": 1}}), &ctx)
            .await
            .is_err());
    }

    #[test]
    fn test_schema_lists_url() {
        let schema = HttpPostTool::new(1).parameters_schema();
        assert!(schema["properties"].get("url").is_some());
        assert!(schema["properties"].get("body").is_some());
    }
}
