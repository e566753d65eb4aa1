//! LLM 网关：generate_json(agent, prompt) -> JSON 对象
//!
//! 流程：主后端取原始文本 -> 去空白与 ```json 围栏 -> 解析并要求为非空对象；
//! 任一步失败则对备用后端完整重做一遍；两者都失败时返回 InvalidLlmResponse。
//! 每个后端只尝试一次，无退避；网关本身从不编造兜底值。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use crate::core::{AgentError, AgentKind};
use crate::llm::{LlmClient, LlmError, Message};

/// 单个后端一次尝试的失败原因
#[derive(Debug)]
enum AttemptError {
    Backend(LlmError),
    Parse(String),
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Backend(e) => write!(f, "{}", e),
            AttemptError::Parse(e) => write!(f, "{}", e),
        }
    }
}

/// 去掉首尾空白与所有 ```json / ``` 围栏
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// 清洗并解析为 JSON 对象；数组、字符串、null 等均视为失败
pub fn parse_json_object(raw: &str) -> Result<Value, String> {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(v @ Value::Object(_)) => Ok(v),
        Ok(_) => Err("LLM response is not a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

#[derive(Clone)]
pub struct LlmGateway {
    primary: Arc<dyn LlmClient>,
    secondary: Option<Arc<dyn LlmClient>>,
    timeout: Option<Duration>,
}

impl LlmGateway {
    pub fn new(primary: Arc<dyn LlmClient>) -> Self {
        Self {
            primary,
            secondary: None,
            timeout: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn LlmClient>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// 每次后端调用的时限
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub async fn generate_json(&self, agent: &AgentKind, prompt: &str) -> Result<Value, AgentError> {
        let messages = [Message::user(prompt)];

        let primary_err = match self.attempt(self.primary.as_ref(), &messages).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        tracing::debug!(
            agent = %agent,
            backend = self.primary.name(),
            error = %primary_err,
            "primary LLM attempt failed"
        );

        let Some(secondary) = &self.secondary else {
            return Err(into_agent_error(primary_err, None));
        };

        match self.attempt(secondary.as_ref(), &messages).await {
            Ok(v) => {
                tracing::info!(agent = %agent, backend = secondary.name(), "secondary LLM recovered");
                Ok(v)
            }
            Err(secondary_err) => {
                tracing::warn!(
                    agent = %agent,
                    primary = %primary_err,
                    secondary = %secondary_err,
                    "both LLM backends failed"
                );
                Err(into_agent_error(secondary_err, Some(primary_err)))
            }
        }
    }

    async fn attempt(&self, client: &dyn LlmClient, messages: &[Message]) -> Result<Value, AttemptError> {
        let raw = match self.timeout {
            Some(limit) => timeout(limit, client.complete(messages))
                .await
                .map_err(|_| AttemptError::Backend(LlmError::Timeout(limit.as_millis() as u64)))?,
            None => client.complete(messages).await,
        }
        .map_err(AttemptError::Backend)?;
        parse_json_object(&raw).map_err(AttemptError::Parse)
    }
}

/// 最后一次失败为超时时报 Timeout，其余一律 InvalidLlmResponse
fn into_agent_error(last: AttemptError, earlier: Option<AttemptError>) -> AgentError {
    let detail = match &earlier {
        Some(first) => format!("primary: {}; secondary: {}", first, last),
        None => last.to_string(),
    };
    match last {
        AttemptError::Backend(LlmError::Timeout(_)) => AgentError::Timeout(format!("LLM {}", detail)),
        _ => AgentError::InvalidLlmResponse(detail),
    }
}
