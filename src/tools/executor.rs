//! 工具执行器
//!
//! 持有 ToolRegistry 与可选超时，execute(name, args, ctx) 查找工具并在时限内调用，
//! 未注册 / 失败 / 超时分别转为 AgentError（UnknownTool / ToolExecutionFailed / Timeout）；
//! 每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{Tool, ToolContext, ToolRegistry};

/// 工具执行器：注册表只读共享，超时未配置时不设上限
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: Option<u64>) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// 执行指定工具并输出审计日志
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<Value, AgentError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| AgentError::UnknownTool(tool_name.to_string()))?;

        let start = Instant::now();
        let preview = args_preview(&args);
        let call = tool.execute(args, ctx);
        let result = match self.timeout {
            Some(limit) => match timeout(limit, call).await {
                Ok(r) => r.map_err(AgentError::ToolExecutionFailed),
                Err(_) => Err(AgentError::Timeout(format!(
                    "tool {} after {}ms",
                    tool_name,
                    limit.as_millis()
                ))),
            },
            None => call.await.map_err(AgentError::ToolExecutionFailed),
        };

        let (ok, outcome) = match &result {
            Ok(_) => (true, "ok"),
            Err(AgentError::Timeout(_)) => (false, "timeout"),
            Err(_) => (false, "error"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "user_id": ctx.user_id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");

        result
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn catalog_json(&self) -> String {
        self.registry.to_schema_json()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
