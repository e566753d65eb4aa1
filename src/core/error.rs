//! 编排层错误类型
//!
//! 所有错误在 Agent / Orchestrator 边界处被转为 `AgentOutput::Critique`（数据而非异常），
//! 因此这里的变体主要服务于内部 `?` 传播与日志。

use thiserror::Error;

/// 编排、Agent、工具、存储过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// 主备两个 LLM 后端均未返回可解析的 JSON 对象
    #[error("LLM did not return valid JSON: {0}")]
    InvalidLlmResponse(String),

    /// JSON 未通过 Agent 的 schema 校验
    #[error("{0}")]
    SchemaValidation(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool failed: {0}")]
    ToolExecutionFailed(String),

    /// 挂起点（LLM / Agent / 工具）超出配置的时限
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 路由或工具循环达到上限仍未得到终止输出
    #[error("Max {what} exceeded ({limit})")]
    GuardExhausted { what: &'static str, limit: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::Storage(e.to_string())
    }
}
