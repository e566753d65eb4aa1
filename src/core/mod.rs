//! 核心编排层：输出协议、错误、工具拦截、路由主循环、简单对话循环

pub mod error;
pub mod interceptor;
pub mod orchestrator;
pub mod protocol;
pub mod simple_chat;

pub use error::AgentError;
pub use interceptor::{invoke_agent, Dispatch, ToolInterceptor};
pub use orchestrator::{AgentTable, Orchestrator};
pub use protocol::{
    now_ms, AgentContext, AgentInput, AgentKind, AgentOutput, AgentTrace, ChatMessage, ChatRole,
    OutputKind, ToolCallTrace, ToolRequest, ToolResult,
};
pub use simple_chat::SimpleChatOrchestrator;
