//! 智能体：统一的 Agent trait 与各角色实现
//!
//! 每个基于 LLM 的 Agent 走同一套流程：拼 prompt -> LlmGateway::generate_json ->
//! schemas 收窄 -> 按载荷自带的 control 映射为 AgentOutput。
//! `run` 返回 Result，失败由默认的 `execute` 转成 CRITIQUE，错误不会越过 Agent 边界。

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput};
use crate::llm::LlmGateway;
use crate::schemas::{narrow, Control, ControlEnvelope};

pub mod analysis;
pub mod content_creator;
pub mod feedback;
pub mod interaction;
pub mod learning;
pub mod monitoring;
pub mod router;
pub mod simple_chat;
pub mod task_planner;
pub mod validation;

pub use analysis::AnalysisAgent;
pub use content_creator::ContentCreatorAgent;
pub use feedback::FeedbackAgent;
pub use interaction::InteractionAgent;
pub use learning::LearningAgent;
pub use monitoring::MonitoringAgent;
pub use router::RouterAgent;
pub use simple_chat::SimpleChatAgent;
pub use task_planner::TaskPlannerAgent;
pub use validation::ValidationAgent;

#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// 单次执行；LLM / 收窄失败以 Err 返回
    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError>;

    /// 编排器调用的入口：永不失败，错误降级为 `{"type":"CRITIQUE","content":{"error":..}}`
    async fn execute(&self, input: &AgentInput) -> AgentOutput {
        match self.run(input).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(agent = %self.kind(), error = %e, "agent degraded to critique");
                AgentOutput::critique(e)
            }
        }
    }
}

/// `{system}\n\n{payload}` 形式的 prompt
pub(crate) fn build_prompt(system: &str, payload: &Value) -> String {
    format!("{}\n\n{}", system, payload)
}

/// 调 LLM 并按 T 收窄；不满足结构时返回 SchemaValidation(rejection)
pub(crate) async fn ask_llm<T: DeserializeOwned>(
    gateway: &LlmGateway,
    kind: &AgentKind,
    prompt: &str,
    rejection: &str,
) -> Result<(T, Value), AgentError> {
    let json = gateway.generate_json(kind, prompt).await?;
    match narrow::<T>(&json) {
        Some(typed) => Ok((typed, json)),
        None => {
            tracing::debug!(agent = %kind, payload = %json, "payload rejected by schema");
            Err(AgentError::SchemaValidation(rejection.to_string()))
        }
    }
}

/// 把已通过收窄的载荷按其 control 映射为输出
///
/// - TOOL_CALL 需带 tool，AGENT_CALL 需带可识别的 nextAgent，否则退化为 PLAN_STEP
/// - 缺少或无法识别的 control 视为 PLAN_STEP
/// - CRITIQUE 保留载荷，并保证其中有 `error` 字段
pub(crate) fn map_control(kind: &AgentKind, payload: Value) -> AgentOutput {
    let envelope = ControlEnvelope::read(&payload);
    let next_agent = envelope.next_agent.as_deref().map(AgentKind::from);
    match envelope.control {
        Some(Control::FinalAnswer) => AgentOutput::final_answer(payload),
        Some(Control::ToolCall) => match envelope.tool {
            Some(tool) => AgentOutput::tool_call(tool.into())
                .with_summary(format!("{} requested a tool call", kind)),
            None => AgentOutput::plan_step(payload, next_agent),
        },
        Some(Control::AgentCall) => match next_agent {
            Some(next) => AgentOutput::agent_call(next.clone(), payload)
                .with_summary(format!("Pass result to {}", next)),
            None => AgentOutput::plan_step(payload, None),
        },
        Some(Control::Critique) => {
            let mut content = payload;
            if let Value::Object(map) = &mut content {
                if !map.get("error").map(Value::is_string).unwrap_or(false) {
                    map.insert(
                        "error".to_string(),
                        Value::String(format!("{} raised a critique", kind)),
                    );
                }
            }
            AgentOutput::Critique { content, summary: None }
        }
        Some(Control::PlanStep) | Some(Control::Other) | None => {
            AgentOutput::plan_step(payload, next_agent)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::llm::{LlmGateway, MockLlmClient};

    /// 回放给定回复的网关
    pub fn gateway_with<I, S>(replies: I) -> (LlmGateway, Arc<MockLlmClient>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Arc::new(MockLlmClient::with_replies(replies));
        (LlmGateway::new(mock.clone()), mock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputKind;
    use serde_json::json;

    #[test]
    fn test_map_control_variants() {
        let kind = AgentKind::Analysis;
        assert_eq!(
            map_control(&kind, json!({"control": "FINAL_ANSWER"})).kind(),
            OutputKind::FinalAnswer
        );
        assert_eq!(map_control(&kind, json!({})).kind(), OutputKind::PlanStep);
        assert_eq!(
            map_control(&kind, json!({"control": "TOOL_CALL"})).kind(),
            OutputKind::PlanStep
        );

        let call = map_control(&kind, json!({"control": "AGENT_CALL", "nextAgent": "VALIDATION"}));
        assert_eq!(call.next_agent(), Some(&AgentKind::Validation));

        let step = map_control(&kind, json!({"control": "PLAN_STEP", "nextAgent": "LEARNING"}));
        assert_eq!(step.kind(), OutputKind::PlanStep);
        assert_eq!(step.next_agent(), Some(&AgentKind::Learning));
    }

    #[test]
    fn test_map_control_tool_call() {
        let out = map_control(
            &AgentKind::TaskPlanner,
            json!({"control": "TOOL_CALL", "tool": {"name": "todos.add", "args": {"text": "x"}}}),
        );
        match out {
            AgentOutput::ToolCall { content, .. } => assert_eq!(content.name, "todos.add"),
            other => panic!("Expected ToolCall, got {:?}", other),
        }
    }

    #[test]
    fn test_map_control_ignores_malformed_sibling() {
        let out = map_control(&AgentKind::Analysis, json!({"control": "FINAL_ANSWER", "tool": 5}));
        assert_eq!(out.kind(), OutputKind::FinalAnswer);

        let out = map_control(&AgentKind::Analysis, json!({"control": "AGENT_CALL", "nextAgent": 3}));
        assert_eq!(out.kind(), OutputKind::PlanStep);
        assert!(out.next_agent().is_none());
    }

    #[test]
    fn test_map_control_critique_has_error() {
        let out = map_control(&AgentKind::Learning, json!({"control": "CRITIQUE"}));
        assert!(out.is_critique());
        assert_eq!(out.error_message(), Some("LEARNING raised a critique"));

        let kept = map_control(&AgentKind::Learning, json!({"control": "CRITIQUE", "error": "no data"}));
        assert_eq!(kept.error_message(), Some("no data"));
    }

    struct Failing;

    #[async_trait]
    impl Agent for Failing {
        fn kind(&self) -> AgentKind {
            AgentKind::Analysis
        }

        async fn run(&self, _input: &AgentInput) -> Result<AgentOutput, AgentError> {
            Err(AgentError::InvalidLlmResponse("garbage".into()))
        }
    }

    #[tokio::test]
    async fn test_execute_converts_errors() {
        let out = Failing.execute(&AgentInput::new("u", "s", "g")).await;
        assert!(out.is_critique());
        assert_eq!(out.error_message(), Some("LLM did not return valid JSON: garbage"));
    }
}
