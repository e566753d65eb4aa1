//! TaskPlannerAgent：产出 SMART 任务计划，可请求工具或把计划交给下一个 Agent

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{build_prompt, map_control, Agent};
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput};
use crate::llm::LlmGateway;
use crate::schemas::{is_smart_task_plan, schema_json, ControlEnvelope, SmartTaskPlan, ToolSpec};

/// 单个任务建议的最长时长（分钟）
const MAX_DURATION_MINUTES: u32 = 45;

pub struct TaskPlannerAgent {
    gateway: LlmGateway,
    tool_catalog: Option<String>,
}

impl TaskPlannerAgent {
    pub fn new(gateway: LlmGateway) -> Self {
        Self {
            gateway,
            tool_catalog: None,
        }
    }

    /// 附带可调用工具的目录（JSON），拼入 prompt
    pub fn with_tool_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.tool_catalog = Some(catalog.into());
        self
    }

    fn prompt(&self, input: &AgentInput) -> String {
        let mut system = format!(
            "You are TaskPlannerAgent. Return ONLY JSON. Plan schema: {}. \
             Also include \"control\": PLAN_STEP | TOOL_CALL | AGENT_CALL | FINAL_ANSWER, \
             \"tool\": {} when control is TOOL_CALL, and \"nextAgent\": \
             CONTENT_CREATOR | ANALYSIS | VALIDATION when control is AGENT_CALL.",
            schema_json::<SmartTaskPlan>(),
            schema_json::<ToolSpec>()
        );
        if let Some(catalog) = &self.tool_catalog {
            system.push_str("\nTOOLS_CATALOG = ");
            system.push_str(catalog);
        }
        build_prompt(
            &system,
            &json!({
                "goal": input.goal,
                "context": input.context.to_json(),
                "constraints": {
                    "smart": true,
                    "maxDurationMinutes": MAX_DURATION_MINUTES,
                    "avoidRepetition": true,
                },
            }),
        )
    }
}

#[async_trait]
impl Agent for TaskPlannerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::TaskPlanner
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let kind = self.kind();
        let payload = self.gateway.generate_json(&kind, &self.prompt(input)).await?;

        if ControlEnvelope::read(&payload).control.is_none() {
            return Err(AgentError::SchemaValidation("Missing control field".to_string()));
        }
        if !is_smart_task_plan(&payload) {
            return Err(AgentError::SchemaValidation("Plan schema invalid".to_string()));
        }

        let output = map_control(&kind, payload);
        Ok(match output {
            AgentOutput::ToolCall { .. } => output.with_summary("TaskPlanner requested a tool call"),
            AgentOutput::AgentCall { .. } => output.with_summary("Pass plan to next agent"),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::gateway_with;
    use crate::core::OutputKind;

    const PLAN: &str = r#""task":"Write report","why":"due soon","category":"work","durationMinutes":30,"steps":["outline","draft"]"#;

    fn reply(extra: &str) -> String {
        format!("{{{},{}}}", PLAN, extra)
    }

    async fn run_with(reply: String) -> AgentOutput {
        let (gw, _) = gateway_with([reply]);
        TaskPlannerAgent::new(gw)
            .execute(&AgentInput::new("u", "s", "plan my day"))
            .await
    }

    #[tokio::test]
    async fn test_final_answer_keeps_plan() {
        let out = run_with(reply(r#""control":"FINAL_ANSWER""#)).await;
        assert_eq!(out.kind(), OutputKind::FinalAnswer);
        assert_eq!(out.content()["task"], "Write report");
    }

    #[tokio::test]
    async fn test_missing_control() {
        let out = run_with(format!("{{{}}}", PLAN)).await;
        assert_eq!(out.error_message(), Some("Missing control field"));
    }

    #[tokio::test]
    async fn test_invalid_plan_never_passes_through() {
        let out = run_with(r#"{"control":"FINAL_ANSWER","task":"x","durationMinutes":"soon"}"#.into()).await;
        assert_eq!(out.error_message(), Some("Plan schema invalid"));
    }

    #[tokio::test]
    async fn test_tool_call() {
        let out = run_with(reply(
            r#""control":"TOOL_CALL","tool":{"name":"todos.add","args":{"text":"outline"}}"#,
        ))
        .await;
        assert_eq!(out.kind(), OutputKind::ToolCall);
        assert_eq!(out.summary(), Some("TaskPlanner requested a tool call"));
        assert_eq!(out.content()["name"], "todos.add");
    }

    #[tokio::test]
    async fn test_agent_call() {
        let out = run_with(reply(r#""control":"AGENT_CALL","nextAgent":"VALIDATION""#)).await;
        assert_eq!(out.next_agent(), Some(&AgentKind::Validation));
        assert_eq!(out.summary(), Some("Pass plan to next agent"));
    }

    #[tokio::test]
    async fn test_plan_step_without_target() {
        let out = run_with(reply(r#""control":"PLAN_STEP""#)).await;
        assert_eq!(out.kind(), OutputKind::PlanStep);
        assert!(out.next_agent().is_none());
    }
}
