//! RouterAgent：判断意图并选出下一个 Agent
//!
//! 成功时总是输出 AGENT_CALL（nextAgent = routeTo），从不直接给出 FINAL_ANSWER。

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{ask_llm, build_prompt, Agent};
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput};
use crate::llm::LlmGateway;
use crate::schemas::{schema_json, RouterDecision};

/// 可被路由到的角色
pub const ROUTABLE_AGENTS: [AgentKind; 4] = [
    AgentKind::TaskPlanner,
    AgentKind::ContentCreator,
    AgentKind::Analysis,
    AgentKind::Learning,
];

pub struct RouterAgent {
    gateway: LlmGateway,
}

impl RouterAgent {
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }

    fn prompt(&self, input: &AgentInput) -> String {
        let system = format!(
            "You are RouterAgent. Decide the user's intent and which agent should handle it. \
             Return ONLY JSON matching this schema: {}",
            schema_json::<RouterDecision>()
        );
        let agents: Vec<&str> = ROUTABLE_AGENTS.iter().map(AgentKind::as_str).collect();
        build_prompt(
            &system,
            &json!({
                "goal": input.goal,
                "context": input.context.to_json(),
                "agents": agents,
            }),
        )
    }
}

#[async_trait]
impl Agent for RouterAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Router
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let (decision, payload) = ask_llm::<RouterDecision>(
            &self.gateway,
            &self.kind(),
            &self.prompt(input),
            "Invalid router decision",
        )
        .await?;

        let summary = format!(
            "Route to {} (intent: {}, conf: {})",
            decision.route_to, decision.intent, decision.confidence
        );
        tracing::debug!(route_to = %decision.route_to, intent = %decision.intent, "routed");
        Ok(AgentOutput::agent_call(AgentKind::from(decision.route_to.as_str()), payload)
            .with_summary(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::gateway_with;

    #[tokio::test]
    async fn test_routes_to_decision_target() {
        let (gw, mock) = gateway_with([
            r#"{"intent":"TASK_PLANNING","routeTo":"TASK_PLANNER","confidence":0.8,"rationale":"plan"}"#,
        ]);
        let out = RouterAgent::new(gw).execute(&AgentInput::new("u", "s", "plan my day")).await;
        assert_eq!(out.next_agent(), Some(&AgentKind::TaskPlanner));
        assert_eq!(
            out.summary(),
            Some("Route to TASK_PLANNER (intent: TASK_PLANNING, conf: 0.8)")
        );
        assert!(mock.prompts()[0].contains("plan my day"));
    }

    #[tokio::test]
    async fn test_unknown_target_is_kept_verbatim() {
        let (gw, _) = gateway_with([
            r#"{"intent":"UNKNOWN","routeTo":"UNKNOWN_AGENT","confidence":0.1,"rationale":"?"}"#,
        ]);
        let out = RouterAgent::new(gw).execute(&AgentInput::new("u", "s", "g")).await;
        assert_eq!(out.next_agent(), Some(&AgentKind::Unknown("UNKNOWN_AGENT".into())));
    }

    #[tokio::test]
    async fn test_invalid_decision_is_critique() {
        let (gw, _) = gateway_with([r#"{"routeTo":"TASK_PLANNER"}"#]);
        let out = RouterAgent::new(gw).execute(&AgentInput::new("u", "s", "g")).await;
        assert_eq!(out.error_message(), Some("Invalid router decision"));
    }
}
