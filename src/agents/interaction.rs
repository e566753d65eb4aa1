//! InteractionAgent：为下一轮对话准备提问、人设与追问

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{ask_llm, build_prompt, map_control, Agent};
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput};
use crate::llm::LlmGateway;
use crate::schemas::{schema_json, InteractionPlan};

pub struct InteractionAgent {
    gateway: LlmGateway,
}

impl InteractionAgent {
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Agent for InteractionAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Interaction
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let kind = self.kind();
        let system = format!(
            "You are InteractionAgent. Prepare dialogue with context. \
             Return ONLY JSON matching {} plus a \"control\" field (PLAN_STEP | FINAL_ANSWER | CRITIQUE).",
            schema_json::<InteractionPlan>()
        );
        let prompt = build_prompt(
            &system,
            &json!({ "topic": input.goal, "context": input.context.to_json() }),
        );
        let (_, payload) =
            ask_llm::<InteractionPlan>(&self.gateway, &kind, &prompt, "Invalid interaction plan")
                .await?;
        Ok(map_control(&kind, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::gateway_with;
    use crate::core::OutputKind;

    #[tokio::test]
    async fn test_plan_step_by_default() {
        let (gw, _) = gateway_with([r#"{"prompt":"How did today go?","followUps":["Any blockers?"]}"#]);
        let out = InteractionAgent::new(gw).execute(&AgentInput::new("u", "s", "g")).await;
        assert_eq!(out.kind(), OutputKind::PlanStep);
    }

    #[tokio::test]
    async fn test_critique_control_passes_through() {
        let (gw, _) = gateway_with([r#"{"control":"CRITIQUE","prompt":"","error":"off-topic"}"#]);
        let out = InteractionAgent::new(gw).execute(&AgentInput::new("u", "s", "g")).await;
        assert_eq!(out.error_message(), Some("off-topic"));
    }
}
