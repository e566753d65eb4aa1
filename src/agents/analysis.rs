//! AnalysisAgent：从累积的上下文中总结洞察、趋势与异常

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{ask_llm, build_prompt, map_control, Agent};
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput};
use crate::llm::LlmGateway;
use crate::schemas::{schema_json, AnalysisOutput};

pub struct AnalysisAgent {
    gateway: LlmGateway,
}

impl AnalysisAgent {
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Agent for AnalysisAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Analysis
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let kind = self.kind();
        let system = format!(
            "You are AnalysisAgent. Analyze the user's activity. Return ONLY JSON matching {} \
             plus a \"control\" field (PLAN_STEP | FINAL_ANSWER | AGENT_CALL with \"nextAgent\").",
            schema_json::<AnalysisOutput>()
        );
        let prompt = build_prompt(
            &system,
            &json!({ "goal": input.goal, "context": input.context.to_json() }),
        );
        let (_, payload) =
            ask_llm::<AnalysisOutput>(&self.gateway, &kind, &prompt, "Invalid analysis").await?;
        Ok(map_control(&kind, payload))
    }
}
