//! ValidationAgent：检查已累积的产出；结果总是终态

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{ask_llm, build_prompt, Agent};
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput};
use crate::llm::LlmGateway;
use crate::schemas::{schema_json, ValidationResult};

pub struct ValidationAgent {
    gateway: LlmGateway,
}

impl ValidationAgent {
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Agent for ValidationAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Validation
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let kind = self.kind();
        let system = format!(
            "You are ValidationAgent. Check the data for consistency and feasibility. \
             Return ONLY JSON matching {}.",
            schema_json::<ValidationResult>()
        );
        let prompt = build_prompt(&system, &json!({ "data": input.context.to_json() }));
        let (result, payload) = ask_llm::<ValidationResult>(
            &self.gateway,
            &kind,
            &prompt,
            "Invalid validation result",
        )
        .await?;
        let summary = if result.ok {
            "Validation passed".to_string()
        } else {
            format!(
                "Validation found {} issue(s)",
                result.issues.as_ref().map(Vec::len).unwrap_or(0)
            )
        };
        Ok(AgentOutput::final_answer(payload).with_summary(summary))
    }
}
