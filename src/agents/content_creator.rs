//! ContentCreatorAgent：围绕目标生成面向开发者的笔记

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{ask_llm, build_prompt, map_control, Agent};
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput};
use crate::llm::LlmGateway;
use crate::schemas::{schema_json, ContentOutput};

pub struct ContentCreatorAgent {
    gateway: LlmGateway,
    audience: String,
}

impl ContentCreatorAgent {
    pub fn new(gateway: LlmGateway) -> Self {
        Self {
            gateway,
            audience: "developer".to_string(),
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    fn prompt(&self, input: &AgentInput) -> String {
        let system = format!(
            "You are ContentCreatorAgent. Write concise notes for the given spec. \
             Return ONLY JSON matching {} plus a \"control\" field (PLAN_STEP | FINAL_ANSWER).",
            schema_json::<ContentOutput>()
        );
        build_prompt(
            &system,
            &json!({
                "spec": {
                    "topic": input.goal,
                    "audience": self.audience,
                    "format": "notes",
                },
                "plan": input.context.plan,
            }),
        )
    }
}

#[async_trait]
impl Agent for ContentCreatorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::ContentCreator
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let kind = self.kind();
        let (_, payload) =
            ask_llm::<ContentOutput>(&self.gateway, &kind, &self.prompt(input), "Invalid content")
                .await?;
        Ok(map_control(&kind, payload))
    }
}
