//! LearningAgent：从上下文增量中提炼偏好、技能与笔记

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{ask_llm, build_prompt, map_control, Agent};
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput};
use crate::llm::LlmGateway;
use crate::schemas::{schema_json, LearningUpdate};

pub struct LearningAgent {
    gateway: LlmGateway,
}

impl LearningAgent {
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Agent for LearningAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Learning
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let kind = self.kind();
        let system = format!(
            "You are LearningAgent. Extract what we learned about the user. \
             Return ONLY JSON matching {} plus a \"control\" field.",
            schema_json::<LearningUpdate>()
        );
        let prompt = build_prompt(
            &system,
            &json!({ "goal": input.goal, "deltas": input.context.to_json() }),
        );
        let (_, payload) =
            ask_llm::<LearningUpdate>(&self.gateway, &kind, &prompt, "Invalid learning update")
                .await?;
        Ok(map_control(&kind, payload))
    }
}
