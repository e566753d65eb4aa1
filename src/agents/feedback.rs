//! FeedbackAgent：读取本次运行的历史，总结用户满意度

use async_trait::async_trait;
use serde_json::json;

use crate::agents::{ask_llm, build_prompt, map_control, Agent};
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput, AgentTrace};
use crate::llm::LlmGateway;
use crate::schemas::{schema_json, FeedbackSummary};

pub struct FeedbackAgent {
    gateway: LlmGateway,
}

impl FeedbackAgent {
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

/// 每条历史一行：`AGENT: {content}`
pub fn transcript(history: &[AgentTrace]) -> Vec<String> {
    history
        .iter()
        .map(|h| format!("{}: {}", h.agent, h.output.content()))
        .collect()
}

#[async_trait]
impl Agent for FeedbackAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Feedback
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let kind = self.kind();
        let system = format!(
            "You are FeedbackAgent. Summarize how the user feels about the exchange. \
             Return ONLY JSON matching {} plus a \"control\" field.",
            schema_json::<FeedbackSummary>()
        );
        let prompt = build_prompt(&system, &json!({ "transcript": transcript(&input.history) }));
        let (_, payload) =
            ask_llm::<FeedbackSummary>(&self.gateway, &kind, &prompt, "Invalid feedback").await?;
        Ok(map_control(&kind, payload))
    }
}
