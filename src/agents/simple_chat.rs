//! SimpleChatAgent：对话式决策，先决定是否调用工具，再给出回复
//!
//! 决策三选一：TOOL_CALL（一次一个工具）/ FINAL_ANSWER / CRITIQUE。
//! CRITIQUE（违背基本原则等）会被改写成友好的 FINAL_ANSWER，原始错误保留在 `errorRaw`。

use async_trait::async_trait;
use serde_json::json;

use crate::agents::Agent;
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput, ChatMessage, ChatRole, ToolRequest};
use crate::llm::LlmGateway;
use crate::schemas::{narrow, ChatDecision};

/// 对话中允许请求的工具
pub const CHAT_TOOLS: [&str; 2] = ["profile.saveInsights", "todos.add"];

const DEFAULT_CATALOG: &str = r#"[
  {"name":"profile.saveInsights","args":{"name?":"string","profession?":"string","mood?":"string","workStyle?":"string","preferences?":"object","skills?":"string[]","insights?":"string[]"}},
  {"name":"todos.add","args":{"text":"string","threadId":"string"}}
]"#;

const REFUSAL: &str = "I cannot help with that request. It conflicts with the app's base principles.";

pub struct SimpleChatAgent {
    gateway: LlmGateway,
    base_truths: Vec<String>,
    tool_catalog: String,
}

impl SimpleChatAgent {
    pub fn new(gateway: LlmGateway, base_truths: Vec<String>) -> Self {
        Self {
            gateway,
            base_truths,
            tool_catalog: DEFAULT_CATALOG.to_string(),
        }
    }

    pub fn with_tool_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.tool_catalog = catalog.into();
        self
    }

    fn prompt(&self, input: &AgentInput) -> String {
        let ctx = &input.context;

        // profile / insights 以 system 消息的形式排在对话最前
        let mut conversation: Vec<ChatMessage> = Vec::new();
        if let Some(insights) = &ctx.insights {
            conversation.push(ChatMessage::system(format!("INSIGHTS: {}", insights)));
        }
        if let Some(profile) = &ctx.profile {
            conversation.push(ChatMessage::system(format!("PROFILE: {}", profile)));
        }
        conversation.extend(ctx.conversation.iter().cloned());

        let truths = self
            .base_truths
            .iter()
            .map(|t| format!("- {}", t))
            .collect::<Vec<_>>()
            .join("\n");
        let transcript = conversation
            .iter()
            .map(render_message)
            .collect::<Vec<_>>()
            .join("\n");

        let mut lines: Vec<String> = vec![
            "You are a helpful personal productivity assistant. Decide whether to call a tool before replying.".into(),
            "Base Truths (must not be contradicted):".into(),
            truths,
            String::new(),
        ];
        if let Some(summary) = &ctx.prior_summary {
            lines.push(format!("Prior conversation summary:\n{}", summary));
        }
        if !transcript.is_empty() {
            lines.push(format!("Conversation so far:\n{}", transcript));
        }
        lines.push(format!("TOOLS_CATALOG = {}", self.tool_catalog));
        lines.extend(
            [
                "Rules:",
                "- NEVER contradict Base Truths. If a reply would conflict, return CRITIQUE with violations, or adjust the answer to comply.",
                "- If the user shares personal info (name, profession, mood, work style, preferences, skills), emit TOOL_CALL profile.saveInsights first.",
                "- If the user states an actionable goal, emit TOOL_CALL todos.add (use threadId from State).",
                "- Emit ONE TOOL_CALL at a time. You will be invoked again with TOOL_RESULT in the conversation.",
                "- Never repeat a tool listed in executedTools.",
                "- Otherwise emit FINAL_ANSWER with a concise reply.",
                "- Return ONLY JSON, one of:",
                r#"  {"control":"TOOL_CALL","tool":{"name":"todos.add","args":{"text":"...","threadId":"..."}}}"#,
                r#"  {"control":"FINAL_ANSWER","message":"...","valid":true,"violations":[]}"#,
                r#"  {"control":"CRITIQUE","error":"...","violations":["..."]}"#,
            ]
            .map(String::from),
        );
        lines.push("State:".into());
        lines.push(format!(
            "- threadId: {}",
            ctx.thread_id.as_deref().unwrap_or("unknown")
        ));
        lines.push(format!("- executedTools: {}", json!(ctx.executed_tools)));
        lines.push(String::new());
        lines.push(format!("Query: {}", input.goal));

        lines.into_iter().filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n")
    }
}

fn render_message(m: &ChatMessage) -> String {
    let role = match m.role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::System => "system",
    };
    match &m.timestamp {
        Some(ts) => format!("[{}] {}: {}", ts, role, m.text),
        None => format!("{}: {}", role, m.text),
    }
}

#[async_trait]
impl Agent for SimpleChatAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::SimpleChat
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let payload = self.gateway.generate_json(&self.kind(), &self.prompt(input)).await?;
        let decision = narrow::<ChatDecision>(&payload).filter(|d| match d {
            ChatDecision::ToolCall { tool } => CHAT_TOOLS.contains(&tool.name.as_str()),
            _ => true,
        });

        let output = match decision {
            Some(ChatDecision::ToolCall { tool }) => {
                let summary = format!("Request tool: {}", tool.name);
                AgentOutput::tool_call(ToolRequest::from(tool)).with_summary(summary)
            }
            Some(ChatDecision::FinalAnswer { message, valid, violations }) => {
                AgentOutput::final_answer(json!({
                    "message": message,
                    "valid": valid,
                    "violations": violations,
                }))
            }
            Some(ChatDecision::Critique { error, message, violations }) => {
                let friendly = message
                    .clone()
                    .or_else(|| error.clone())
                    .unwrap_or_else(|| REFUSAL.to_string());
                AgentOutput::final_answer(json!({
                    "message": friendly,
                    "violations": violations,
                    "errorRaw": error,
                }))
            }
            None => AgentOutput::final_answer(json!({
                "message": REFUSAL,
                "violations": [],
                "errorRaw": "Invalid decision format",
            })),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::gateway_with;
    use crate::core::{AgentContext, OutputKind};

    fn input() -> AgentInput {
        let ctx = AgentContext {
            thread_id: Some("t-1".into()),
            profile: Some(json!({"name": "Sam"})),
            conversation: vec![ChatMessage::user("hi")],
            ..AgentContext::default()
        };
        AgentInput::new("u", "s", "I'm Sam, remind me to stretch").with_context(ctx)
    }

    #[tokio::test]
    async fn test_tool_call_decision() {
        let (gw, mock) = gateway_with([
            r#"{"control":"TOOL_CALL","tool":{"name":"todos.add","args":{"text":"stretch","threadId":"t-1"}}}"#,
        ]);
        let agent = SimpleChatAgent::new(gw, vec!["Respect the user's time".into()]);
        let out = agent.execute(&input()).await;
        assert_eq!(out.kind(), OutputKind::ToolCall);
        assert_eq!(out.summary(), Some("Request tool: todos.add"));

        let prompt = &mock.prompts()[0];
        assert!(prompt.contains("- Respect the user's time"));
        assert!(prompt.contains(r#"PROFILE: {"name":"Sam"}"#));
        assert!(prompt.contains("- threadId: t-1"));
        assert!(prompt.contains("user: hi"));
    }

    #[tokio::test]
    async fn test_critique_becomes_friendly_answer() {
        let (gw, _) = gateway_with([r#"{"control":"CRITIQUE","error":"conflicts with truth 1","violations":["1"]}"#]);
        let out = SimpleChatAgent::new(gw, vec![]).execute(&input()).await;
        assert_eq!(out.kind(), OutputKind::FinalAnswer);
        assert_eq!(out.content()["message"], "conflicts with truth 1");
        assert_eq!(out.content()["errorRaw"], "conflicts with truth 1");
    }

    #[tokio::test]
    async fn test_tool_outside_catalog_is_refused() {
        let (gw, _) = gateway_with([r#"{"control":"TOOL_CALL","tool":{"name":"http.post","args":{}}}"#]);
        let out = SimpleChatAgent::new(gw, vec![]).execute(&input()).await;
        assert_eq!(out.kind(), OutputKind::FinalAnswer);
        assert_eq!(out.content()["errorRaw"], "Invalid decision format");
    }

    #[tokio::test]
    async fn test_final_answer() {
        let (gw, _) = gateway_with([r#"{"control":"FINAL_ANSWER","message":"Done!","valid":true,"violations":[]}"#]);
        let out = SimpleChatAgent::new(gw, vec![]).execute(&input()).await;
        assert_eq!(out.content()["message"], "Done!");
        assert_eq!(out.content()["valid"], true);
    }
}
