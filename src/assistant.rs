//! 助手运行时：把存储、LLM 网关、工具、Agent 与两个编排器装配在一起
//!
//! create_assistant 按配置打开存储并创建网关；build_assistant 接收现成的存储与网关
//! （测试中注入 Mock 网关）。run_goal 走路由编排，chat 走简单对话循环。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::agents::{
    AnalysisAgent, ContentCreatorAgent, FeedbackAgent, InteractionAgent, LearningAgent,
    MonitoringAgent, RouterAgent, SimpleChatAgent, TaskPlannerAgent, ValidationAgent,
};
use crate::config::AppConfig;
use crate::core::{
    AgentContext, AgentError, AgentInput, AgentOutput, AgentTable, AgentTrace, ChatMessage,
    Orchestrator, SimpleChatOrchestrator, ToolInterceptor,
};
use crate::llm::{create_gateway, LlmGateway};
use crate::store::JsonStore;
use crate::tools::profile::{PROFILE_INSIGHTS_KEY, PROFILE_KEY};
use crate::tools::{register_default_tools, ToolExecutor, ToolRegistry};
use crate::trace::{StoreTraceSink, TraceSink};

/// data_dir 下的存储文件名
pub const STORE_FILE: &str = "compass.json";

pub struct Assistant {
    store: Arc<JsonStore>,
    sink: Arc<dyn TraceSink>,
    orchestrator: Orchestrator,
    chat: SimpleChatOrchestrator,
}

/// 按配置创建助手：配置了 data_dir 时存储落盘，否则只在内存
pub async fn create_assistant(cfg: &AppConfig) -> Result<Assistant, AgentError> {
    let store = match &cfg.app.data_dir {
        Some(dir) => {
            let path = dir.join(STORE_FILE);
            tracing::info!(path = %path.display(), "opening store");
            JsonStore::open(path).await?
        }
        None => {
            tracing::info!("no data_dir configured, store is in-memory");
            JsonStore::in_memory()
        }
    };
    Ok(build_assistant(cfg, Arc::new(store), create_gateway(&cfg.llm)))
}

pub fn build_assistant(cfg: &AppConfig, store: Arc<JsonStore>, gateway: LlmGateway) -> Assistant {
    let limits = &cfg.orchestrator;
    let agent_timeout = limits.agent_timeout_secs.map(Duration::from_secs);
    let sink: Arc<dyn TraceSink> = Arc::new(StoreTraceSink::new(store.clone()));

    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry, store.clone(), cfg.tools.http_timeout_secs);
    let executor = ToolExecutor::new(registry, cfg.tools.timeout_secs);
    let catalog = executor.catalog_json();

    let mut agents = AgentTable::new();
    agents.register(TaskPlannerAgent::new(gateway.clone()).with_tool_catalog(catalog));
    agents.register(ContentCreatorAgent::new(gateway.clone()));
    agents.register(AnalysisAgent::new(gateway.clone()));
    agents.register(ValidationAgent::new(gateway.clone()));
    agents.register(LearningAgent::new(gateway.clone()));
    agents.register(FeedbackAgent::new(gateway.clone()));
    agents.register(InteractionAgent::new(gateway.clone()));
    agents.register(MonitoringAgent::new());
    tracing::debug!(agents = ?agents.kinds(), tools = ?executor.tool_names(), "assistant assembled");

    let interceptor = ToolInterceptor::new(executor.clone(), sink.clone(), limits.max_tool_iterations)
        .with_agent_timeout(agent_timeout)
        .with_critique_on_exhaustion(limits.critique_on_guard_exhaustion);
    let orchestrator = Orchestrator::new(
        Arc::new(RouterAgent::new(gateway.clone())),
        agents,
        interceptor,
        sink.clone(),
    )
    .with_max_hops(limits.max_hops)
    .with_critique_on_exhaustion(limits.critique_on_guard_exhaustion);

    let chat_agent = SimpleChatAgent::new(gateway, cfg.chat.base_truths.clone());
    let chat = SimpleChatOrchestrator::new(Arc::new(chat_agent), executor, sink.clone())
        .with_max_tool_iterations(limits.chat_max_tool_iterations)
        .with_agent_timeout(agent_timeout)
        .with_critique_on_exhaustion(limits.critique_on_guard_exhaustion);

    Assistant {
        store,
        sink,
        orchestrator,
        chat,
    }
}

impl Assistant {
    pub fn store(&self) -> &Arc<JsonStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// 路由编排一个目标
    pub async fn run_goal(&self, user_id: &str, session_id: &str, goal: &str) -> AgentOutput {
        self.orchestrator
            .execute(AgentInput::new(user_id, session_id, goal))
            .await
    }

    /// 调用方自行构造输入（携带上下文或历史）
    pub async fn run(&self, input: AgentInput) -> AgentOutput {
        self.orchestrator.execute(input).await
    }

    /// 一轮简单对话：线程即会话，已保存的画像与洞察随请求带上
    pub async fn chat(&self, user_id: &str, session_id: &str, message: &str) -> AgentOutput {
        let input = self.chat_input(user_id, session_id, message).await;
        self.chat.execute(input).await
    }

    async fn chat_input(&self, user_id: &str, session_id: &str, message: &str) -> AgentInput {
        let profile: Option<Value> = self.store.get(PROFILE_KEY).await.ok().flatten();
        let insights: Option<Value> = self.store.get(PROFILE_INSIGHTS_KEY).await.ok().flatten();
        let context = AgentContext {
            thread_id: Some(session_id.to_string()),
            conversation: vec![ChatMessage::user(message)],
            profile,
            insights,
            ..AgentContext::default()
        };
        AgentInput::new(user_id, session_id, message).with_context(context)
    }

    pub async fn traces(&self) -> Result<Vec<AgentTrace>, AgentError> {
        self.sink.get_all().await
    }

    pub async fn clear_traces(&self) -> Result<(), AgentError> {
        self.sink.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AgentKind, OutputKind};
    use crate::llm::MockLlmClient;
    use crate::tools::todos::PREDICTED_TASKS_KEY;

    fn assistant_with(replies: &[&str]) -> (Assistant, Arc<MockLlmClient>) {
        let mock = Arc::new(MockLlmClient::with_replies(replies.iter().copied()));
        let assistant = build_assistant(
            &AppConfig::default(),
            Arc::new(JsonStore::in_memory()),
            LlmGateway::new(mock.clone()),
        );
        (assistant, mock)
    }

    #[tokio::test]
    async fn test_goal_routes_to_analysis() {
        let (assistant, mock) = assistant_with(&[
            r#"{"intent":"insight","routeTo":"ANALYSIS","confidence":0.9,"rationale":"stats"}"#,
            r#"{"insights":["mornings are busy"],"control":"FINAL_ANSWER"}"#,
        ]);
        let out = assistant.run_goal("u", "s", "how was my week?").await;
        assert_eq!(out.kind(), OutputKind::FinalAnswer);
        assert_eq!(out.content()["insights"][0], "mornings are busy");
        assert_eq!(mock.call_count(), 2);

        let traces = assistant.traces().await.unwrap();
        let top: Vec<&AgentTrace> = traces
            .iter()
            .filter(|t| t.agent == AgentKind::Orchestrator)
            .collect();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_adds_todo_then_answers() {
        let (assistant, mock) = assistant_with(&[
            r#"{"control":"TOOL_CALL","tool":{"name":"todos.add","args":{"text":"stretch","threadId":"s"}}}"#,
            r#"{"control":"FINAL_ANSWER","message":"Added it.","valid":true,"violations":[]}"#,
        ]);
        let out = assistant.chat("u", "s", "remind me to stretch").await;
        assert_eq!(out.content()["message"], "Added it.");

        let tasks: Vec<String> = assistant.store().get_or_default(PREDICTED_TASKS_KEY).await;
        assert_eq!(tasks, vec!["stretch".to_string()]);
        assert!(mock.prompts()[1].contains("TOOL_RESULT todos.add"));

        assert_eq!(assistant.traces().await.unwrap().len(), 1);
        assistant.clear_traces().await.unwrap();
        assert!(assistant.traces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_carries_saved_profile() {
        let (assistant, mock) = assistant_with(&[
            r#"{"control":"FINAL_ANSWER","message":"Hi Sam","valid":true,"violations":[]}"#,
        ]);
        assistant
            .store()
            .set(PROFILE_KEY, &serde_json::json!({"name": "Sam"}))
            .await
            .unwrap();
        assistant.chat("u", "s", "hello").await;
        assert!(mock.prompts()[0].contains(r#"PROFILE: {"name":"Sam"}"#));
    }
}
