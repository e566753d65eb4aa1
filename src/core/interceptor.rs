//! 工具调用拦截：Agent 请求工具时由这里执行，并把结果交回同一个 Agent
//!
//! 每次 dispatch 的流程：
//! 1. 调用 agent.execute（可选超时）
//! 2. 输出为 TOOL_CALL 时执行工具；成功则把 `toolResult` 与一条代表该 TOOL_CALL 的历史
//!    并入新输入，重新调用同一个 Agent；未注册 / 失败 / 超时则立即以 CRITIQUE 结束
//! 3. 最多执行 `max_iterations` 次工具（与编排器的跳数上限相互独立）
//! 4. 结束时写入一条该 Agent 的追踪；用过工具时再追加一条 NO_OP 汇总追踪

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use crate::agents::Agent;
use crate::core::{
    now_ms, AgentError, AgentInput, AgentKind, AgentOutput, AgentTrace, ToolCallTrace,
};
use crate::tools::ToolExecutor;
use crate::trace::{record, TraceSink};

/// 在可选时限内执行 Agent；超时转为 CRITIQUE
pub async fn invoke_agent(
    agent: &dyn Agent,
    input: &AgentInput,
    limit: Option<Duration>,
) -> AgentOutput {
    match limit {
        Some(limit) => match timeout(limit, agent.execute(input)).await {
            Ok(output) => output,
            Err(_) => {
                let err = AgentError::Timeout(format!(
                    "agent {} after {}ms",
                    agent.kind(),
                    limit.as_millis()
                ));
                tracing::warn!(agent = %agent.kind(), "{}", err);
                AgentOutput::critique(err)
            }
        },
        None => agent.execute(input).await,
    }
}

/// 一次 dispatch 的结果：最终输出与期间的全部工具调用
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub output: AgentOutput,
    pub tool_calls: Vec<ToolCallTrace>,
}

#[derive(Clone)]
pub struct ToolInterceptor {
    executor: ToolExecutor,
    sink: Arc<dyn TraceSink>,
    max_iterations: usize,
    agent_timeout: Option<Duration>,
    critique_on_exhaustion: bool,
}

impl ToolInterceptor {
    pub fn new(executor: ToolExecutor, sink: Arc<dyn TraceSink>, max_iterations: usize) -> Self {
        Self {
            executor,
            sink,
            max_iterations,
            agent_timeout: None,
            critique_on_exhaustion: false,
        }
    }

    pub fn with_agent_timeout(mut self, limit: Option<Duration>) -> Self {
        self.agent_timeout = limit;
        self
    }

    /// 上限耗尽时改为返回 GuardExhausted 的 CRITIQUE
    pub fn with_critique_on_exhaustion(mut self, enabled: bool) -> Self {
        self.critique_on_exhaustion = enabled;
        self
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub async fn dispatch(&self, agent: &dyn Agent, input: &AgentInput) -> Dispatch {
        let kind = agent.kind();
        let started = now_ms();
        let mut current = input.clone();
        let mut tool_calls: Vec<ToolCallTrace> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut invoked_at = now_ms();
        let mut output = invoke_agent(agent, &current, self.agent_timeout).await;
        let mut iterations = 0usize;

        while let AgentOutput::ToolCall { content: request, .. } = &output {
            if iterations >= self.max_iterations {
                tracing::warn!(
                    agent = %kind,
                    limit = self.max_iterations,
                    "tool iteration guard exhausted"
                );
                if self.critique_on_exhaustion {
                    let err = AgentError::GuardExhausted {
                        what: "tool iterations",
                        limit: self.max_iterations,
                    };
                    errors.push(err.to_string());
                    output = AgentOutput::critique(err);
                }
                break;
            }
            iterations += 1;

            let request = request.clone();
            let tool_started = now_ms();
            let result = self
                .executor
                .execute(&request.name, request.args.clone(), &current.tool_context())
                .await;
            let tool_ended = now_ms().max(tool_started);

            match result {
                Ok(value) => {
                    let call = ToolCallTrace {
                        tool_name: request.name.clone(),
                        args: request.args.clone(),
                        result: Some(value.clone()),
                        error: None,
                        started_at_ms: tool_started,
                        ended_at_ms: tool_ended,
                    };
                    tool_calls.push(call.clone());
                    let prior = AgentTrace::new(kind.clone(), &current, output.clone(), invoked_at)
                        .with_tool_calls(vec![call]);
                    current = current.with_tool_result(&request.name, value, prior);
                    invoked_at = now_ms();
                    output = invoke_agent(agent, &current, self.agent_timeout).await;
                }
                Err(err) => {
                    tracing::warn!(agent = %kind, tool = %request.name, error = %err, "tool call failed");
                    tool_calls.push(ToolCallTrace {
                        tool_name: request.name.clone(),
                        args: request.args.clone(),
                        result: None,
                        error: Some(err.to_string()),
                        started_at_ms: tool_started,
                        ended_at_ms: tool_ended,
                    });
                    errors.push(err.to_string());
                    output = AgentOutput::critique(err);
                    break;
                }
            }
        }

        let mut trace = AgentTrace::new(kind.clone(), input, output.clone(), started)
            .with_tool_calls(tool_calls.clone());
        for e in errors {
            trace = trace.with_error(e);
        }
        record(self.sink.as_ref(), trace).await;

        // 至少一次工具调用成功才写 NO_OP 汇总
        if tool_calls.iter().any(|c| c.error.is_none()) {
            record(self.sink.as_ref(), tool_summary(&kind, input, &tool_calls, started)).await;
        }

        Dispatch { output, tool_calls }
    }
}

/// 汇总本次 dispatch 用过的工具（NO_OP 追踪）
fn tool_summary(
    kind: &AgentKind,
    input: &AgentInput,
    tool_calls: &[ToolCallTrace],
    started: i64,
) -> AgentTrace {
    let names: Vec<&str> = tool_calls.iter().map(|c| c.tool_name.as_str()).collect();
    let failed = tool_calls.iter().filter(|c| c.error.is_some()).count();
    let output = AgentOutput::no_op(json!({
        "toolCalls": tool_calls.len(),
        "failed": failed,
        "tools": names,
    }))
    .with_summary(format!("{} used {} tool call(s)", kind, tool_calls.len()));
    AgentTrace::new(kind.clone(), input, output, started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OutputKind, ToolRequest};
    use crate::tools::{Tool, ToolContext, ToolRegistry};
    use crate::trace::MemoryTraceSink;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 前 n 次请求工具，之后给出最终答案（附带看到的 toolResult）
    struct ToolHungry {
        remaining: AtomicUsize,
        tool: &'static str,
    }

    #[async_trait]
    impl Agent for ToolHungry {
        fn kind(&self) -> AgentKind {
            AgentKind::TaskPlanner
        }

        async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
            let left = self.remaining.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining.store(left - 1, Ordering::SeqCst);
                return Ok(AgentOutput::tool_call(ToolRequest::new(self.tool, json!({"n": left}))));
            }
            Ok(AgentOutput::final_answer(json!({
                "seen": input.context.tool_result.as_ref().map(|r| r.result.clone()),
                "history": input.history.len(),
            })))
        }
    }

    struct Counter(AtomicUsize);

    #[async_trait]
    impl Tool for Counter {
        fn name(&self) -> &str {
            "count"
        }

        fn description(&self) -> &str {
            "counts calls"
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value, String> {
            Ok(json!(self.0.fetch_add(1, Ordering::SeqCst) + 1))
        }
    }

    fn interceptor(max: usize) -> (ToolInterceptor, Arc<MemoryTraceSink>) {
        let mut registry = ToolRegistry::new();
        registry.register(Counter(AtomicUsize::new(0)));
        let sink = Arc::new(MemoryTraceSink::new());
        let executor = ToolExecutor::new(registry, None);
        (ToolInterceptor::new(executor, sink.clone(), max), sink)
    }

    #[tokio::test]
    async fn test_tool_result_returns_to_same_agent() {
        let (ic, sink) = interceptor(8);
        let agent = ToolHungry { remaining: AtomicUsize::new(2), tool: "count" };
        let d = ic.dispatch(&agent, &AgentInput::new("u", "s", "g")).await;
        assert_eq!(d.output.kind(), OutputKind::FinalAnswer);
        assert_eq!(d.output.content()["seen"], 2);
        assert_eq!(d.output.content()["history"], 2);
        assert_eq!(d.tool_calls.len(), 2);

        let traces = sink.get_all().await.unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].tool_calls.len(), 2);
        assert_eq!(traces[1].output.kind(), OutputKind::NoOp);
        assert_eq!(traces[1].output.content()["toolCalls"], 2);
    }

    #[tokio::test]
    async fn test_guard_bounds_tool_loop() {
        let (ic, _) = interceptor(8);
        let agent = ToolHungry { remaining: AtomicUsize::new(usize::MAX), tool: "count" };
        let d = ic.dispatch(&agent, &AgentInput::new("u", "s", "g")).await;
        assert_eq!(d.tool_calls.len(), 8);
        assert_eq!(d.output.kind(), OutputKind::ToolCall);
    }

    #[tokio::test]
    async fn test_guard_exhaustion_can_critique() {
        let (ic, sink) = interceptor(3);
        let ic = ic.with_critique_on_exhaustion(true);
        let agent = ToolHungry { remaining: AtomicUsize::new(usize::MAX), tool: "count" };
        let d = ic.dispatch(&agent, &AgentInput::new("u", "s", "g")).await;
        assert_eq!(d.output.error_message(), Some("Max tool iterations exceeded (3)"));
        let traces = sink.get_all().await.unwrap();
        assert_eq!(traces[0].errors.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_terminal() {
        let (ic, sink) = interceptor(8);
        let agent = ToolHungry { remaining: AtomicUsize::new(5), tool: "nope" };
        let d = ic.dispatch(&agent, &AgentInput::new("u", "s", "g")).await;
        assert_eq!(d.output.error_message(), Some("Unknown tool: nope"));
        assert_eq!(agent.remaining.load(Ordering::SeqCst), 4);

        let traces = sink.get_all().await.unwrap();
        assert_eq!(traces[0].errors, vec!["Unknown tool: nope".to_string()]);
        assert_eq!(traces[0].tool_calls[0].error.as_deref(), Some("Unknown tool: nope"));
        // 没有成功的工具调用，不写汇总
        assert_eq!(traces.len(), 1);
    }

    /// 依次请求给定的工具
    struct ToolSequence(std::sync::Mutex<Vec<&'static str>>);

    #[async_trait]
    impl Agent for ToolSequence {
        fn kind(&self) -> AgentKind {
            AgentKind::TaskPlanner
        }

        async fn run(&self, _input: &AgentInput) -> Result<AgentOutput, AgentError> {
            let mut tools = self.0.lock().unwrap();
            if tools.is_empty() {
                return Ok(AgentOutput::final_answer(json!({})));
            }
            let name = tools.remove(0);
            Ok(AgentOutput::tool_call(ToolRequest::new(name, json!({}))))
        }
    }

    #[tokio::test]
    async fn test_summary_counts_failed_after_success() {
        let (ic, sink) = interceptor(8);
        let agent = ToolSequence(std::sync::Mutex::new(vec!["count", "nope"]));
        let d = ic.dispatch(&agent, &AgentInput::new("u", "s", "g")).await;
        assert_eq!(d.output.error_message(), Some("Unknown tool: nope"));

        let traces = sink.get_all().await.unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[1].output.kind(), OutputKind::NoOp);
        assert_eq!(traces[1].output.content()["toolCalls"], 2);
        assert_eq!(traces[1].output.content()["failed"], 1);
    }

    struct Sleepy;

    #[async_trait]
    impl Agent for Sleepy {
        fn kind(&self) -> AgentKind {
            AgentKind::Analysis
        }

        async fn run(&self, _input: &AgentInput) -> Result<AgentOutput, AgentError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(AgentOutput::final_answer(json!({})))
        }
    }

    #[tokio::test]
    async fn test_agent_timeout() {
        let (ic, _) = interceptor(8);
        let ic = ic.with_agent_timeout(Some(Duration::from_millis(20)));
        let d = ic.dispatch(&Sleepy, &AgentInput::new("u", "s", "g")).await;
        assert!(d.output.is_critique());
        assert!(d.output.error_message().unwrap().starts_with("Timeout:"));
    }
}
