//! 简单对话编排：单个对话 Agent + 工具循环
//!
//! 与通用拦截器的区别：同一轮对话中同一工具只允许执行一次（重复请求即 CRITIQUE），
//! 最多 `max_tool_iterations` 次；工具结果以 `TOOL_RESULT name: json` 的 system 消息回灌进对话。
//! 每次执行恰好写入一条 ORCHESTRATOR 顶层追踪。

use std::sync::Arc;
use std::time::Duration;

use crate::agents::Agent;
use crate::core::interceptor::invoke_agent;
use crate::core::{
    now_ms, AgentError, AgentInput, AgentKind, AgentOutput, AgentTrace, ChatMessage, ToolCallTrace,
};
use crate::tools::ToolExecutor;
use crate::trace::{record, TraceSink};

pub struct SimpleChatOrchestrator {
    agent: Arc<dyn Agent>,
    executor: ToolExecutor,
    sink: Arc<dyn TraceSink>,
    max_tool_iterations: usize,
    agent_timeout: Option<Duration>,
    critique_on_exhaustion: bool,
}

impl SimpleChatOrchestrator {
    pub fn new(agent: Arc<dyn Agent>, executor: ToolExecutor, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            agent,
            executor,
            sink,
            max_tool_iterations: 5,
            agent_timeout: None,
            critique_on_exhaustion: false,
        }
    }

    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn with_agent_timeout(mut self, limit: Option<Duration>) -> Self {
        self.agent_timeout = limit;
        self
    }

    pub fn with_critique_on_exhaustion(mut self, enabled: bool) -> Self {
        self.critique_on_exhaustion = enabled;
        self
    }

    pub async fn execute(&self, input: AgentInput) -> AgentOutput {
        let started = now_ms();
        let mut current = input.clone();
        let mut executed: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCallTrace> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        let mut output = invoke_agent(self.agent.as_ref(), &current, self.agent_timeout).await;
        let mut guard = 0usize;

        while let AgentOutput::ToolCall { content: request, .. } = &output {
            if guard >= self.max_tool_iterations {
                tracing::warn!(limit = self.max_tool_iterations, "chat tool guard exhausted");
                if self.critique_on_exhaustion {
                    let err = AgentError::GuardExhausted {
                        what: "chat tool iterations",
                        limit: self.max_tool_iterations,
                    };
                    errors.push(err.to_string());
                    output = AgentOutput::critique(err);
                }
                break;
            }
            guard += 1;

            let request = request.clone();
            if executed.contains(&request.name) {
                let msg = format!("Repeated tool: {}", request.name);
                tracing::warn!(tool = %request.name, "repeated tool request rejected");
                errors.push(msg.clone());
                output = AgentOutput::critique(msg);
                break;
            }

            let tool_started = now_ms();
            let result = self
                .executor
                .execute(&request.name, request.args.clone(), &current.tool_context())
                .await;
            let tool_ended = now_ms().max(tool_started);

            match result {
                Ok(value) => {
                    tool_calls.push(ToolCallTrace {
                        tool_name: request.name.clone(),
                        args: request.args.clone(),
                        result: Some(value.clone()),
                        error: None,
                        started_at_ms: tool_started,
                        ended_at_ms: tool_ended,
                    });
                    executed.push(request.name.clone());

                    let mut next = current.clone();
                    next.context.conversation.push(ChatMessage::system(format!(
                        "TOOL_RESULT {}: {}",
                        request.name, value
                    )));
                    next.context.executed_tools = executed.clone();
                    current = next;
                    output = invoke_agent(self.agent.as_ref(), &current, self.agent_timeout).await;
                }
                Err(err) => {
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

        let mut trace = AgentTrace::new(AgentKind::Orchestrator, &input, output.clone(), started)
            .with_tool_calls(tool_calls);
        for e in errors {
            trace = trace.with_error(e);
        }
        tracing::info!(
            session = %input.session_id,
            output = %output.kind(),
            tools = ?executed,
            "chat turn finished"
        );
        record(self.sink.as_ref(), trace).await;
        output
    }
}
