//! 编排器：路由主循环
//!
//! ROUTING -> DISPATCHING(agent) -> { DISPATCHING(next) | TERMINAL }
//!
//! 1. 先问 Router；若不是 AGENT_CALL，Router 的输出即为最终结果
//! 2. 否则最多跳 `max_hops` 次：查表取 Agent（未知即 CRITIQUE）-> 经工具拦截执行 ->
//!    产出按角色并入上下文、这一跳追加进历史 -> AGENT_CALL 或带 nextAgent 的 PLAN_STEP 继续；
//!    不带 nextAgent 的 PLAN_STEP 重新询问 Router；其他输出为终态
//! 3. 跳数耗尽时默认保留最后一次输出（可配置为 GuardExhausted 的 CRITIQUE）
//! 4. 无论成败，每次运行恰好写入一条 ORCHESTRATOR 顶层追踪

use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::Agent;
use crate::core::interceptor::ToolInterceptor;
use crate::core::{now_ms, AgentError, AgentInput, AgentKind, AgentOutput, AgentTrace, ToolCallTrace};
use crate::trace::{record, TraceSink};

/// 角色 -> Agent 实例的查找表（启动时构建一次）
#[derive(Clone, Default)]
pub struct AgentTable {
    agents: HashMap<AgentKind, Arc<dyn Agent>>,
}

impl AgentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按 `agent.kind()` 注册；同一角色后注册者生效
    pub fn register(&mut self, agent: impl Agent + 'static) {
        self.register_arc(Arc::new(agent));
    }

    pub fn register_arc(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.kind(), agent);
    }

    pub fn resolve(&self, kind: &AgentKind) -> Result<Arc<dyn Agent>, AgentError> {
        self.agents
            .get(kind)
            .cloned()
            .ok_or_else(|| AgentError::UnknownAgent(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<AgentKind> {
        let mut kinds: Vec<AgentKind> = self.agents.keys().cloned().collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

pub struct Orchestrator {
    router: Arc<dyn Agent>,
    agents: AgentTable,
    interceptor: ToolInterceptor,
    sink: Arc<dyn TraceSink>,
    max_hops: usize,
    critique_on_exhaustion: bool,
}

impl Orchestrator {
    pub fn new(
        router: Arc<dyn Agent>,
        agents: AgentTable,
        interceptor: ToolInterceptor,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            router,
            agents,
            interceptor,
            sink,
            max_hops: 8,
            critique_on_exhaustion: false,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_critique_on_exhaustion(mut self, enabled: bool) -> Self {
        self.critique_on_exhaustion = enabled;
        self
    }

    pub fn agents(&self) -> &AgentTable {
        &self.agents
    }

    /// 执行一次完整编排；从不返回错误，失败即 CRITIQUE
    pub async fn execute(&self, input: AgentInput) -> AgentOutput {
        let started = now_ms();
        let mut tool_calls: Vec<ToolCallTrace> = Vec::new();

        let (output, error) = match self.run(&input, &mut tool_calls).await {
            Ok(output) => (output, None),
            Err(e) => {
                tracing::warn!(session = %input.session_id, error = %e, "orchestration failed");
                (AgentOutput::critique(&e), Some(e.to_string()))
            }
        };

        let mut trace = AgentTrace::new(AgentKind::Orchestrator, &input, output.clone(), started)
            .with_tool_calls(tool_calls);
        if let Some(e) = error {
            trace = trace.with_error(e);
        }
        tracing::info!(
            session = %input.session_id,
            output = %output.kind(),
            duration_ms = trace.duration_ms(),
            "orchestration finished"
        );
        record(self.sink.as_ref(), trace).await;
        output
    }

    async fn run(
        &self,
        input: &AgentInput,
        tool_calls: &mut Vec<ToolCallTrace>,
    ) -> Result<AgentOutput, AgentError> {
        let mut current = input.clone();
        let mut output = self.route(&mut current, tool_calls).await;
        if !matches!(output, AgentOutput::AgentCall { .. }) {
            return Ok(output);
        }

        let mut hops = 0usize;
        loop {
            let next = match &output {
                AgentOutput::AgentCall { next_agent, .. } => next_agent.clone(),
                AgentOutput::PlanStep { next_agent: Some(next), .. } => next.clone(),
                _ => break,
            };
            if hops >= self.max_hops {
                tracing::warn!(limit = self.max_hops, last = %output.kind(), "agent hop guard exhausted");
                if self.critique_on_exhaustion {
                    return Err(AgentError::GuardExhausted {
                        what: "agent hops",
                        limit: self.max_hops,
                    });
                }
                break;
            }
            hops += 1;

            let agent = self.agents.resolve(&next)?;
            tracing::debug!(hop = hops, agent = %next, "dispatch");
            output = self.step(agent.as_ref(), &mut current, tool_calls).await;

            if let AgentOutput::PlanStep { next_agent: None, .. } = &output {
                output = self.route(&mut current, tool_calls).await;
                if !matches!(output, AgentOutput::AgentCall { .. }) {
                    break;
                }
            }
        }

        tracing::debug!(hops, "routing loop finished");
        Ok(output)
    }

    async fn route(
        &self,
        current: &mut AgentInput,
        tool_calls: &mut Vec<ToolCallTrace>,
    ) -> AgentOutput {
        self.step(self.router.as_ref(), current, tool_calls).await
    }

    /// 执行一跳：产出并入上下文，并把这一跳追加到后续 Agent 可见的历史
    async fn step(
        &self,
        agent: &dyn Agent,
        current: &mut AgentInput,
        tool_calls: &mut Vec<ToolCallTrace>,
    ) -> AgentOutput {
        let started = now_ms();
        let kind = agent.kind();
        let dispatch = self.interceptor.dispatch(agent, current).await;
        let hop = AgentTrace::new(kind.clone(), current, dispatch.output.clone(), started)
            .with_tool_calls(dispatch.tool_calls.clone());
        tool_calls.extend(dispatch.tool_calls);

        let mut next = current.merged(&kind, dispatch.output.content());
        next.history.push(hop);
        *current = next;
        dispatch.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MonitoringAgent;

    #[test]
    fn test_table_resolves_registered_kinds() {
        let mut table = AgentTable::new();
        table.register(MonitoringAgent::new());
        assert_eq!(table.len(), 1);
        assert!(table.resolve(&AgentKind::Monitoring).is_ok());
        assert_eq!(table.kinds(), vec![AgentKind::Monitoring]);
    }

    #[test]
    fn test_table_rejects_unknown() {
        let table = AgentTable::new();
        let err = table.resolve(&AgentKind::from("UNKNOWN_AGENT")).err().unwrap();
        assert_eq!(err.to_string(), "Unknown agent: UNKNOWN_AGENT");
        assert!(table.resolve(&AgentKind::Analysis).is_err());
    }
}
