//! MonitoringAgent：不调 LLM，直接从 `input.history` 统计运行指标

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::agents::Agent;
use crate::core::{AgentError, AgentInput, AgentKind, AgentOutput, AgentTrace};

/// 一组追踪的汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    /// ok / degraded（出现过 CRITIQUE）/ idle（无历史）
    pub status: String,
    pub invocations: usize,
    pub critiques: usize,
    pub tool_calls: usize,
    pub tool_errors: usize,
    pub mean_latency_ms: f64,
    pub max_latency_ms: i64,
    pub by_agent: BTreeMap<String, usize>,
}

impl RunMetrics {
    pub fn from_history(history: &[AgentTrace]) -> Self {
        let mut by_agent = BTreeMap::new();
        let mut critiques = 0;
        let mut tool_calls = 0;
        let mut tool_errors = 0;
        let mut total_latency = 0i64;
        let mut max_latency_ms = 0i64;

        for trace in history {
            *by_agent.entry(trace.agent.to_string()).or_insert(0) += 1;
            if trace.output.is_critique() {
                critiques += 1;
            }
            tool_calls += trace.tool_calls.len();
            tool_errors += trace.tool_calls.iter().filter(|c| c.error.is_some()).count();
            let latency = trace.duration_ms();
            total_latency += latency;
            max_latency_ms = max_latency_ms.max(latency);
        }

        let invocations = history.len();
        let status = match (invocations, critiques) {
            (0, _) => "idle",
            (_, 0) => "ok",
            _ => "degraded",
        };
        let mean_latency_ms = if invocations == 0 {
            0.0
        } else {
            total_latency as f64 / invocations as f64
        };

        Self {
            status: status.to_string(),
            invocations,
            critiques,
            tool_calls,
            tool_errors,
            mean_latency_ms,
            max_latency_ms,
            by_agent,
        }
    }
}

#[derive(Debug, Default)]
pub struct MonitoringAgent;

impl MonitoringAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for MonitoringAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Monitoring
    }

    async fn run(&self, input: &AgentInput) -> Result<AgentOutput, AgentError> {
        let metrics = RunMetrics::from_history(&input.history);
        let summary = format!(
            "{} invocation(s), {} critique(s)",
            metrics.invocations, metrics.critiques
        );
        let content = serde_json::to_value(&metrics)?;
        Ok(AgentOutput::final_answer(content).with_summary(summary))
    }
}
