//! 追踪汇（Trace Sink）
//!
//! 只追加的 AgentTrace 日志，契约为 append / get_all / clear。
//! 编排器写入失败时只记日志，不中断运行。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::{AgentError, AgentTrace};
use crate::store::JsonStore;

/// 追踪在存储中的键
pub const TRACES_KEY: &str = "agentTraces";

#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn append(&self, trace: AgentTrace) -> Result<(), AgentError>;

    async fn get_all(&self) -> Result<Vec<AgentTrace>, AgentError>;

    async fn clear(&self) -> Result<(), AgentError>;
}

/// 内存实现（测试与无存储目录时使用）
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    traces: RwLock<Vec<AgentTrace>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TraceSink for MemoryTraceSink {
    async fn append(&self, trace: AgentTrace) -> Result<(), AgentError> {
        self.traces.write().await.push(trace);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<AgentTrace>, AgentError> {
        Ok(self.traces.read().await.clone())
    }

    async fn clear(&self) -> Result<(), AgentError> {
        self.traces.write().await.clear();
        Ok(())
    }
}

/// 基于 JsonStore 的实现：全部追踪存在 `agentTraces` 键下
pub struct StoreTraceSink {
    store: Arc<JsonStore>,
}

impl StoreTraceSink {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TraceSink for StoreTraceSink {
    async fn append(&self, trace: AgentTrace) -> Result<(), AgentError> {
        self.store
            .update::<Vec<AgentTrace>, _, _>(TRACES_KEY, |traces| traces.push(trace))
            .await
    }

    async fn get_all(&self) -> Result<Vec<AgentTrace>, AgentError> {
        Ok(self.store.get(TRACES_KEY).await?.unwrap_or_default())
    }

    async fn clear(&self) -> Result<(), AgentError> {
        self.store.set(TRACES_KEY, &Vec::<AgentTrace>::new()).await
    }
}

/// 写入追踪；失败只告警（追踪丢失不影响编排结果）
pub async fn record(sink: &dyn TraceSink, trace: AgentTrace) {
    let agent = trace.agent.clone();
    if let Err(e) = sink.append(trace).await {
        tracing::warn!(agent = %agent, error = %e, "failed to append agent trace");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AgentInput, AgentKind, AgentOutput};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample(kind: AgentKind) -> AgentTrace {
        let input = AgentInput::new("u", "s", "goal");
        AgentTrace::new(kind, &input, AgentOutput::final_answer(json!({"ok": true})), 1)
    }

    struct BrokenSink;

    #[async_trait]
    impl TraceSink for BrokenSink {
        async fn append(&self, _trace: AgentTrace) -> Result<(), AgentError> {
            Err(AgentError::Storage("quota".to_string()))
        }

        async fn get_all(&self) -> Result<Vec<AgentTrace>, AgentError> {
            Ok(Vec::new())
        }

        async fn clear(&self) -> Result<(), AgentError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_memory_sink_append_order_and_clear() {
        let sink = MemoryTraceSink::new();
        sink.append(sample(AgentKind::Router)).await.unwrap();
        sink.append(sample(AgentKind::TaskPlanner)).await.unwrap();
        let all = sink.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].agent, AgentKind::Router);
        assert_eq!(all[1].agent, AgentKind::TaskPlanner);
        sink.clear().await.unwrap();
        assert!(sink.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_sink_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        {
            let sink = StoreTraceSink::new(Arc::new(JsonStore::open(&path).await.unwrap()));
            sink.append(sample(AgentKind::Analysis)).await.unwrap();
        }
        let sink = StoreTraceSink::new(Arc::new(JsonStore::open(&path).await.unwrap()));
        let all = sink.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].agent, AgentKind::Analysis);
        assert_eq!(all[0].output, AgentOutput::final_answer(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_store_sink_does_not_overwrite_foreign_entries() {
        let store = Arc::new(JsonStore::in_memory());
        store
            .set(TRACES_KEY, &json!([{"legacy": true}, {"legacy": false}]))
            .await
            .unwrap();
        let sink = StoreTraceSink::new(store.clone());
        assert!(sink.append(sample(AgentKind::Router)).await.is_err());
        record(&sink, sample(AgentKind::Router)).await;

        let raw: Option<serde_json::Value> = store.get(TRACES_KEY).await.unwrap();
        assert_eq!(raw.unwrap().as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_record_swallows_sink_errors() {
        record(&BrokenSink, sample(AgentKind::Router)).await;
    }
}
