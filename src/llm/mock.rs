//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 按顺序回放预设回复；回复用完后若设置了默认回复则一直返回它，否则报错。
//! 记录收到的每个 prompt，便于断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次回放的文本回复
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// 追加一个失败回复
    pub fn then_fail(self, error: LlmError) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(error));
        }
        self
    }

    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(reply.into()));
        }
        self
    }

    /// 预设回复耗尽后一直返回的回复
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// 至今收到的 prompt（每次调用把消息拼成一段）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt);
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::NotConfigured("mock replies exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_fallback() {
        let mock = MockLlmClient::with_replies(["a", "b"]).with_fallback("z");
        let msgs = [Message::user("q")];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "a");
        assert_eq!(mock.complete(&msgs).await.unwrap(), "b");
        assert_eq!(mock.complete(&msgs).await.unwrap(), "z");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback_errors() {
        let mock = MockLlmClient::new();
        assert!(mock.complete(&[Message::user("q")]).await.is_err());
        assert_eq!(mock.prompts(), vec!["q".to_string()]);
    }
}
