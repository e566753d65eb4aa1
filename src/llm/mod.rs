//! LLM 层：客户端抽象、后端实现（OpenAI 兼容 / Gemini REST / Mock）与 JSON 网关

pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use gateway::{parse_json_object, strip_code_fences, LlmGateway};
pub use gemini::{gemini_endpoint, GeminiClient, GEMINI_DEFAULT_MODEL};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError, Message, Role};

use crate::config::{BackendSection, LlmSection};

/// 根据 [llm.*] 段创建后端；API Key 缺失时退化为 Mock（所有调用失败，Agent 降级为 CRITIQUE）
pub fn create_client(section: &BackendSection) -> Arc<dyn LlmClient> {
    let provider = section.provider.to_lowercase();
    let api_key = std::env::var(&section.api_key_env).ok().filter(|k| !k.is_empty());

    match (provider.as_str(), api_key) {
        ("mock", _) => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
        ("openai", Some(key)) => {
            let model = section.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            tracing::info!("Using OpenAI-compatible LLM ({})", model);
            Arc::new(OpenAiClient::new(section.base_url.as_deref(), &model, &key))
        }
        ("gemini", Some(key)) => {
            let model = section
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string());
            let url = section.base_url.clone().unwrap_or_else(|| gemini_endpoint(&model));
            tracing::info!("Using Gemini LLM ({})", model);
            Arc::new(GeminiClient::new(url, key))
        }
        (other, _) => {
            tracing::warn!(
                provider = other,
                env = %section.api_key_env,
                "No API key set or provider unknown, using Mock LLM"
            );
            Arc::new(MockLlmClient::new())
        }
    }
}

/// 由 [llm] 段组装网关：主后端 + 可选备用后端 + 可选超时
pub fn create_gateway(section: &LlmSection) -> LlmGateway {
    let mut gateway = LlmGateway::new(create_client(&section.primary));
    if let Some(secondary) = &section.secondary {
        gateway = gateway.with_secondary(create_client(secondary));
    }
    if let Some(secs) = section.timeout_secs {
        gateway = gateway.with_timeout(Duration::from_secs(secs));
    }
    gateway
}
