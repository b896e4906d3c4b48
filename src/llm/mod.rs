//! LLM 层：客户端抽象、实现（OpenAI 兼容 / Mock / Scripted）与文本生成端口

pub mod generator;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use generator::TextGenerator;
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;

/// 根据配置选择后端：provider=mock 或未设置 OPENAI_API_KEY 时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = std::env::var("OPENAI_API_KEY").ok();

    match (provider.as_str(), api_key) {
        ("mock", _) => {
            tracing::info!("Using Mock LLM (provider=mock)");
            Arc::new(MockLlmClient)
        }
        (_, Some(key)) => {
            tracing::info!(model = %cfg.llm.model, "Using OpenAI-compatible LLM");
            Arc::new(OpenAiClient::from_section(&cfg.llm, &key))
        }
        (_, None) => {
            tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}
