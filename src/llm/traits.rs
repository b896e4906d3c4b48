//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 LlmClient::complete；错误以字符串返回，
//! 由 TextGenerator 统一转换为 AgentError。

use async_trait::async_trait;

use crate::llm::TokenUsage;
use crate::memory::Message;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 累计 token 用量；不统计的后端返回零
    fn token_usage(&self) -> TokenUsage {
        TokenUsage::default()
    }
}
