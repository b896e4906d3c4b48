//! 文本生成端口
//!
//! generate(prompt, system_prompt) 把单个 prompt（可选 system）发给 LlmClient，
//! 施加请求超时，并把传输层错误统一转为 AgentError（对当前运行是致命错误）。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::{LlmClient, TokenUsage};
use crate::memory::Message;

pub struct TextGenerator {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl TextGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 调用一次 LLM；超时返回 NetworkTimeout，后端错误返回 LlmError
    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));

        match timeout(self.timeout, self.llm.complete(&messages)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(AgentError::LlmError(e)),
            Err(_) => Err(AgentError::NetworkTimeout),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.llm.token_usage()
    }
}
