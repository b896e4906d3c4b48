//! OpenAI 兼容后端
//!
//! 走 chat completions 接口，base_url 可指向任意兼容服务（本地推理、代理等）。
//! 每次响应的 usage 累加到客户端内部计数器。

use std::sync::atomic::{AtomicU64, Ordering};

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::LlmSection;
use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// 累计 token 用量快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt + self.completion
    }
}

#[derive(Debug, Default)]
struct UsageCounter {
    prompt: AtomicU64,
    completion: AtomicU64,
}

impl UsageCounter {
    fn add(&self, prompt: u64, completion: u64) {
        self.prompt.fetch_add(prompt, Ordering::Relaxed);
        self.completion.fetch_add(completion, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TokenUsage {
        TokenUsage {
            prompt: self.prompt.load(Ordering::Relaxed),
            completion: self.completion.load(Ordering::Relaxed),
        }
    }
}

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    usage: UsageCounter,
}

impl OpenAiClient {
    /// 按 [llm] 段构建；api_key 由调用方从环境读取
    pub fn from_section(section: &LlmSection, api_key: &str) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = section.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            config = config.with_api_base(url);
        }
        Self {
            client: Client::with_config(config),
            model: section.model.clone(),
            usage: UsageCounter::default(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn to_request_message(m: &Message) -> Result<ChatCompletionRequestMessage, String> {
    let content = m.content.clone();
    let built = match m.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map(ChatCompletionRequestMessage::System),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map(ChatCompletionRequestMessage::User),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()
            .map(ChatCompletionRequestMessage::Assistant),
    };
    built.map_err(|e| format!("Invalid chat message: {}", e))
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(|e| format!("Invalid chat request: {}", e))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| format!("Chat completion failed: {}", e))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
            tracing::debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion usage"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "Chat completion returned no content".to_string())
    }

    fn token_usage(&self) -> TokenUsage {
        self.usage.snapshot()
    }
}
