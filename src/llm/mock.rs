//! Mock LLM 客户端（用于本地演示与测试，无需 API）
//!
//! - MockLlmClient：把最后一条 User 消息包装成 ReAct 格式的 Final Answer
//! - ScriptedLlmClient：按顺序返回预置回复，并记录每次收到的 prompt，便于断言调用次数与内容

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// Mock 客户端：以 Final Answer 回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        let first_line = last_user.lines().next().unwrap_or_default();

        Ok(format!(
            "Thought: Mock backend, no tools needed.\nFinal Answer: Echo from Mock: {}",
            first_line
        ))
    }
}

/// 脚本化客户端：依次弹出预置回复；脚本耗尽后返回 fallback（默认报错）
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Vec<Message>>>,
    fallback: Option<String>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Default::default()
        }
    }

    /// 脚本耗尽后一直返回同一条回复
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// 在脚本末尾追加一次失败
    pub fn then_fail(self, error: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(error.into()));
        }
        self
    }

    /// 已发生的调用次数
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// 每次调用中最后一条 User 消息的内容
    pub fn user_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|all| {
                all.iter()
                    .filter_map(|msgs| {
                        msgs.iter()
                            .rev()
                            .find(|m| m.role == Role::User)
                            .map(|m| m.content.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err("script exhausted".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_final_answer() {
        let out = MockLlmClient
            .complete(&[Message::user("hello\nworld")])
            .await
            .unwrap();
        assert!(out.contains("Final Answer: Echo from Mock: hello"));
    }

    #[tokio::test]
    async fn test_scripted_replays_then_fails() {
        let llm = ScriptedLlmClient::new(["one"]).then_fail("quota");
        assert_eq!(llm.complete(&[Message::user("a")]).await.unwrap(), "one");
        assert_eq!(llm.complete(&[Message::user("b")]).await.unwrap_err(), "quota");
        assert!(llm.complete(&[Message::user("c")]).await.is_err());
        assert_eq!(llm.calls(), 3);
        assert_eq!(llm.user_prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_scripted_fallback() {
        let llm = ScriptedLlmClient::new(Vec::<String>::new()).with_fallback("again");
        assert_eq!(llm.complete(&[]).await.unwrap(), "again");
        assert_eq!(llm.complete(&[]).await.unwrap(), "again");
    }
}
