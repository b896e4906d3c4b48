//! 会话历史
//!
//! 会话只追加、不原地修改；超过 max_turns 轮时丢弃最旧的消息。
//! 任务提交时以快照（Vec<Message>）形式随 Task 进入循环。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 把最近 limit 条消息渲染为 `Role: content` 文本块，用于拼接 prompt
pub fn render_transcript(messages: &[Message], limit: usize) -> String {
    let start = messages.len().saturating_sub(limit);
    messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 会话记忆：最近 N 轮（每轮 user + assistant，约 max_turns*2 条消息）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 当前会话快照，交给 Task 使用
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    fn prune(&mut self) {
        let keep = self.max_turns * 2;
        if self.messages.len() > keep {
            self.messages.drain(..self.messages.len() - keep);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_latest_turns() {
        let mut memory = ConversationMemory::new(1);
        memory.push(Message::user("a"));
        memory.push(Message::assistant("b"));
        memory.push(Message::user("c"));
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.messages()[0].content, "b");
        assert_eq!(memory.messages()[1].content, "c");
    }

    #[test]
    fn test_render_transcript_limits_messages() {
        let messages = vec![
            Message::user("first"),
            Message::assistant("second"),
            Message::user("third"),
        ];
        let text = render_transcript(&messages, 2);
        assert_eq!(text, "Assistant: second\nUser: third");
        assert_eq!(render_transcript(&[], 4), "");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::system("x")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"x"}"#);
    }
}
