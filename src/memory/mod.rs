//! 记忆层：会话历史（仅保留构造 prompt 所需的部分）

pub mod conversation;

pub use conversation::{render_transcript, ConversationMemory, Message, Role};
