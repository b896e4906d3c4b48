//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：解析失败、工具失败在循环内被吸收（RetryWithPrompt），
//! 只有文本生成端口失败会终止当前运行（Abort）。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（生成端口、解析、工具、取消）
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Network timeout")]
    NetworkTimeout,

    #[error("LLM error: {0}")]
    LlmError(String),

    /// 模型输出既不是 Action 也不是 Final Answer
    #[error("Unparseable model response: {0}")]
    ParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    /// 是否为「运行级」致命错误：只有生成端口失败与取消会越过循环边界
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::NetworkTimeout | AgentError::LlmError(_) | AgentError::Cancelled
        )
    }

    /// 运行终止时写入 metadata.reason 的值
    pub fn abort_reason(&self) -> &'static str {
        match self {
            AgentError::Cancelled => "cancelled",
            _ => "generation_failed",
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 将提示注入下一轮历史，让模型重试（格式错误）
    RetryWithPrompt(String),
    /// 错误已作为 Observation 交给模型，计数后继续（工具失败、工具不存在）
    Observe,
    /// 终止当前任务
    Abort,
}
