//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 ReAct 循环决定是注入纠正提示、作为 Observation 继续，还是终止本次运行。

use crate::core::{AgentError, RecoveryAction};

/// 模型输出无法解析时追加到历史中的纠正提示
pub const FORMAT_HINT: &str = "[System: Please provide either an Action with Action Input, or a Final Answer]";

/// 语义化错误恢复：解析错误 -> 纠正提示；工具错误 -> Observation；生成端口错误 -> 终止
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        if err.is_fatal() {
            return RecoveryAction::Abort;
        }
        match err {
            AgentError::ParseError(_) => RecoveryAction::RetryWithPrompt(FORMAT_HINT.to_string()),
            _ => RecoveryAction::Observe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_parse_error() {
        let engine = RecoveryEngine::new();
        let action = engine.handle(&AgentError::ParseError("???".to_string()));
        assert_eq!(action, RecoveryAction::RetryWithPrompt(FORMAT_HINT.to_string()));
    }

    #[test]
    fn test_recovery_hallucinated_tool() {
        let engine = RecoveryEngine::new();
        let action = engine.handle(&AgentError::HallucinatedTool("fake_tool".to_string()));
        assert_eq!(action, RecoveryAction::Observe);
    }

    #[test]
    fn test_recovery_tool_timeout() {
        let engine = RecoveryEngine::new();
        let action = engine.handle(&AgentError::ToolTimeout("python_execute".to_string()));
        assert_eq!(action, RecoveryAction::Observe);
    }

    #[test]
    fn test_recovery_llm_error_aborts() {
        let engine = RecoveryEngine::new();
        let err = AgentError::LlmError("quota exceeded".to_string());
        assert!(err.is_fatal());
        assert_eq!(engine.handle(&err), RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_cancelled() {
        let engine = RecoveryEngine::new();
        assert_eq!(engine.handle(&AgentError::Cancelled), RecoveryAction::Abort);
        assert_eq!(AgentError::Cancelled.abort_reason(), "cancelled");
        assert_eq!(AgentError::NetworkTimeout.abort_reason(), "generation_failed");
    }

    #[test]
    fn test_recovery_network_timeout_is_fatal() {
        let engine = RecoveryEngine::new();
        let err = AgentError::NetworkTimeout;
        assert!(err.is_fatal());
        assert_eq!(engine.handle(&err), RecoveryAction::Abort);
    }
}
