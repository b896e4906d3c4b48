//! 运行过程事件：CLI `--verbose` 等前端按需订阅，展示思考、工具调用、观察与结束状态

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 迭代计数更新
    StepUpdate { step: usize, max_steps: usize },
    /// 正在调用文本生成端口
    Thinking,
    /// 模型的思考内容
    ThinkingContent { text: String },
    /// 调用工具
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 工具执行失败
    ToolFailure { tool: String, reason: String },
    /// 错误恢复动作（RetryWithPrompt / Observe）
    Recovery { action: String, detail: String },
    /// 工作流阶段开始
    PhaseStarted { phase: String },
    /// 最终回复
    FinalAnswer { text: String },
    /// 达到迭代上限
    Exhausted { iterations: usize },
    Error { text: String },
}
