//! 分阶段工作流的数据类型
//!
//! WorkflowContext 属于单次运行，以 `&mut` 依次传过各阶段函数；execution_trace 只追加。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolResult;

/// 语言未指定时模型给出的占位值
pub const LANGUAGE_NOT_SPECIFIED: &str = "not specified";

/// 工作流阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Understand,
    Plan,
    Implement,
    Verify,
    /// 第 n 次修复（从 1 开始）
    Iterate(usize),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Understand => f.write_str("UNDERSTAND"),
            Phase::Plan => f.write_str("PLAN"),
            Phase::Implement => f.write_str("IMPLEMENT"),
            Phase::Verify => f.write_str("VERIFY"),
            Phase::Iterate(n) => write!(f, "ITERATE_{}", n),
        }
    }
}

/// Understand 阶段的分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub task_type: String,
    pub language: String,
    pub requirements: Vec<String>,
    pub complexity: String,
    pub dependencies: Vec<String>,
}

impl Default for TaskAnalysis {
    fn default() -> Self {
        Self {
            task_type: "code_generation".to_string(),
            language: "python".to_string(),
            requirements: Vec::new(),
            complexity: "moderate".to_string(),
            dependencies: Vec::new(),
        }
    }
}

impl TaskAnalysis {
    /// 明确指定的语言（"not specified" 视为未指定）
    pub fn specified_language(&self) -> Option<&str> {
        let lang = self.language.trim();
        (!lang.is_empty() && !lang.eq_ignore_ascii_case(LANGUAGE_NOT_SPECIFIED)).then_some(lang)
    }
}

/// 验证结果；没有可执行的东西时为空洞成功
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub success: bool,
    pub output: String,
    pub errors: Vec<String>,
}

impl Default for Verification {
    fn default() -> Self {
        Self {
            success: true,
            output: String::new(),
            errors: Vec::new(),
        }
    }
}

impl Verification {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            errors: vec![error.into()],
        }
    }
}

/// Implement 阶段单步记录
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub tool: String,
    pub params: Map<String, Value>,
    pub result: ToolResult,
}

/// 阶段执行记录
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub phase: String,
    pub result: Value,
}

/// 单次工作流运行的上下文
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    pub task: String,
    pub analysis: TaskAnalysis,
    pub plan: Vec<String>,
    pub generated_code: String,
    pub generated_files: Vec<String>,
    pub verification: Verification,
    pub step_results: Vec<StepRecord>,
    pub fix_applied: bool,
    pub fix_explanation: Option<String>,
    /// 已完成的修复次数
    pub iterations: usize,
    execution_trace: Vec<PhaseRecord>,
}

impl WorkflowContext {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    /// 追加阶段记录
    pub fn record(&mut self, phase: Phase, result: impl Serialize) {
        let result = serde_json::to_value(result).unwrap_or(Value::Null);
        self.execution_trace.push(PhaseRecord {
            phase: phase.to_string(),
            result,
        });
    }

    pub fn execution_trace(&self) -> &[PhaseRecord] {
        &self.execution_trace
    }

    /// 当前代码语言（小写）
    pub fn language(&self) -> String {
        self.analysis.language.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Understand.to_string(), "UNDERSTAND");
        assert_eq!(Phase::Iterate(3).to_string(), "ITERATE_3");
    }

    #[test]
    fn test_trace_is_append_only() {
        let mut ctx = WorkflowContext::new("t");
        ctx.record(Phase::Understand, &ctx.analysis.clone());
        ctx.record(Phase::Plan, vec!["a", "b"]);
        let phases: Vec<&str> = ctx.execution_trace().iter().map(|r| r.phase.as_str()).collect();
        assert_eq!(phases, vec!["UNDERSTAND", "PLAN"]);
        assert_eq!(ctx.execution_trace()[1].result, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_specified_language() {
        let mut analysis = TaskAnalysis::default();
        assert_eq!(analysis.specified_language(), Some("python"));
        analysis.language = "Not Specified".to_string();
        assert_eq!(analysis.specified_language(), None);
    }
}
