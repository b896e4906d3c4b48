//! SWE 分阶段工作流：理解 -> 计划 -> 实现 -> 验证 -> 修复

pub mod analysis;
pub mod engine;
pub mod prompt;
pub mod summary;
pub mod types;

pub use analysis::{parse_analysis, parse_plan, parse_tool_selection, MAX_PLAN_STEPS};
pub use engine::{SweAgent, SweSettings};
pub use summary::render_summary;
pub use types::{Phase, PhaseRecord, StepRecord, TaskAnalysis, Verification, WorkflowContext};
