//! 认知层：响应解析、ReAct 提示词与主循环

pub mod events;
pub mod loop_;
pub mod parser;
pub mod prompt;
pub mod task_plan;

pub use events::ReactEvent;
pub use loop_::{LoopState, ReactAgent, TraceEntry, DEFAULT_MAX_ITERATIONS};
pub use parser::{
    extract_code_block, extract_thought, parse, parse_parameters, ActionRequest, ParsedStep,
    PARAM_PARSERS,
};
