//! 核心层：任务输入输出、错误与恢复

pub mod error;
pub mod recovery;
pub mod task;

pub use error::{AgentError, RecoveryAction};
pub use recovery::{RecoveryEngine, FORMAT_HINT};
pub use task::{AgentType, Task, TaskMetadata, TaskOutput};
