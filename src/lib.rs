//! OpenAgent - 工具增强的推理智能体
//!
//! 模块划分：
//! - **agent**: Agent 统一接口、组件构建、交互会话
//! - **artifacts**: 产物提取与最近产物历史
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、恢复引擎、任务输入输出
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）、文本生成端口
//! - **memory**: 会话历史
//! - **react**: 响应解析与 ReAct 主循环
//! - **tools**: Tool 端口、注册表、分发器与内置工具
//! - **workflow**: SWE 分阶段工作流（Understand / Plan / Implement / Verify / Iterate）

pub mod agent;
pub mod artifacts;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
pub mod workflow;

pub use agent::{Agent, AgentComponents, AgentSession};
pub use core::{AgentError, AgentType, Task, TaskOutput};
