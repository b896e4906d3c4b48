//! 工具层：Tool 端口、注册表、分发器与内置工具

pub mod code_generator;
pub mod dispatcher;
pub mod echo;
pub mod file_saver;
pub mod python_execute;
pub mod registry;
pub mod result;
pub mod schema;
pub mod workspace;

pub use code_generator::CodeGeneratorTool;
pub use dispatcher::{ActionDispatcher, Invocation, ToolOutcome, DEFAULT_OBSERVATION_MAX_CHARS};
pub use echo::EchoTool;
pub use file_saver::FileSaverTool;
pub use python_execute::PythonExecuteTool;
pub use registry::{resolve_tool_name, Tool, ToolRegistry};
pub use result::{truncate_chars, ToolResult, TRUNCATION_MARKER};
pub use workspace::Workspace;
