//! Action 分发器
//!
//! 持有 ToolRegistry 与全局超时：invoke(name, params) 先模糊解析工具名，再在超时内执行并捕获 panic，
//! 结果统一为 Invocation；dispatch 在此基础上生成 Observation 文本。任何失败都不会以错误返回，
//! 而是写进 Observation，让循环继续推理。每次调用输出结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{ToolRegistry, ToolResult};

/// Observation 中 content 的默认最大字符数
pub const DEFAULT_OBSERVATION_MAX_CHARS: usize = 2000;

/// 单次调用的结果形态
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// 请求名无法解析到任何已注册工具
    Unresolved {
        requested: String,
        available: Vec<String>,
    },
    /// 工具返回 Err、超时或 panic
    Failed { error: AgentError },
    /// 工具返回了结构化结果（其中仍可能带 error 字段）
    Completed(ToolResult),
}

/// 一次分发的完整记录
#[derive(Debug, Clone)]
pub struct Invocation {
    /// 实际命中的工具名
    pub tool: Option<String>,
    pub outcome: ToolOutcome,
}

impl Invocation {
    /// 转为 Observation 文本
    pub fn observation(&self, max_chars: usize) -> String {
        match &self.outcome {
            ToolOutcome::Unresolved {
                requested,
                available,
            } => format!(
                "Error: Tool '{}' not found. Available tools: [{}]",
                requested,
                available.join(", ")
            ),
            ToolOutcome::Failed { error } => format!("Tool Execution Error: {}", error),
            ToolOutcome::Completed(result) => result.to_observation(max_chars),
        }
    }

    /// 转为结构化结果（工作流 Implement / Verify 阶段使用）
    pub fn to_tool_result(&self) -> ToolResult {
        match &self.outcome {
            ToolOutcome::Unresolved { requested, .. } => {
                ToolResult::failure(format!("Tool '{}' not found", requested))
            }
            ToolOutcome::Failed { error } => ToolResult::failure(error.to_string()),
            ToolOutcome::Completed(result) => result.clone(),
        }
    }

    /// 可恢复的工具错误（供循环计数与 RecoveryEngine 分类）
    pub fn error(&self) -> Option<AgentError> {
        match &self.outcome {
            ToolOutcome::Unresolved { requested, .. } => {
                Some(AgentError::HallucinatedTool(requested.clone()))
            }
            ToolOutcome::Failed { error } => Some(error.clone()),
            ToolOutcome::Completed(result) => result
                .error
                .clone()
                .map(AgentError::ToolExecutionFailed),
        }
    }

    /// 结果中的产物路径
    pub fn artifact_path(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Completed(result) if result.success => result.artifact_path.as_deref(),
            _ => None,
        }
    }
}

/// Action 分发器：解析工具名、施加超时、捕获 panic、归一化结果
pub struct ActionDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    observation_max_chars: usize,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            observation_max_chars: DEFAULT_OBSERVATION_MAX_CHARS,
        }
    }

    pub fn with_observation_max_chars(mut self, max_chars: usize) -> Self {
        self.observation_max_chars = max_chars;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 解析请求名（精确 -> 归一化 -> 子串）
    pub fn resolve_name(&self, requested: &str) -> Option<String> {
        self.registry.resolve(requested).map(|t| t.name().to_string())
    }

    /// 执行一次调用，不返回错误
    pub async fn invoke(&self, name: &str, params: Map<String, Value>) -> Invocation {
        let Some(tool) = self.registry.resolve(name) else {
            tracing::warn!(requested = %name, "tool not found");
            return Invocation {
                tool: None,
                outcome: ToolOutcome::Unresolved {
                    requested: name.to_string(),
                    available: self.registry.tool_names(),
                },
            };
        };
        let tool_name = tool.name().to_string();
        let args = Value::Object(params);
        let args_preview = args_preview(&args);
        let start = Instant::now();

        let call = AssertUnwindSafe(tool.execute(args)).catch_unwind();
        let limit = tool
            .timeout_secs()
            .map(Duration::from_secs)
            .unwrap_or(self.timeout);
        let outcome = match timeout(limit, call).await {
            Ok(Ok(Ok(value))) => ToolOutcome::Completed(ToolResult::from_value(value)),
            Ok(Ok(Err(e))) => ToolOutcome::Failed {
                error: AgentError::ToolExecutionFailed(e),
            },
            Ok(Err(panic)) => ToolOutcome::Failed {
                error: AgentError::ToolExecutionFailed(panic_message(panic.as_ref())),
            },
            Err(_) => ToolOutcome::Failed {
                error: AgentError::ToolTimeout(tool_name.clone()),
            },
        };

        let outcome_label = match &outcome {
            ToolOutcome::Completed(r) if r.success => "ok",
            ToolOutcome::Completed(_) => "error",
            ToolOutcome::Failed {
                error: AgentError::ToolTimeout(_),
            } => "timeout",
            _ => "failed",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "requested": name,
            "outcome": outcome_label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        Invocation {
            tool: Some(tool_name),
            outcome,
        }
    }

    /// 执行并直接返回 Observation 文本
    pub async fn dispatch(&self, name: &str, params: Map<String, Value>) -> String {
        self.invoke(name, params)
            .await
            .observation(self.observation_max_chars)
    }

    pub fn observation_max_chars(&self) -> usize {
        self.observation_max_chars
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("tool panicked: {}", s)
    } else {
        "tool panicked".to_string()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, Tool};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedTool {
        name: &'static str,
        reply: Result<Value, String>,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed reply"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            self.reply.clone()
        }
    }

    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn name(&self) -> &str {
            "explode"
        }

        fn description(&self) -> &str {
            "always panics"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            panic!("kaboom")
        }
    }

    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "never finishes in time"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({}))
        }
    }

    /// 与 SleepyTool 相同的耗时，但声明了更长的超时
    struct PatientTool;

    #[async_trait]
    impl Tool for PatientTool {
        fn name(&self) -> &str {
            "patient"
        }

        fn description(&self) -> &str {
            "slower than the default limit"
        }

        fn timeout_secs(&self) -> Option<u64> {
            Some(5)
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            Ok(json!({"result": "done"}))
        }
    }

    fn dispatcher(tools: Vec<Arc<dyn Tool>>) -> ActionDispatcher {
        let mut registry = ToolRegistry::new();
        for t in tools {
            registry.register_arc(t);
        }
        ActionDispatcher::new(Arc::new(registry), 1)
    }

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_dispatch_fuzzy_name() {
        let d = dispatcher(vec![Arc::new(FixedTool {
            name: "google_search",
            reply: Ok(json!({"result": "found"})),
        })]);
        let inv = d.invoke("GoogleSearch", Map::new()).await;
        assert_eq!(inv.tool.as_deref(), Some("google_search"));
        assert_eq!(inv.observation(2000), "found");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_lists_available() {
        let d = dispatcher(vec![Arc::new(EchoTool)]);
        let obs = d.dispatch("browser", Map::new()).await;
        assert_eq!(obs, "Error: Tool 'browser' not found. Available tools: [echo]");
        let inv = d.invoke("browser", Map::new()).await;
        assert!(matches!(inv.error(), Some(AgentError::HallucinatedTool(_))));
        assert!(!inv.to_tool_result().success);
    }

    #[tokio::test]
    async fn test_dispatch_tool_err_becomes_observation() {
        let d = dispatcher(vec![Arc::new(FixedTool {
            name: "python_execute",
            reply: Err("SyntaxError".to_string()),
        })]);
        let obs = d.dispatch("python_execute", Map::new()).await;
        assert_eq!(obs, "Tool Execution Error: Tool execution failed: SyntaxError");
    }

    #[tokio::test]
    async fn test_dispatch_error_field() {
        let d = dispatcher(vec![Arc::new(FixedTool {
            name: "file_saver",
            reply: Ok(json!({"error": "disk full"})),
        })]);
        let inv = d.invoke("file_saver", Map::new()).await;
        assert_eq!(inv.observation(2000), "Tool Error: disk full");
        assert!(matches!(inv.error(), Some(AgentError::ToolExecutionFailed(_))));
    }

    #[tokio::test]
    async fn test_dispatch_catches_panic() {
        let d = dispatcher(vec![Arc::new(PanicTool)]);
        let obs = d.dispatch("explode", Map::new()).await;
        assert!(obs.starts_with("Tool Execution Error:"));
        assert!(obs.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let d = dispatcher(vec![Arc::new(SleepyTool)]);
        let inv = d.invoke("sleepy", Map::new()).await;
        assert!(matches!(inv.error(), Some(AgentError::ToolTimeout(_))));
        assert!(inv.observation(2000).starts_with("Tool Execution Error: Tool timeout"));
    }

    #[tokio::test]
    async fn test_dispatch_honors_tool_timeout() {
        let d = dispatcher(vec![Arc::new(PatientTool)]);
        let inv = d.invoke("patient", Map::new()).await;
        assert!(inv.error().is_none());
        assert_eq!(inv.observation(2000), "done");
    }

    #[tokio::test]
    async fn test_dispatch_passes_params_and_artifact() {
        let d = dispatcher(vec![
            Arc::new(EchoTool),
            Arc::new(FixedTool {
                name: "code_generator",
                reply: Ok(json!({"content": "print(1)", "artifact_path": "out/a.py"})),
            }),
        ]);
        let obs = d.dispatch("echo", params(json!({"text": "hi"}))).await;
        assert_eq!(obs, "hi");
        let inv = d.invoke("code_generator", Map::new()).await;
        assert_eq!(inv.artifact_path(), Some("out/a.py"));
    }
}
