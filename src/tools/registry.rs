//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry
//! 按注册顺序保存；名称解析（精确 -> 归一化精确 -> 子串包含）是对注册名列表的纯函数，
//! 因此同一工具集与同一请求名总是解析到同一工具。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON 对象）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（Action 中引用的名字）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 本工具的调用超时（秒）；None 时用分发器的统一超时。内部还要调用生成端口的工具需覆盖
    fn timeout_secs(&self) -> Option<u64> {
        None
    }

    /// 执行工具：成功返回结构化结果（可带 content / result / artifact_path / success / error），
    /// 失败返回错误描述
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// 名称归一化：小写并去掉下划线、连字符与空白
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// 在注册名列表中解析请求名，返回命中的下标
///
/// 依次尝试：忽略大小写精确匹配、归一化后精确匹配、归一化后任一方向子串包含；每一轮按注册顺序取第一个。
pub fn resolve_tool_name<S: AsRef<str>>(requested: &str, registered: &[S]) -> Option<usize> {
    let requested = requested.trim();
    let wanted = normalize(requested);
    if wanted.is_empty() {
        return None;
    }

    if let Some(i) = registered
        .iter()
        .position(|n| n.as_ref().eq_ignore_ascii_case(requested))
    {
        return Some(i);
    }

    let normalized: Vec<String> = registered.iter().map(|n| normalize(n.as_ref())).collect();
    if let Some(i) = normalized.iter().position(|n| *n == wanted) {
        return Some(i);
    }

    normalized
        .iter()
        .position(|n| !n.is_empty() && (n.contains(&wanted) || wanted.contains(n.as_str())))
}

/// 工具注册表：按注册顺序保存 Arc<dyn Tool>；运行期间只读
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名工具原位替换，不改变顺序
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    /// 精确名查找
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// 模糊解析（见 resolve_tool_name）
    pub fn resolve(&self, requested: &str) -> Option<Arc<dyn Tool>> {
        let names = self.tool_names();
        resolve_tool_name(requested, &names).map(|i| Arc::clone(&self.tools[i]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// prompt 中的 Available Tools 段落：`- name: description (Parameters: a, b)`
    pub fn describe_tools(&self) -> String {
        self.tools
            .iter()
            .map(|tool| {
                let schema = tool.parameters_schema();
                let params: Vec<&str> = schema
                    .get("properties")
                    .and_then(|p| p.as_object())
                    .map(|props| props.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                if params.is_empty() {
                    format!("- {}: {}", tool.name(), tool.description())
                } else {
                    format!(
                        "- {}: {} (Parameters: {})",
                        tool.name(),
                        tool.description(),
                        params.join(", ")
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
