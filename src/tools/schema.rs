//! 工具参数 JSON Schema 生成（schemars）
//!
//! 内置工具的参数结构体同时用于反序列化 args 与生成 parameters_schema，保证两者一致。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// echo 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EchoParams {
    /// 要回显的文本
    pub text: Option<String>,
}

/// file_saver 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileSaverParams {
    /// 工作目录下的相对路径
    pub path: String,
    /// 文件内容
    pub content: String,
}

/// python_execute 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PythonExecuteParams {
    /// 要执行的 Python 源码
    pub code: String,
}

/// code_generator 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CodeGeneratorParams {
    /// 需要生成的代码功能描述
    pub description: String,
    /// 编程语言，默认 python
    pub language: Option<String>,
    /// 保存的文件名（相对 code 目录），缺省时自动生成
    pub filename: Option<String>,
}

/// 参数结构体的 JSON Schema
pub fn params_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| {
        serde_json::json!({ "type": "object", "properties": {}, "required": [] })
    })
}

/// 把 args 反序列化为参数结构体；失败时给出可读错误（进入 Observation）
pub fn parse_params<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid parameters for {}: {}", tool, e))
}
