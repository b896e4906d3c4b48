//! Echo 工具（调试用）

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::schema::{params_schema, parse_params, EchoParams};
use crate::tools::Tool;

/// Echo 工具：以 result 字段回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back (for testing)."
    }

    fn parameters_schema(&self) -> Value {
        params_schema::<EchoParams>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let params: EchoParams = parse_params(self.name(), args)?;
        Ok(json!({ "result": params.text.unwrap_or_else(|| "(empty)".to_string()) }))
    }
}
