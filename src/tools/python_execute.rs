//! Python 执行工具：`python -c <code>`，带超时，返回 stdout / stderr

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::tools::schema::{params_schema, parse_params, PythonExecuteParams};
use crate::tools::Tool;

pub struct PythonExecuteTool {
    python_command: String,
    working_dir: PathBuf,
    timeout_secs: u64,
}

impl PythonExecuteTool {
    pub fn new(python_command: impl Into<String>, working_dir: impl AsRef<Path>) -> Self {
        Self {
            python_command: python_command.into(),
            working_dir: working_dir.as_ref().to_path_buf(),
            timeout_secs: 30,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[async_trait]
impl Tool for PythonExecuteTool {
    fn name(&self) -> &str {
        "python_execute"
    }

    fn description(&self) -> &str {
        "Execute Python code and return its output."
    }

    fn parameters_schema(&self) -> Value {
        params_schema::<PythonExecuteParams>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let params: PythonExecuteParams = parse_params(self.name(), args)?;

        let mut cmd = Command::new(&self.python_command);
        cmd.arg("-c")
            .arg(&params.code)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(
            tokio::time::Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| format!("Python execution timed out after {}s", self.timeout_secs))?
        .map_err(|e| format!("Failed to run {}: {}", self.python_command, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(json!({
                "success": true,
                "result": stdout,
                "output": stdout,
            }))
        } else {
            let exit_code = output.status.code().unwrap_or(-1);
            let error = if stderr.trim().is_empty() {
                format!("Process exited with code {}", exit_code)
            } else {
                stderr
            };
            Ok(json!({
                "success": false,
                "output": stdout,
                "error": error,
                "exit_code": exit_code,
            }))
        }
    }
}
