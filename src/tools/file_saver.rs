//! 文件保存工具：把内容写入工作目录，并以 artifact_path 报告产物

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::schema::{params_schema, parse_params, FileSaverParams};
use crate::tools::{Tool, Workspace};

pub struct FileSaverTool {
    workspace: Workspace,
}

impl FileSaverTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileSaverTool {
    fn name(&self) -> &str {
        "file_saver"
    }

    fn description(&self) -> &str {
        "Save content to a file in the workspace and return its path."
    }

    fn parameters_schema(&self) -> Value {
        params_schema::<FileSaverParams>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let params: FileSaverParams = parse_params(self.name(), args)?;
        let path = self.workspace.write(&params.path, &params.content).await?;
        let path = path.to_string_lossy().to_string();
        Ok(json!({
            "success": true,
            "result": format!("Saved {} bytes to {}", params.content.len(), path),
            "artifact_path": path,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_saves_and_reports_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSaverTool::new(Workspace::new(dir.path()));
        let out = tool
            .execute(json!({"path": "docs/notes.md", "content": "# hi"}))
            .await
            .unwrap();
        let path = out["artifact_path"].as_str().unwrap();
        assert!(path.ends_with("docs/notes.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# hi");
    }

    #[tokio::test]
    async fn test_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileSaverTool::new(Workspace::new(dir.path()));
        let err = tool
            .execute(json!({"path": "../x.txt", "content": ""}))
            .await
            .unwrap_err();
        assert!(err.contains("escapes"));
    }
}
