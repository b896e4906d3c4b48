//! 代码生成工具：调用文本生成端口写代码，保存到工作目录 code/ 下
//!
//! 返回 `{content, artifact_path, language}`；工作流 Implement 阶段把 content 记为当前代码，
//! artifact_path 记为产物文件。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::TextGenerator;
use crate::react::extract_code_block;
use crate::tools::schema::{params_schema, parse_params, CodeGeneratorParams};
use crate::tools::{Tool, Workspace};

/// 生成之外留给写文件的时间（秒）
const WRITE_GRACE_SECS: u64 = 5;

const CODE_SYSTEM_PROMPT: &str = "You are an expert programmer. Respond with a single fenced code block containing complete, runnable code and nothing else.";

pub struct CodeGeneratorTool {
    generator: Arc<TextGenerator>,
    workspace: Workspace,
}

impl CodeGeneratorTool {
    pub fn new(generator: Arc<TextGenerator>, workspace: Workspace) -> Self {
        Self {
            generator,
            workspace,
        }
    }
}

/// 语言 → 文件扩展名
pub fn extension_for(language: &str) -> &'static str {
    match language.trim().to_lowercase().as_str() {
        "python" | "py" => "py",
        "javascript" | "js" | "node" => "js",
        "typescript" | "ts" => "ts",
        "html" => "html",
        "css" => "css",
        "bash" | "shell" | "sh" => "sh",
        "rust" | "rs" => "rs",
        "markdown" | "md" => "md",
        "json" => "json",
        _ => "txt",
    }
}

#[async_trait]
impl Tool for CodeGeneratorTool {
    fn name(&self) -> &str {
        "code_generator"
    }

    fn description(&self) -> &str {
        "Generate code for a described feature in the given language and save it to a file."
    }

    fn parameters_schema(&self) -> Value {
        params_schema::<CodeGeneratorParams>()
    }

    /// 至少覆盖一次生成请求的超时
    fn timeout_secs(&self) -> Option<u64> {
        Some(self.generator.timeout().as_secs() + WRITE_GRACE_SECS)
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let params: CodeGeneratorParams = parse_params(self.name(), args)?;
        let language = params
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "python".to_string());

        let prompt = format!(
            "Write {} code for the following task:\n\n{}\n\nInclude necessary imports and a runnable entry point where applicable.",
            language, params.description
        );
        let response = self
            .generator
            .generate(&prompt, Some(CODE_SYSTEM_PROMPT))
            .await
            .map_err(|e| e.to_string())?;
        let code = extract_code_block(&response).unwrap_or_else(|| response.trim().to_string());

        let filename = params.filename.filter(|f| !f.trim().is_empty()).unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("generated_{}.{}", &id[..8], extension_for(&language))
        });
        let path = self
            .workspace
            .write(&format!("code/{}", filename), &code)
            .await?;

        Ok(json!({
            "success": true,
            "content": code,
            "artifact_path": path.to_string_lossy(),
            "language": language,
        }))
    }
}
