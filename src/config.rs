//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再叠加 `--config` 指定的文件，最后用环境变量 `OPENAGENT__*` 覆盖
//! （双下划线表示嵌套，如 `OPENAGENT__AGENT__REACT__MAX_ITERATIONS=20`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentType;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "OPENAGENT";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、工作目录、对话轮数上限、产物历史条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 工具写文件的根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 对话历史保留轮数
    pub max_context_turns: usize,
    pub artifact_history: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            workspace_root: None,
            max_context_turns: 20,
            artifact_history: 5,
        }
    }
}

impl AppSection {
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / mock；未设置 OPENAI_API_KEY 时退回 mock
    pub provider: String,
    pub model: String,
    /// OpenAI 兼容服务地址（如本地推理服务）
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次生成请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [agent] 段：默认策略与两种控制循环的边界
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentSection {
    pub default: AgentType,
    pub react: ReactSection,
    pub swe: SweSection,
}

/// [agent.react]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReactSection {
    pub max_iterations: usize,
    /// Observation 中 content 的最大字符数
    pub observation_max_chars: usize,
    /// 循环前先判断是否为多步任务并生成计划（多一次生成调用）
    pub plan_tasks: bool,
}

impl Default for ReactSection {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            observation_max_chars: 2000,
            plan_tasks: false,
        }
    }
}

/// [agent.swe]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweSection {
    /// 最大修复次数
    pub max_iterations: usize,
    pub auto_execute: bool,
    pub executable_languages: Vec<String>,
    pub execution_tool: String,
    pub fallback_tool: String,
}

impl Default for SweSection {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            auto_execute: true,
            executable_languages: vec!["python".into(), "py".into()],
            execution_tool: "python_execute".into(),
            fallback_tool: "code_generator".into(),
        }
    }
}

/// [tools] 段：工具超时与解释器
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub python_command: String,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            python_command: "python3".into(),
        }
    }
}

/// 加载配置，环境变量 OPENAGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignored");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.default, AgentType::React);
        assert_eq!(cfg.agent.react.max_iterations, 10);
        assert_eq!(cfg.agent.react.observation_max_chars, 2000);
        assert!(!cfg.agent.react.plan_tasks);
        assert_eq!(cfg.agent.swe.max_iterations, 5);
        assert_eq!(cfg.agent.swe.fallback_tool, "code_generator");
        assert_eq!(cfg.app.artifact_history, 5);
        assert_eq!(cfg.app.workspace_root(), PathBuf::from("workspace"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[agent]\ndefault = \"swe\"\n[agent.swe]\nmax_iterations = 2\n[tools]\npython_command = \"python\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.agent.default, AgentType::Swe);
        assert_eq!(cfg.agent.swe.max_iterations, 2);
        assert!(cfg.agent.swe.auto_execute);
        assert_eq!(cfg.tools.python_command, "python");
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
    }
}
