//! 任务输入与输出
//!
//! Task 在循环开始后不可变（循环只拿 &Task）；TaskOutput 携带 success / result / error 与元数据，
//! 元数据总是包含 agent_type，其余字段取决于运行的是 ReAct 循环还是分阶段工作流。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifacts::ArtifactBundle;
use crate::memory::Message;
use crate::react::TraceEntry;
use crate::workflow::{PhaseRecord, TaskAnalysis, Verification};

/// 控制策略：ReAct 推理循环 / SWE 分阶段工作流
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    #[default]
    React,
    Swe,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::React => "react",
            AgentType::Swe => "swe",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "react" => Ok(AgentType::React),
            "swe" => Ok(AgentType::Swe),
            other => Err(format!("Unknown agent type: {other} (expected react or swe)")),
        }
    }
}

/// 提交给智能体的任务
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub conversation: Vec<Message>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_conversation(mut self, conversation: Vec<Message>) -> Self {
        self.conversation = conversation;
        self
    }
}

/// 运行元数据；未设置的字段序列化时省略
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskMetadata {
    pub agent_type: AgentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_errors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TaskAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_applied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phases: Option<Vec<PhaseRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactBundle>,
}

impl TaskMetadata {
    pub fn new(agent_type: AgentType) -> Self {
        Self {
            agent_type,
            ..Default::default()
        }
    }
}

/// 任务结果：失败时 result 为 None、error 为可读错误信息，元数据中尽量保留部分 trace / plan
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutput {
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<String>,
    pub metadata: TaskMetadata,
}

impl TaskOutput {
    pub fn success(result: impl Into<String>, metadata: TaskMetadata) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            metadata,
        }
    }

    pub fn failure(error: impl Into<String>, metadata: TaskMetadata) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            metadata,
        }
    }
}
