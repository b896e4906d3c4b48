//! Agent 运行时
//!
//! - `Agent`：两种控制策略（ReAct 循环 / SWE 工作流）的统一入口，`run(&Task) -> TaskOutput`
//! - `AgentComponents`：从配置构建文本生成端口、工具注册表与分发器，可在多次运行间共享
//! - `AgentSession`：持有会话历史与最近产物历史，`submit` 提交一条用户输入

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::artifacts::{ArtifactBundle, ArtifactHistory};
use crate::config::AppConfig;
use crate::core::{AgentType, Task, TaskMetadata, TaskOutput};
use crate::llm::{create_llm_from_config, LlmClient, TextGenerator};
use crate::memory::{ConversationMemory, Message};
use crate::react::{ReactAgent, ReactEvent};
use crate::tools::{
    ActionDispatcher, CodeGeneratorTool, EchoTool, FileSaverTool, PythonExecuteTool,
    ToolRegistry, Workspace,
};
use crate::workflow::{SweAgent, SweSettings};

/// 控制策略的统一接口；失败以 TaskOutput 表达，不返回 Err
#[async_trait]
pub trait Agent: Send + Sync {
    fn agent_type(&self) -> AgentType;

    async fn run(&self, task: &Task) -> TaskOutput;
}

/// 内置工具：echo / file_saver / python_execute / code_generator
pub fn default_registry(cfg: &AppConfig, generator: Arc<TextGenerator>) -> ToolRegistry {
    let workspace_root = cfg.app.workspace_root();
    let workspace = Workspace::new(&workspace_root);

    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    tools.register(FileSaverTool::new(workspace.clone()));
    tools.register(
        PythonExecuteTool::new(cfg.tools.python_command.clone(), &workspace_root)
            .with_timeout(cfg.tools.tool_timeout_secs),
    );
    tools.register(CodeGeneratorTool::new(generator, workspace));
    tools
}

/// 预构建的组件：运行期间只读共享
pub struct AgentComponents {
    pub config: AppConfig,
    pub generator: Arc<TextGenerator>,
    pub dispatcher: Arc<ActionDispatcher>,
}

impl AgentComponents {
    /// 按配置选择 LLM 后端并注册内置工具
    pub fn from_config(cfg: AppConfig) -> Self {
        let llm = create_llm_from_config(&cfg);
        let generator = Arc::new(TextGenerator::new(llm, cfg.llm.timeouts.request));
        let registry = default_registry(&cfg, generator.clone());
        Self::new(cfg, generator, registry)
    }

    /// 指定 LLM 与工具注册表（测试、嵌入场景）
    pub fn with_llm(cfg: AppConfig, llm: Arc<dyn LlmClient>, registry: ToolRegistry) -> Self {
        let generator = Arc::new(TextGenerator::new(llm, cfg.llm.timeouts.request));
        Self::new(cfg, generator, registry)
    }

    fn new(cfg: AppConfig, generator: Arc<TextGenerator>, registry: ToolRegistry) -> Self {
        let dispatcher = ActionDispatcher::new(Arc::new(registry), cfg.tools.tool_timeout_secs)
            .with_observation_max_chars(cfg.agent.react.observation_max_chars);
        Self {
            config: cfg,
            generator,
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn swe_settings(&self) -> SweSettings {
        let swe = &self.config.agent.swe;
        SweSettings {
            max_iterations: swe.max_iterations,
            auto_execute: swe.auto_execute,
            executable_languages: swe
                .executable_languages
                .iter()
                .map(|l| l.to_lowercase())
                .collect(),
            execution_tool: swe.execution_tool.clone(),
            fallback_tool: swe.fallback_tool.clone(),
        }
    }

    /// 构建指定策略的 Agent
    pub fn build_agent(
        &self,
        agent_type: AgentType,
        event_tx: Option<UnboundedSender<ReactEvent>>,
        cancel_token: Option<CancellationToken>,
    ) -> Box<dyn Agent> {
        match agent_type {
            AgentType::React => {
                let mut agent = ReactAgent::new(self.generator.clone(), self.dispatcher.clone())
                    .with_max_iterations(self.config.agent.react.max_iterations)
                    .with_conversation_limit(self.config.app.max_context_turns * 2)
                    .with_task_planning(self.config.agent.react.plan_tasks);
                if let Some(tx) = event_tx {
                    agent = agent.with_event_tx(tx);
                }
                if let Some(token) = cancel_token {
                    agent = agent.with_cancel_token(token);
                }
                Box::new(agent)
            }
            AgentType::Swe => {
                let mut agent = SweAgent::new(
                    self.generator.clone(),
                    self.dispatcher.clone(),
                    self.swe_settings(),
                );
                if let Some(tx) = event_tx {
                    agent = agent.with_event_tx(tx);
                }
                if let Some(token) = cancel_token {
                    agent = agent.with_cancel_token(token);
                }
                Box::new(agent)
            }
        }
    }
}

/// 交互会话：会话历史 + 最近产物历史（唯一写者）
pub struct AgentSession {
    components: AgentComponents,
    agent_type: AgentType,
    conversation: ConversationMemory,
    artifacts: ArtifactHistory,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl AgentSession {
    pub fn new(components: AgentComponents, agent_type: AgentType) -> Self {
        let conversation = ConversationMemory::new(components.config.app.max_context_turns);
        let artifacts = ArtifactHistory::new(components.config.app.artifact_history);
        Self {
            components,
            agent_type,
            conversation,
            artifacts,
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    pub fn set_agent_type(&mut self, agent_type: AgentType) {
        self.agent_type = agent_type;
    }

    pub fn conversation(&self) -> &ConversationMemory {
        &self.conversation
    }

    pub fn artifacts(&self) -> &ArtifactHistory {
        &self.artifacts
    }

    pub fn components(&self) -> &AgentComponents {
        &self.components
    }

    /// 提交一条用户输入：若是在请求最近的产物则直接返回路径，否则运行当前策略
    pub async fn submit(
        &mut self,
        description: &str,
        cancel_token: Option<CancellationToken>,
    ) -> TaskOutput {
        if let Some(path) = self.artifacts.artifact_request(description) {
            tracing::info!(path = %path, "artifact request");
            let mut metadata = TaskMetadata::new(self.agent_type);
            let mut bundle = ArtifactBundle::new();
            bundle.insert(crate::artifacts::classify(&path), vec![path.clone()]);
            metadata.artifacts = Some(bundle);
            let reply = format!("Artifact from the previous run: {}", path);
            self.conversation.push(Message::user(description));
            self.conversation.push(Message::assistant(reply.clone()));
            return TaskOutput::success(reply, metadata);
        }

        let task = Task::new(description).with_conversation(self.conversation.snapshot());
        let agent = self
            .components
            .build_agent(self.agent_type, self.event_tx.clone(), cancel_token);
        let output = agent.run(&task).await;

        self.conversation.push(Message::user(description));
        let reply = output
            .result
            .clone()
            .or_else(|| output.error.clone())
            .unwrap_or_default();
        self.conversation.push(Message::assistant(reply));
        if let Some(bundle) = &output.metadata.artifacts {
            self.artifacts.push(description, bundle.clone());
        }
        output
    }

    /// 与 submit 相同，但 `stop` 先完成时取消令牌并等待本次运行收尾（CLI 中 stop 为 Ctrl-C）
    pub async fn submit_until<F>(&mut self, description: &str, stop: F) -> TaskOutput
    where
        F: Future<Output = ()>,
    {
        let token = CancellationToken::new();
        let run = self.submit(description, Some(token.clone()));
        tokio::pin!(run);
        tokio::pin!(stop);
        tokio::select! {
            biased;
            _ = &mut stop => {
                tracing::info!("stop requested, cancelling run");
                token.cancel();
                run.await
            }
            output = &mut run => output,
        }
    }
}
