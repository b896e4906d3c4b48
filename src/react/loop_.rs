//! ReAct 主循环
//!
//! Running(i) -> 生成 -> 解析 -> 执行工具 / 注入纠正提示 -> Running(i+1)；
//! 解析到 Final Answer 进入 Done，达到 max_iterations 进入 Exhausted（再调用一次生成端口做总结）。
//! 解析失败与工具失败都在循环内吸收，只有生成端口失败（或取消）会结束本次运行并带回部分 trace。
//! 可选 event_tx：向前端推送 Thinking / ToolCall / Observation / FinalAnswer。
//! 开启任务推断时，循环前先做一次生成调用判断是否为多步任务，计划写入每轮 prompt。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::agent::Agent;
use crate::artifacts;
use crate::core::{
    AgentError, AgentType, RecoveryAction, RecoveryEngine, Task, TaskMetadata, TaskOutput,
};
use crate::llm::TextGenerator;
use crate::react::prompt::{summary_prompt, StepPrompt, REACT_SYSTEM_PROMPT};
use crate::react::task_plan::{parse_task_inference, task_inference_prompt};
use crate::react::{parse, ParsedStep, ReactEvent};
use crate::tools::{truncate_chars, ActionDispatcher};

/// 默认最大迭代次数
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
/// Observation 事件预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;
/// 最近会话渲染条数
const DEFAULT_CONVERSATION_LIMIT: usize = 10;

/// 一次迭代的记录：action 与 final_answer 至多一个
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraceEntry {
    pub thought: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_input: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}

/// 循环状态
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Running(usize),
    Done(String),
    Exhausted(String),
}

/// 单次运行中累积的可变状态（只属于这一次运行）
#[derive(Debug, Default)]
struct RunState {
    trace: Vec<TraceEntry>,
    history: String,
    tools_used: Vec<String>,
    tool_errors: usize,
    artifact_paths: Vec<String>,
    plan: Vec<String>,
}

impl RunState {
    fn metadata(&self, run_id: &str, iterations: usize) -> TaskMetadata {
        let mut metadata = TaskMetadata::new(AgentType::React);
        metadata.run_id = Some(run_id.to_string());
        metadata.iterations = Some(iterations);
        metadata.trace = Some(self.trace.clone());
        metadata.tools_used = Some(self.tools_used.clone());
        metadata.tool_errors = Some(self.tool_errors);
        if !self.plan.is_empty() {
            metadata.plan = Some(self.plan.clone());
        }
        metadata
    }

    fn observations(&self) -> Vec<&str> {
        self.trace
            .iter()
            .filter_map(|t| t.observation.as_deref())
            .collect()
    }
}

/// ReAct 智能体
pub struct ReactAgent {
    generator: Arc<TextGenerator>,
    dispatcher: Arc<ActionDispatcher>,
    recovery: RecoveryEngine,
    max_iterations: usize,
    conversation_limit: usize,
    plan_tasks: bool,
    event_tx: Option<UnboundedSender<ReactEvent>>,
    cancel_token: Option<CancellationToken>,
}

impl ReactAgent {
    pub fn new(generator: Arc<TextGenerator>, dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            generator,
            dispatcher,
            recovery: RecoveryEngine::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            conversation_limit: DEFAULT_CONVERSATION_LIMIT,
            plan_tasks: false,
            event_tx: None,
            cancel_token: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_conversation_limit(mut self, limit: usize) -> Self {
        self.conversation_limit = limit;
        self
    }

    /// 循环前先推断是否为多步任务并生成计划
    pub fn with_task_planning(mut self, enabled: bool) -> Self {
        self.plan_tasks = enabled;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 生成调用；取消令牌触发时放弃等待
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AgentError> {
        match &self.cancel_token {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(AgentError::Cancelled),
                r = self.generator.generate(prompt, system) => r,
            },
            None => self.generator.generate(prompt, system).await,
        }
    }

    /// 一轮迭代：返回下一个状态
    async fn step(
        &self,
        task: &Task,
        tools: &str,
        iteration: usize,
        state: &mut RunState,
    ) -> Result<LoopState, AgentError> {
        self.send_event(ReactEvent::StepUpdate {
            step: iteration + 1,
            max_steps: self.max_iterations,
        });
        tracing::info!(iteration = iteration + 1, max = self.max_iterations, "react iteration");

        let prompt = StepPrompt {
            task: &task.description,
            parameters: &task.parameters,
            conversation: &task.conversation,
            conversation_limit: self.conversation_limit,
            tools,
            history: &state.history,
            plan: &state.plan,
        }
        .render();

        self.send_event(ReactEvent::Thinking);
        let response = self.generate(&prompt, Some(REACT_SYSTEM_PROMPT)).await?;
        tracing::debug!(response = %response, "model response");

        let parsed = parse(&response);
        let thought = parsed.thought().unwrap_or_default().to_string();
        if !thought.is_empty() {
            self.send_event(ReactEvent::ThinkingContent {
                text: thought.clone(),
            });
        }

        match parsed {
            ParsedStep::FinalAnswer { answer, .. } => {
                state.trace.push(TraceEntry {
                    thought,
                    final_answer: Some(answer.clone()),
                    ..Default::default()
                });
                Ok(LoopState::Done(answer))
            }
            ParsedStep::Action { request, .. } => {
                self.send_event(ReactEvent::ToolCall {
                    tool: request.name.clone(),
                    args: Value::Object(request.parameters.clone()),
                });
                let invocation = self
                    .dispatcher
                    .invoke(&request.name, request.parameters.clone())
                    .await;
                let observation = invocation.observation(self.dispatcher.observation_max_chars());

                if let Some(err) = invocation.error() {
                    state.tool_errors += 1;
                    if self.recovery.handle(&err) == RecoveryAction::Observe {
                        tracing::warn!(tool = %request.name, error = %err, "tool error observed");
                    }
                    self.send_event(ReactEvent::ToolFailure {
                        tool: request.name.clone(),
                        reason: err.to_string(),
                    });
                }
                if let Some(path) = invocation.artifact_path() {
                    state.artifact_paths.push(path.to_string());
                }
                let tool_label = invocation.tool.clone().unwrap_or_else(|| request.name.clone());
                self.send_event(ReactEvent::Observation {
                    tool: tool_label,
                    preview: truncate_chars(&observation, OBSERVATION_PREVIEW_CHARS),
                });

                state.history.push_str(&format!(
                    "\nThought: {}\nAction: {}\nAction Input: {}\nObservation: {}\n",
                    thought,
                    request.name,
                    Value::Object(request.parameters.clone()),
                    observation
                ));
                state.tools_used.push(request.name.clone());
                state.trace.push(TraceEntry {
                    thought,
                    action: Some(request.name),
                    action_input: Some(request.parameters),
                    observation: Some(observation),
                    final_answer: None,
                });
                Ok(LoopState::Running(iteration + 1))
            }
            ParsedStep::ThoughtOnly { .. } | ParsedStep::Unparseable => {
                let err = AgentError::ParseError(truncate_chars(response.trim(), 100));
                tracing::warn!(error = %err, "no valid action or final answer parsed, continuing");
                state.trace.push(TraceEntry {
                    thought: thought.clone(),
                    ..Default::default()
                });
                state.history.push_str(&format!("\nThought: {}", thought));
                if let RecoveryAction::RetryWithPrompt(hint) = self.recovery.handle(&err) {
                    self.send_event(ReactEvent::Recovery {
                        action: "RetryWithPrompt".to_string(),
                        detail: hint.clone(),
                    });
                    state.history.push_str(&format!("\n{}\n", hint));
                }
                Ok(LoopState::Running(iteration + 1))
            }
        }
    }

    /// 执行任务；永不返回 Err，失败以 TaskOutput::failure 表达
    pub async fn execute(&self, task: &Task) -> TaskOutput {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("react", run_id = %run_id);
        self.run_loop(task, &run_id).instrument(span).await
    }

    async fn run_loop(&self, task: &Task, run_id: &str) -> TaskOutput {
        tracing::info!(task = %task.description, "ReAct agent received task");

        let tools = self.dispatcher.registry().describe_tools();
        let mut state = RunState::default();
        if self.plan_tasks {
            match self.generate(&task_inference_prompt(&task.description), None).await {
                Ok(response) => {
                    if let Some(plan) = parse_task_inference(&response) {
                        tracing::info!(steps = plan.len(), "task plan inferred");
                        state.plan = plan;
                    }
                }
                Err(e) => return self.fatal(e, &state, run_id, 0),
            }
        }
        let mut loop_state = LoopState::Running(0);

        loop {
            loop_state = match loop_state {
                LoopState::Running(i) if i >= self.max_iterations => {
                    tracing::warn!(max = self.max_iterations, "ReAct reached max iterations");
                    self.send_event(ReactEvent::Exhausted {
                        iterations: self.max_iterations,
                    });
                    let prompt = summary_prompt(&task.description, &state.observations());
                    match self.generate(&prompt, None).await {
                        Ok(summary) => LoopState::Exhausted(summary),
                        Err(e) => return self.fatal(e, &state, run_id, i),
                    }
                }
                LoopState::Running(i) => match self.step(task, &tools, i, &mut state).await {
                    Ok(next) => next,
                    Err(e) => return self.fatal(e, &state, run_id, i),
                },
                LoopState::Done(answer) => {
                    let iterations = state.trace.len();
                    tracing::info!(iterations, "ReAct completed with final answer");
                    self.send_event(ReactEvent::FinalAnswer {
                        text: answer.clone(),
                    });
                    let mut metadata = state.metadata(run_id, iterations);
                    metadata.completed = Some(true);
                    metadata.artifacts = artifacts::extract(&answer, &state.artifact_paths);
                    return TaskOutput::success(answer, metadata);
                }
                LoopState::Exhausted(summary) => {
                    let mut metadata = state.metadata(run_id, self.max_iterations);
                    metadata.completed = Some(false);
                    metadata.reason = Some("max_iterations_reached".to_string());
                    metadata.artifacts = artifacts::extract(&summary, &state.artifact_paths);
                    return TaskOutput::success(summary, metadata);
                }
            };
        }
    }

    fn fatal(&self, err: AgentError, state: &RunState, run_id: &str, iteration: usize) -> TaskOutput {
        let action = self.recovery.handle(&err);
        tracing::error!(error = %err, iteration, action = ?action, "ReAct run aborted");
        self.send_event(ReactEvent::Error {
            text: err.to_string(),
        });
        let mut metadata = state.metadata(run_id, iteration);
        metadata.completed = Some(false);
        metadata.reason = Some(err.abort_reason().to_string());
        TaskOutput::failure(err.to_string(), metadata)
    }
}

#[async_trait]
impl Agent for ReactAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::React
    }

    async fn run(&self, task: &Task) -> TaskOutput {
        self.execute(task).await
    }
}
