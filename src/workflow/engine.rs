//! SWE 分阶段工作流
//!
//! Understand -> Plan -> Implement -> Verify -> (Iterate -> Verify)*。
//! 每个阶段至多一次生成调用加确定性解析；所有阶段共用一个 WorkflowContext（`&mut` 传递）。
//! 修复次数受 max_iterations 约束；生成端口失败终止本次运行，并带回已有的分析、计划与验证状态。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::agent::Agent;
use crate::artifacts;
use crate::core::{AgentError, AgentType, Task, TaskMetadata, TaskOutput};
use crate::llm::TextGenerator;
use crate::react::{extract_code_block, ReactEvent};
use crate::tools::{ActionDispatcher, ToolResult};
use crate::workflow::analysis::{parse_analysis, parse_plan, parse_tool_selection};
use crate::workflow::prompt::{
    debug_prompt, plan_prompt, tool_selection_prompt, understand_prompt, SWE_SYSTEM_PROMPT,
};
use crate::workflow::summary::render_summary;
use crate::workflow::{Phase, StepRecord, Verification, WorkflowContext};

/// 工作流参数
#[derive(Debug, Clone)]
pub struct SweSettings {
    /// 最大修复次数
    pub max_iterations: usize,
    /// 是否自动执行生成的代码做验证
    pub auto_execute: bool,
    /// 可直接执行的语言（小写）
    pub executable_languages: Vec<String>,
    pub execution_tool: String,
    /// 工具名无法解析时使用的工具
    pub fallback_tool: String,
}

impl Default for SweSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            auto_execute: true,
            executable_languages: vec!["python".to_string(), "py".to_string()],
            execution_tool: "python_execute".to_string(),
            fallback_tool: "code_generator".to_string(),
        }
    }
}

/// SWE 智能体
pub struct SweAgent {
    generator: Arc<TextGenerator>,
    dispatcher: Arc<ActionDispatcher>,
    settings: SweSettings,
    event_tx: Option<UnboundedSender<ReactEvent>>,
    cancel_token: Option<CancellationToken>,
}

impl SweAgent {
    pub fn new(
        generator: Arc<TextGenerator>,
        dispatcher: Arc<ActionDispatcher>,
        settings: SweSettings,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            settings,
            event_tx: None,
            cancel_token: None,
        }
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn settings(&self) -> &SweSettings {
        &self.settings
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn enter_phase(&self, phase: Phase) {
        tracing::info!(phase = %phase, "workflow phase");
        self.send_event(ReactEvent::PhaseStarted {
            phase: phase.to_string(),
        });
    }

    async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        let call = self.generator.generate(prompt, Some(SWE_SYSTEM_PROMPT));
        match &self.cancel_token {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(AgentError::Cancelled),
                r = call => r,
            },
            None => call.await,
        }
    }

    async fn understand(&self, ctx: &mut WorkflowContext) -> Result<(), AgentError> {
        self.enter_phase(Phase::Understand);
        let response = self.generate(&understand_prompt(&ctx.task)).await?;
        ctx.analysis = parse_analysis(&response);
        tracing::debug!(analysis = ?ctx.analysis, "task analysis");
        ctx.record(Phase::Understand, &ctx.analysis.clone());
        Ok(())
    }

    async fn plan(&self, ctx: &mut WorkflowContext) -> Result<(), AgentError> {
        self.enter_phase(Phase::Plan);
        let response = self.generate(&plan_prompt(&ctx.task, &ctx.analysis)).await?;
        ctx.plan = parse_plan(&response);
        tracing::debug!(steps = ctx.plan.len(), "implementation plan");
        ctx.record(Phase::Plan, &ctx.plan.clone());
        Ok(())
    }

    /// 给工具选择调用的上下文：分析结果与已生成的文件
    fn step_context(ctx: &WorkflowContext) -> String {
        json!({
            "analysis": ctx.analysis,
            "generated_files": ctx.generated_files,
        })
        .to_string()
    }

    /// 选定工具名：能解析到已注册工具则用之，否则退回 fallback_tool
    fn choose_tool(&self, requested: Option<&str>) -> String {
        requested
            .and_then(|name| self.dispatcher.resolve_name(name))
            .unwrap_or_else(|| self.settings.fallback_tool.clone())
    }

    async fn implement(&self, ctx: &mut WorkflowContext) -> Result<(), AgentError> {
        self.enter_phase(Phase::Implement);
        let tools = self.dispatcher.registry().describe_tools();
        let plan = ctx.plan.clone();

        for (i, step) in plan.iter().enumerate() {
            tracing::info!(step = i + 1, total = plan.len(), "executing plan step");
            let prompt = tool_selection_prompt(step, &Self::step_context(ctx), &tools);
            let response = self.generate(&prompt).await?;
            let (requested, mut params) = parse_tool_selection(&response);
            let tool = self.choose_tool(requested.as_deref());

            if tool == self.settings.fallback_tool && !params.contains_key("description") {
                params.insert("description".to_string(), Value::String(step.clone()));
                if let Some(lang) = ctx.analysis.specified_language() {
                    params
                        .entry("language".to_string())
                        .or_insert_with(|| Value::String(lang.to_string()));
                }
            }

            self.send_event(ReactEvent::ToolCall {
                tool: tool.clone(),
                args: Value::Object(params.clone()),
            });
            let invocation = self.dispatcher.invoke(&tool, params.clone()).await;
            let result = invocation.to_tool_result();

            if result.success {
                if let Some(content) = &result.content {
                    ctx.generated_code = content.clone();
                }
                if let Some(path) = &result.artifact_path {
                    ctx.generated_files.push(path.clone());
                }
            } else {
                tracing::warn!(tool = %tool, error = ?result.error, "plan step failed");
                self.send_event(ReactEvent::ToolFailure {
                    tool: tool.clone(),
                    reason: result.error.clone().unwrap_or_default(),
                });
            }

            ctx.step_results.push(StepRecord {
                step: step.clone(),
                tool,
                params,
                result,
            });
        }

        ctx.record(Phase::Implement, &ctx.step_results.clone());
        Ok(())
    }

    /// 是否具备执行验证的条件
    fn can_execute(&self, ctx: &WorkflowContext) -> bool {
        self.settings.auto_execute
            && !ctx.generated_code.trim().is_empty()
            && self
                .settings
                .executable_languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(&ctx.language()))
            && self.dispatcher.registry().contains(&self.settings.execution_tool)
    }

    async fn run_verification(&self, ctx: &WorkflowContext) -> Verification {
        if !self.can_execute(ctx) {
            return Verification::default();
        }
        tracing::info!("auto-executing generated code for verification");
        let mut params = Map::new();
        params.insert("code".to_string(), Value::String(ctx.generated_code.clone()));
        let result: ToolResult = self
            .dispatcher
            .invoke(&self.settings.execution_tool, params)
            .await
            .to_tool_result();

        if result.success {
            Verification {
                success: true,
                output: result
                    .field_text("result")
                    .or_else(|| result.field_text("output"))
                    .unwrap_or_default(),
                errors: Vec::new(),
            }
        } else {
            Verification::failed(
                result
                    .error
                    .unwrap_or_else(|| "Execution failed".to_string()),
            )
        }
    }

    async fn verify(&self, ctx: &mut WorkflowContext) {
        self.enter_phase(Phase::Verify);
        ctx.verification = self.run_verification(ctx).await;
        ctx.record(Phase::Verify, &ctx.verification.clone());
    }

    /// 修复循环：验证失败且未超过 max_iterations 时，让模型给出修正代码并重新验证
    async fn iterate(&self, ctx: &mut WorkflowContext) -> Result<(), AgentError> {
        while !ctx.verification.success && ctx.iterations < self.settings.max_iterations {
            ctx.iterations += 1;
            let phase = Phase::Iterate(ctx.iterations);
            self.enter_phase(phase);

            let language = ctx.analysis.specified_language().unwrap_or("python").to_string();
            let prompt = debug_prompt(
                &language,
                &ctx.generated_code,
                &ctx.verification.errors.join("\n"),
            );
            let response = self.generate(&prompt).await?;
            match extract_code_block(&response) {
                Some(code) => {
                    ctx.generated_code = code;
                    ctx.fix_applied = true;
                    ctx.fix_explanation = Some(response);
                }
                None => tracing::warn!(attempt = ctx.iterations, "no code block in fix response"),
            }

            ctx.verification = self.run_verification(ctx).await;
            ctx.record(phase, &ctx.verification.clone());
        }
        Ok(())
    }

    async fn run_phases(&self, ctx: &mut WorkflowContext) -> Result<(), AgentError> {
        self.understand(ctx).await?;
        self.plan(ctx).await?;
        self.implement(ctx).await?;
        self.verify(ctx).await;
        self.iterate(ctx).await
    }

    fn metadata(ctx: &WorkflowContext, run_id: &str) -> TaskMetadata {
        let mut metadata = TaskMetadata::new(AgentType::Swe);
        metadata.run_id = Some(run_id.to_string());
        metadata.analysis = Some(ctx.analysis.clone());
        metadata.plan = Some(ctx.plan.clone());
        metadata.generated_files = Some(ctx.generated_files.clone());
        metadata.verification = Some(ctx.verification.clone());
        metadata.iterations = Some(ctx.iterations);
        metadata.fix_applied = Some(ctx.fix_applied);
        metadata.phases = Some(ctx.execution_trace().to_vec());
        metadata
    }

    /// 执行任务；永不返回 Err
    pub async fn execute(&self, task: &Task) -> TaskOutput {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("swe", run_id = %run_id);
        self.run_workflow(task, &run_id).instrument(span).await
    }

    async fn run_workflow(&self, task: &Task, run_id: &str) -> TaskOutput {
        tracing::info!(task = %task.description, "SWE agent received task");
        let mut ctx = WorkflowContext::new(task.description.clone());

        if let Err(e) = self.run_phases(&mut ctx).await {
            tracing::error!(error = %e, "SWE workflow aborted");
            self.send_event(ReactEvent::Error {
                text: e.to_string(),
            });
            let mut metadata = Self::metadata(&ctx, run_id);
            metadata.completed = Some(false);
            metadata.reason = Some(e.abort_reason().to_string());
            return TaskOutput::failure(e.to_string(), metadata);
        }

        let summary = render_summary(&ctx);
        let success = ctx.verification.success || !ctx.generated_files.is_empty();
        let mut metadata = Self::metadata(&ctx, run_id);
        metadata.completed = Some(ctx.verification.success);
        metadata.artifacts = artifacts::extract("", &ctx.generated_files);
        tracing::info!(
            success,
            iterations = ctx.iterations,
            files = ctx.generated_files.len(),
            "SWE workflow finished"
        );

        TaskOutput {
            success,
            result: Some(summary),
            error: (!success).then(|| ctx.verification.errors.join("\n")),
            metadata,
        }
    }
}

#[async_trait]
impl Agent for SweAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Swe
    }

    async fn run(&self, task: &Task) -> TaskOutput {
        self.execute(task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::{Tool, ToolRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 记录收到的参数，返回固定代码与产物路径
    struct FakeCodeGenerator {
        calls: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Tool for FakeCodeGenerator {
        fn name(&self) -> &str {
            "code_generator"
        }

        fn description(&self) -> &str {
            "fake generator"
        }

        async fn execute(&self, args: Value) -> Result<Value, String> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(args);
            }
            Ok(json!({"content": "print(1/0)", "artifact_path": "ws/code/main.py"}))
        }
    }

    /// 前 fail_times 次失败，之后成功
    struct FakeExecutor {
        fail_times: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for FakeExecutor {
        fn name(&self) -> &str {
            "python_execute"
        }

        fn description(&self) -> &str {
            "fake executor"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Ok(json!({"success": false, "error": "ZeroDivisionError"}))
            } else {
                Ok(json!({"success": true, "result": "ok\n"}))
            }
        }
    }

    const ANALYSIS: &str = "TASK_TYPE: code_generation\nLANGUAGE: python\nREQUIREMENTS:\n- divide\nCOMPLEXITY: simple\nDEPENDENCIES: none";
    const PLAN: &str = "1. Write the script";
    const SELECT: &str = "TOOL: CodeGenerator\nPARAMETERS: {}\nREASONING: write code";
    const FIX: &str = "Fixed:\n```python\nprint(1)\n```";

    fn build(
        llm: Arc<ScriptedLlmClient>,
        fail_times: usize,
        settings: SweSettings,
    ) -> (SweAgent, Arc<FakeCodeGenerator>, Arc<FakeExecutor>) {
        let generator_tool = Arc::new(FakeCodeGenerator {
            calls: Mutex::new(Vec::new()),
        });
        let executor = Arc::new(FakeExecutor {
            fail_times,
            calls: AtomicUsize::new(0),
        });
        let mut registry = ToolRegistry::new();
        registry.register_arc(generator_tool.clone());
        registry.register_arc(executor.clone());
        let dispatcher = Arc::new(ActionDispatcher::new(Arc::new(registry), 5));
        let agent = SweAgent::new(Arc::new(TextGenerator::new(llm, 5)), dispatcher, settings);
        (agent, generator_tool, executor)
    }

    #[tokio::test]
    async fn test_happy_path_after_one_fix() {
        let llm = Arc::new(ScriptedLlmClient::new([ANALYSIS, PLAN, SELECT, FIX]));
        let (agent, gen_tool, executor) = build(llm.clone(), 1, SweSettings::default());
        let out = agent.execute(&Task::new("divide numbers")).await;

        assert!(out.success);
        let md = &out.metadata;
        assert_eq!(md.agent_type, AgentType::Swe);
        assert_eq!(md.iterations, Some(1));
        assert_eq!(md.fix_applied, Some(true));
        assert!(md.verification.as_ref().unwrap().success);
        assert_eq!(md.verification.as_ref().unwrap().output, "ok\n");
        assert_eq!(md.generated_files, Some(vec!["ws/code/main.py".to_string()]));
        let phases: Vec<&str> = md.phases.as_ref().unwrap().iter().map(|p| p.phase.as_str()).collect();
        assert_eq!(
            phases,
            vec!["UNDERSTAND", "PLAN", "IMPLEMENT", "VERIFY", "ITERATE_1"]
        );
        assert_eq!(md.artifacts.as_ref().unwrap()["code"], vec!["ws/code/main.py"]);
        assert!(out.result.unwrap().contains("Status: SUCCESS"));

        // 未给 description 时用步骤文本与分析语言补齐
        let calls = gen_tool.calls.lock().unwrap();
        assert_eq!(calls[0]["description"], json!("Write the script"));
        assert_eq!(calls[0]["language"], json!("python"));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(llm.calls(), 4);
    }

    #[tokio::test]
    async fn test_iterate_bounded_and_success_from_files() {
        let llm = Arc::new(ScriptedLlmClient::new([ANALYSIS, PLAN, SELECT]).with_fallback(FIX));
        let (agent, _, executor) = build(llm.clone(), usize::MAX, SweSettings::default());
        let out = agent.execute(&Task::new("t")).await;

        let md = &out.metadata;
        assert_eq!(md.iterations, Some(5));
        assert!(!md.verification.as_ref().unwrap().success);
        // 验证失败但产生了文件
        assert!(out.success);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 6);
        assert_eq!(llm.calls(), 3 + 5);
        assert_eq!(md.phases.as_ref().unwrap().len(), 4 + 5);
        assert!(out.result.unwrap().contains("Status: NEEDS REVIEW"));
    }

    #[tokio::test]
    async fn test_unknown_tool_falls_back() {
        let llm = Arc::new(ScriptedLlmClient::new([
            ANALYSIS,
            PLAN,
            "TOOL: browser\nPARAMETERS: {\"url\": \"x\"}",
        ]));
        let (agent, gen_tool, _) = build(llm, 0, SweSettings::default());
        let out = agent.execute(&Task::new("t")).await;
        assert!(out.success);
        assert_eq!(gen_tool.calls.lock().unwrap().len(), 1);
        assert_eq!(out.metadata.iterations, Some(0));
    }

    #[tokio::test]
    async fn test_no_execution_for_other_languages() {
        let analysis = ANALYSIS.replace("LANGUAGE: python", "LANGUAGE: Rust");
        let llm = Arc::new(ScriptedLlmClient::new([analysis.as_str(), PLAN, SELECT]));
        let (agent, gen_tool, executor) = build(llm, usize::MAX, SweSettings::default());
        let out = agent.execute(&Task::new("t")).await;
        assert!(out.success);
        assert!(out.metadata.verification.unwrap().success);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(gen_tool.calls.lock().unwrap()[0]["language"], json!("Rust"));
    }

    #[tokio::test]
    async fn test_auto_execute_off_is_vacuous_success() {
        let settings = SweSettings {
            auto_execute: false,
            ..Default::default()
        };
        let llm = Arc::new(ScriptedLlmClient::new([ANALYSIS, PLAN, SELECT]));
        let (agent, _, executor) = build(llm, usize::MAX, settings);
        let out = agent.execute(&Task::new("t")).await;
        assert!(out.metadata.verification.unwrap().success);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fix_without_code_block_is_noop() {
        let llm = Arc::new(
            ScriptedLlmClient::new([ANALYSIS, PLAN, SELECT]).with_fallback("I cannot fix this."),
        );
        let settings = SweSettings {
            max_iterations: 2,
            ..Default::default()
        };
        let (agent, _, _) = build(llm, usize::MAX, settings);
        let out = agent.execute(&Task::new("t")).await;
        assert_eq!(out.metadata.iterations, Some(2));
        assert_eq!(out.metadata.fix_applied, Some(false));
        assert!(out.result.unwrap().contains("print(1/0)"));
    }

    /// 只返回代码、不写文件
    struct InlineGenerator;

    #[async_trait]
    impl Tool for InlineGenerator {
        fn name(&self) -> &str {
            "code_generator"
        }

        fn description(&self) -> &str {
            "returns code without saving"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Ok(json!({"content": "print(1/0)"}))
        }
    }

    #[tokio::test]
    async fn test_no_files_and_failing_verification_is_failure() {
        let llm = Arc::new(ScriptedLlmClient::new([ANALYSIS, PLAN, SELECT]).with_fallback(FIX));
        let executor = Arc::new(FakeExecutor {
            fail_times: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let mut registry = ToolRegistry::new();
        registry.register(InlineGenerator);
        registry.register_arc(executor.clone());
        let dispatcher = Arc::new(ActionDispatcher::new(Arc::new(registry), 5));
        let settings = SweSettings::default();
        let max = settings.max_iterations;
        let agent = SweAgent::new(Arc::new(TextGenerator::new(llm, 5)), dispatcher, settings);

        let out = agent.execute(&Task::new("divide numbers")).await;
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("ZeroDivisionError"));
        let md = &out.metadata;
        assert_eq!(md.iterations, Some(max));
        assert_eq!(md.completed, Some(false));
        assert_eq!(md.generated_files, Some(Vec::new()));
        assert!(md.artifacts.is_none());
        assert_eq!(executor.calls.load(Ordering::SeqCst), max + 1);
        assert!(out.result.unwrap().contains("Status: NEEDS REVIEW"));
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_partial_state() {
        let llm = Arc::new(ScriptedLlmClient::new([ANALYSIS]).then_fail("backend down"));
        let (agent, _, _) = build(llm, 0, SweSettings::default());
        let out = agent.execute(&Task::new("t")).await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("backend down"));
        assert_eq!(out.metadata.analysis.unwrap().complexity, "simple");
        assert_eq!(out.metadata.phases.unwrap().len(), 1);
        assert_eq!(out.metadata.reason.as_deref(), Some("generation_failed"));
    }
}
