//! ReAct 提示词模板

use serde_json::{Map, Value};

use crate::memory::{render_transcript, Message};
use crate::react::task_plan::render_plan;

pub const REACT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant that solves tasks step by step by reasoning and using tools.

Always answer in exactly one of these two formats.

To use a tool:
Thought: <your reasoning about what to do next>
Action: <tool name>
Action Input: <JSON object with the tool parameters>

When you know the answer:
Thought: <your reasoning>
Final Answer: <the complete answer for the user>

Use only the listed tools. After each Action you will receive an Observation with the tool result."#;

/// 拼接单轮 prompt 的各部分
pub struct StepPrompt<'a> {
    pub task: &'a str,
    pub parameters: &'a Map<String, Value>,
    pub conversation: &'a [Message],
    pub conversation_limit: usize,
    pub tools: &'a str,
    pub history: &'a str,
    /// 任务推断得到的计划，空表示没有
    pub plan: &'a [String],
}

impl StepPrompt<'_> {
    pub fn render(&self) -> String {
        let mut prompt = format!("Task: {}\n", self.task);
        if !self.parameters.is_empty() {
            let params = serde_json::to_string_pretty(self.parameters).unwrap_or_default();
            prompt.push_str(&format!("\nTask parameters:\n{}\n", params));
        }
        if !self.plan.is_empty() {
            prompt.push_str(&format!("\n{}\n", render_plan(self.plan)));
        }
        let transcript = render_transcript(self.conversation, self.conversation_limit);
        if !transcript.is_empty() {
            prompt.push_str(&format!("\nRecent conversation:\n{}\n", transcript));
        }
        prompt.push_str(&format!("\nAvailable tools:\n{}\n", self.tools));
        if self.history.trim().is_empty() {
            prompt.push_str("\nBegin!\n");
        } else {
            prompt.push_str(&format!("\nPrevious steps:{}\n", self.history));
            prompt.push_str("\nContinue with the next step.\n");
        }
        prompt
    }
}

/// 达到迭代上限后的总结 prompt（最近 3 条 Observation）
pub fn summary_prompt(task: &str, observations: &[&str]) -> String {
    let start = observations.len().saturating_sub(3);
    format!(
        "Based on the following task and execution trace, provide a comprehensive summary of what was accomplished:\n\nTask: {}\n\nKey Observations:\n{}\n\nPlease provide a helpful summary response for the user.",
        task,
        observations[start..].join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_prompt_sections() {
        let params = Map::new();
        let conversation = vec![Message::user("earlier question")];
        let prompt = StepPrompt {
            task: "add numbers",
            parameters: &params,
            conversation: &conversation,
            conversation_limit: 10,
            tools: "- echo: Echo",
            history: "",
            plan: &[],
        }
        .render();
        assert!(prompt.starts_with("Task: add numbers"));
        assert!(prompt.contains("User: earlier question"));
        assert!(prompt.contains("- echo: Echo"));
        assert!(prompt.contains("Begin!"));
        assert!(!prompt.contains("Task parameters"));
        assert!(!prompt.contains("plan"));
    }

    #[test]
    fn test_step_prompt_with_plan() {
        let params = Map::new();
        let plan = vec!["Write code".to_string(), "Save it".to_string()];
        let prompt = StepPrompt {
            task: "snake game",
            parameters: &params,
            conversation: &[],
            conversation_limit: 10,
            tools: "",
            history: "",
            plan: &plan,
        }
        .render();
        assert!(prompt.contains("- Write code\n- Save it"));
    }

    #[test]
    fn test_summary_keeps_last_three() {
        let p = summary_prompt("t", &["o1", "o2", "o3", "o4"]);
        assert!(!p.contains("o1"));
        assert!(p.contains("o2\no3\no4"));
    }
}
