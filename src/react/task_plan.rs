//! 任务推断：ReAct 循环前可选的一次生成调用
//!
//! 模型回答 `TASK` + 编号步骤时，得到的计划写入每一步的 prompt 与 metadata.plan；
//! 回答 `NOT_A_TASK`（或其他内容）时按普通提问处理。

use crate::workflow::parse_plan;

/// 判断输入是否为多步任务并给出计划
pub fn task_inference_prompt(input: &str) -> String {
    format!(
        r#"Analyze the following user input and determine if it's a task that requires multiple steps to complete:

USER INPUT: {input}

First, determine if this is a task (requiring actions) or just a question/conversation:
- If it's just a question or conversation, respond with "NOT_A_TASK"
- If it's a task requiring actions, respond with "TASK" followed by a numbered list of clear, specific steps to complete it

Example response for a task:
TASK
1. Search for information about Python memory management
2. Generate a summary of key points
3. Save the findings to a markdown file

Example response for a non-task:
NOT_A_TASK"#
    )
}

/// 解析推断结果：首行以 TASK 开头且有步骤时返回计划
pub fn parse_task_inference(response: &str) -> Option<Vec<String>> {
    let trimmed = response.trim();
    let rest = trimmed.strip_prefix("TASK")?;
    let plan = parse_plan(rest);
    (!plan.is_empty()).then_some(plan)
}

/// 计划在 prompt 中的段落
pub fn render_plan(plan: &[String]) -> String {
    let steps: Vec<String> = plan.iter().map(|s| format!("- {}", s)).collect();
    format!(
        "I've created a plan to help accomplish this task:\n{}\n\nPlease execute this plan step by step, using the available tools when needed.",
        steps.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_with_numbered_steps() {
        let plan = parse_task_inference("TASK\n1. Write the game\n2. Save it to snake.py\n").unwrap();
        assert_eq!(plan, vec!["Write the game", "Save it to snake.py"]);
    }

    #[test]
    fn test_not_a_task() {
        assert_eq!(parse_task_inference("NOT_A_TASK"), None);
        assert_eq!(parse_task_inference("  NOT_A_TASK\nJust a question."), None);
        assert_eq!(parse_task_inference("TASK"), None);
        assert_eq!(parse_task_inference("Sure, here you go"), None);
    }

    #[test]
    fn test_render_plan() {
        let text = render_plan(&["a".to_string(), "b".to_string()]);
        assert!(text.contains("- a\n- b"));
        assert!(task_inference_prompt("make a pdf").contains("USER INPUT: make a pdf"));
    }
}
