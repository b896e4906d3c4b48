//! SWE 工作流各阶段的提示词

use crate::workflow::TaskAnalysis;

pub const SWE_SYSTEM_PROMPT: &str = "You are an expert software engineer. You analyze tasks carefully, plan concrete steps, write clean working code, and fix errors based on execution feedback. Follow the requested output format exactly.";

pub fn understand_prompt(task: &str) -> String {
    format!(
        r#"Analyze the following software engineering task and extract key information:

Task: {task}

Please provide:
1. TASK_TYPE: One of [code_generation, bug_fix, refactoring, testing, documentation, other]
2. LANGUAGE: Primary programming language (if applicable)
3. REQUIREMENTS: List of specific requirements
4. COMPLEXITY: One of [simple, moderate, complex]
5. DEPENDENCIES: Any external dependencies or context needed

Format your response as:
TASK_TYPE: [type]
LANGUAGE: [language or "not specified"]
REQUIREMENTS:
- [requirement 1]
- [requirement 2]
COMPLEXITY: [complexity]
DEPENDENCIES: [dependencies or "none"]"#
    )
}

pub fn plan_prompt(task: &str, analysis: &TaskAnalysis) -> String {
    let requirements = analysis
        .requirements
        .iter()
        .map(|r| format!("- {}", r))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Create a detailed implementation plan for the following task:\n\nTask: {}\nTask Type: {}\nLanguage: {}\nComplexity: {}\n\nRequirements:\n{}\n\nCreate a step-by-step plan. Each step should be specific and actionable.\nNumber each step. Maximum 10 steps.\n\nPLAN:",
        task, analysis.task_type, analysis.language, analysis.complexity, requirements
    )
}

pub fn tool_selection_prompt(step: &str, context: &str, tools: &str) -> String {
    format!(
        r#"Select the best tool for the following implementation step.

Step: {step}

Context:
{context}

Available tools:
{tools}

Respond in this format:
TOOL: <tool name>
PARAMETERS: <JSON object with the tool parameters>
REASONING: <one sentence>"#
    )
}

pub fn debug_prompt(language: &str, code: &str, error: &str) -> String {
    format!(
        "The following {language} code fails with the errors below. Fix it.\n\nCode:\n```{language}\n{code}\n```\n\nErrors:\n{error}\n\nRespond with a short explanation followed by the complete corrected code in a single fenced code block."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_prompt_lists_requirements() {
        let analysis = TaskAnalysis {
            requirements: vec!["fast".to_string(), "safe".to_string()],
            ..Default::default()
        };
        let p = plan_prompt("build", &analysis);
        assert!(p.contains("Requirements:\n- fast\n- safe"));
        assert!(p.ends_with("PLAN:"));
    }

    #[test]
    fn test_debug_prompt_embeds_code() {
        let p = debug_prompt("python", "print(x)", "NameError");
        assert!(p.contains("```python\nprint(x)\n```"));
        assert!(p.contains("NameError"));
    }
}
