//! 模型回复的字段抽取：任务分析、计划步骤、工具选择
//!
//! 全部是纯函数；缺失字段退回默认值，不报错。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::react::parse_parameters;
use crate::workflow::TaskAnalysis;

/// 计划最多保留的步数
pub const MAX_PLAN_STEPS: usize = 10;
/// 没有编号行时按句切分保留的步数
const FALLBACK_PLAN_STEPS: usize = 5;

fn task_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)TASK_TYPE:\s*\[?(\w+)").unwrap())
}

fn language_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)LANGUAGE:[ \t]*([^\n]+)").unwrap())
}

fn complexity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)COMPLEXITY:\s*\[?(\w+)").unwrap())
}

fn requirements_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)REQUIREMENTS:[ \t]*\n((?:[ \t]*[-*][^\n]*\n?)+)").unwrap())
}

fn dependencies_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)DEPENDENCIES:[ \t]*([^\n]+)").unwrap())
}

fn plan_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:\d+[.):]|Step\s+\d+:?)\s*").unwrap())
}

fn tool_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)TOOL:\s*([\w\-]+)").unwrap())
}

fn parameters_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)PARAMETERS:\s*(.+?)(?:\n\s*REASONING\s*:|\n\s*\n|\z)").unwrap()
    })
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '[' | ']' | '"' | '\''))
        .trim()
        .to_string()
}

fn is_none_marker(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "" | "none" | "n/a" | "no" | "not specified"
    )
}

/// 解析 Understand 阶段回复
pub fn parse_analysis(response: &str) -> TaskAnalysis {
    let mut analysis = TaskAnalysis::default();

    if let Some(c) = task_type_re().captures(response) {
        analysis.task_type = c[1].to_lowercase();
    }
    if let Some(language) = language_re()
        .captures(response)
        .map(|c| clean_value(&c[1]))
        .filter(|l| !l.is_empty())
    {
        analysis.language = language;
    }
    if let Some(c) = complexity_re().captures(response) {
        analysis.complexity = c[1].to_lowercase();
    }
    if let Some(c) = requirements_re().captures(response) {
        analysis.requirements = c[1]
            .lines()
            .map(|l| l.trim().trim_start_matches(['-', '*']).trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
    }
    if let Some(c) = dependencies_re().captures(response) {
        let deps = clean_value(&c[1]);
        if !is_none_marker(&deps) {
            analysis.dependencies = deps
                .split(',')
                .map(clean_value)
                .filter(|d| !is_none_marker(d))
                .collect();
        }
    }
    analysis
}

/// 解析 Plan 阶段回复：编号行优先，否则按句号切分；最多 MAX_PLAN_STEPS 步
pub fn parse_plan(response: &str) -> Vec<String> {
    let mut steps: Vec<String> = response
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let m = plan_line_re().find(line)?;
            let step = line[m.end()..].trim();
            (!step.is_empty()).then(|| step.to_string())
        })
        .collect();

    if steps.is_empty() {
        steps = response
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(FALLBACK_PLAN_STEPS)
            .map(str::to_string)
            .collect();
    }
    steps.truncate(MAX_PLAN_STEPS);
    steps
}

/// 解析工具选择回复：`TOOL: name` 与 `PARAMETERS: ...`
pub fn parse_tool_selection(response: &str) -> (Option<String>, Map<String, Value>) {
    let tool = tool_re().captures(response).map(|c| c[1].to_string());
    let params = parameters_re()
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| parse_parameters(m.as_str()))
        .unwrap_or_default();
    (tool, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_analysis_full() {
        let response = "TASK_TYPE: bug_fix\nLANGUAGE: JavaScript\nREQUIREMENTS:\n- handle empty input\n* log errors\nCOMPLEXITY: Simple\nDEPENDENCIES: express, lodash";
        let analysis = parse_analysis(response);
        assert_eq!(analysis.task_type, "bug_fix");
        assert_eq!(analysis.language, "JavaScript");
        assert_eq!(analysis.requirements, vec!["handle empty input", "log errors"]);
        assert_eq!(analysis.complexity, "simple");
        assert_eq!(analysis.dependencies, vec!["express", "lodash"]);
    }

    #[test]
    fn test_parse_analysis_defaults() {
        let analysis = parse_analysis("I could not understand the task.");
        assert_eq!(analysis, TaskAnalysis::default());

        let analysis = parse_analysis("LANGUAGE: [python]\nDEPENDENCIES: none");
        assert_eq!(analysis.language, "python");
        assert!(analysis.dependencies.is_empty());
    }

    #[test]
    fn test_parse_plan_numbered() {
        let response = "PLAN:\n1. Create file\n2) Write function\n3: Add tests\nStep 4: Run it\nSome note";
        assert_eq!(
            parse_plan(response),
            vec!["Create file", "Write function", "Add tests", "Run it"]
        );
    }

    #[test]
    fn test_parse_plan_sentence_fallback() {
        let response = "Read input. Compute. Print. Clean up. Test. Ship. Celebrate.";
        assert_eq!(
            parse_plan(response),
            vec!["Read input", "Compute", "Print", "Clean up", "Test"]
        );
    }

    #[test]
    fn test_parse_plan_capped() {
        let response: String = (1..=15).map(|i| format!("{}. step {}\n", i, i)).collect();
        let plan = parse_plan(&response);
        assert_eq!(plan.len(), MAX_PLAN_STEPS);
        assert_eq!(plan[9], "step 10");
    }

    #[test]
    fn test_parse_tool_selection() {
        let (tool, params) = parse_tool_selection(
            "TOOL: file_saver\nPARAMETERS: {\"path\": \"a.md\", \"content\": \"x\"}\nREASONING: save it",
        );
        assert_eq!(tool.as_deref(), Some("file_saver"));
        assert_eq!(Value::Object(params), json!({"path": "a.md", "content": "x"}));

        let (tool, params) = parse_tool_selection("I would write some code.");
        assert!(tool.is_none());
        assert!(params.is_empty());
    }

    #[test]
    fn test_parse_tool_selection_key_values() {
        let (_, params) =
            parse_tool_selection("TOOL: python_execute\nPARAMETERS:\ncode = print(1)\n\nREASONING: run");
        assert_eq!(params["code"], json!("print(1)"));
    }
}
