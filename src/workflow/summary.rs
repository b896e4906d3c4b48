//! 由最终 WorkflowContext 确定性生成 markdown 摘要（不调用模型）

use crate::workflow::WorkflowContext;

const PREVIEW_CHARS: usize = 500;

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub fn render_summary(ctx: &WorkflowContext) -> String {
    let analysis = &ctx.analysis;
    let mut parts = vec![
        "## Task Analysis".to_string(),
        format!("- Type: {}", analysis.task_type),
        format!("- Language: {}", analysis.language),
        format!("- Complexity: {}", analysis.complexity),
        String::new(),
        "## Implementation Plan".to_string(),
    ];
    for (i, step) in ctx.plan.iter().enumerate() {
        parts.push(format!("{}. {}", i + 1, step));
    }

    if !ctx.generated_files.is_empty() {
        parts.push(String::new());
        parts.push("## Generated Files".to_string());
        for file in &ctx.generated_files {
            parts.push(format!("- {}", file));
        }
    }

    parts.push(String::new());
    parts.push("## Verification".to_string());
    let verification = &ctx.verification;
    if verification.success {
        parts.push("Status: SUCCESS".to_string());
        if !verification.output.is_empty() {
            parts.push(format!("Output: {}", preview(&verification.output)));
        }
    } else {
        parts.push("Status: NEEDS REVIEW".to_string());
        if !verification.errors.is_empty() {
            let issues: Vec<&str> = verification.errors.iter().take(3).map(String::as_str).collect();
            parts.push(format!("Issues: {}", issues.join(", ")));
        }
    }

    if !ctx.generated_code.is_empty() {
        parts.push(String::new());
        parts.push("## Generated Code Preview".to_string());
        parts.push(format!(
            "```{}\n{}\n```",
            ctx.analysis.language,
            preview(&ctx.generated_code)
        ));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Verification;

    #[test]
    fn test_summary_success() {
        let mut ctx = WorkflowContext::new("t");
        ctx.plan = vec!["write".to_string(), "run".to_string()];
        ctx.generated_files = vec!["ws/code/a.py".to_string()];
        ctx.generated_code = "print(1)".to_string();
        ctx.verification.output = "1\n".to_string();

        let s = render_summary(&ctx);
        assert!(s.starts_with("## Task Analysis\n- Type: code_generation"));
        assert!(s.contains("## Implementation Plan\n1. write\n2. run"));
        assert!(s.contains("## Generated Files\n- ws/code/a.py"));
        assert!(s.contains("Status: SUCCESS\nOutput: 1"));
        assert!(s.ends_with("```python\nprint(1)\n```"));
    }

    #[test]
    fn test_summary_needs_review_and_preview_cut() {
        let mut ctx = WorkflowContext::new("t");
        ctx.verification = Verification {
            success: false,
            output: String::new(),
            errors: vec!["e1".into(), "e2".into(), "e3".into(), "e4".into()],
        };
        ctx.generated_code = "x".repeat(600);

        let s = render_summary(&ctx);
        assert!(s.contains("Status: NEEDS REVIEW\nIssues: e1, e2, e3"));
        assert!(!s.contains("e4"));
        assert!(!s.contains("## Generated Files"));
        assert!(s.contains(&format!("{}...", "x".repeat(500))));
        assert!(!s.contains(&"x".repeat(501)));
    }
}
