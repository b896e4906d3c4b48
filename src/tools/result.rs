//! 工具结果归一化
//!
//! 工具返回任意 JSON；ToolResult 抽出约定字段（success / content / result / error / artifact_path），
//! 并按「error > content > result > 原样 JSON」的优先级生成 Observation 文本，避免冗长结构撑爆 prompt。

use serde::Serialize;
use serde_json::Value;

/// 截断标记
pub const TRUNCATION_MARKER: &str = "... [truncated]";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ToolResult {
    /// 从工具返回的 JSON 构造；success 缺省时取「没有 error 字段」
    pub fn from_value(raw: Value) -> Self {
        match raw.as_object() {
            Some(obj) => {
                let text_field = |key: &str| {
                    obj.get(key)
                        .filter(|v| !v.is_null())
                        .map(value_to_text)
                };
                let error = text_field("error");
                let success = obj
                    .get("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(error.is_none());
                Self {
                    success,
                    content: text_field("content"),
                    result: obj.get("result").filter(|v| !v.is_null()).cloned(),
                    error,
                    artifact_path: text_field("artifact_path"),
                    raw,
                }
            }
            None => Self {
                success: true,
                content: None,
                result: Some(raw.clone()),
                error: None,
                artifact_path: None,
                raw,
            },
        }
    }

    /// 调用失败（工具返回 Err、超时、panic、未找到）时的结果
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            content: None,
            result: None,
            raw: serde_json::json!({ "error": error, "success": false }),
            error: Some(error),
            artifact_path: None,
        }
    }

    /// 读取任意原始字段的文本形式
    pub fn field_text(&self, key: &str) -> Option<String> {
        self.raw.get(key).filter(|v| !v.is_null()).map(value_to_text)
    }

    /// 按优先级生成 Observation；content 超过 max_chars 个字符时截断
    pub fn to_observation(&self, max_chars: usize) -> String {
        if let Some(err) = &self.error {
            return format!("Tool Error: {}", err);
        }
        if let Some(content) = &self.content {
            return truncate_chars(content, max_chars);
        }
        if let Some(result) = &self.result {
            return value_to_text(result);
        }
        if self.raw.is_object() {
            return serde_json::to_string_pretty(&self.raw).unwrap_or_else(|_| self.raw.to_string());
        }
        value_to_text(&self.raw)
    }
}

/// 按字符截断（不在 UTF-8 中间切断），超出时追加截断标记
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &text[..idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_field_wins() {
        let r = ToolResult::from_value(json!({"error": "bad path", "content": "x"}));
        assert!(!r.success);
        assert_eq!(r.to_observation(2000), "Tool Error: bad path");
    }

    #[test]
    fn test_content_preferred_over_result() {
        let r = ToolResult::from_value(json!({"content": "body", "result": 1}));
        assert!(r.success);
        assert_eq!(r.to_observation(2000), "body");
    }

    #[test]
    fn test_content_truncated() {
        let long = "é".repeat(2500);
        let r = ToolResult::from_value(json!({ "content": long }));
        let obs = r.to_observation(2000);
        assert!(obs.ends_with(TRUNCATION_MARKER));
        assert_eq!(obs.chars().count(), 2000 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_result_then_dump() {
        let r = ToolResult::from_value(json!({"result": "42"}));
        assert_eq!(r.to_observation(2000), "42");
        let r = ToolResult::from_value(json!({"rows": 3}));
        assert_eq!(r.to_observation(2000), "{\n  \"rows\": 3\n}");
    }

    #[test]
    fn test_non_object_value() {
        let r = ToolResult::from_value(json!("plain"));
        assert!(r.success);
        assert_eq!(r.to_observation(10), "plain");
    }

    #[test]
    fn test_explicit_success_flag_and_artifact() {
        let r = ToolResult::from_value(json!({"success": false, "artifact_path": "out/a.py"}));
        assert!(!r.success);
        assert_eq!(r.artifact_path.as_deref(), Some("out/a.py"));
    }
}
