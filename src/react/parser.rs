//! 模型响应解析
//!
//! 把 ReAct 格式的原始文本解析为 [`ParsedStep`]：
//! - `Final Answer:` 优先于 `Action:`（同时出现视为模型意图结束）
//! - `Action Input:` 参数按 [`PARAM_PARSERS`] 顺序尝试：JSON 对象 → key=value 行 → `{"input": 原文}`
//! - Thought 在所有分支中独立抽取
//!
//! 解析永不 panic、永不返回错误；无法识别的响应是 [`ParsedStep::Unparseable`]。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// 模型请求的一次工具调用
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub name: String,
    pub parameters: Map<String, Value>,
}

/// 一次模型响应的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedStep {
    Action {
        thought: Option<String>,
        request: ActionRequest,
    },
    FinalAnswer {
        thought: Option<String>,
        answer: String,
    },
    ThoughtOnly {
        thought: String,
    },
    Unparseable,
}

impl ParsedStep {
    pub fn thought(&self) -> Option<&str> {
        match self {
            ParsedStep::Action { thought, .. } | ParsedStep::FinalAnswer { thought, .. } => {
                thought.as_deref()
            }
            ParsedStep::ThoughtOnly { thought } => Some(thought),
            ParsedStep::Unparseable => None,
        }
    }
}

fn final_answer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)Final\s*Answer\s*:\s*(.+)").unwrap())
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^[ \t]*Action\s*:[ \t]*([^\n]*)").unwrap())
}

fn action_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)Action\s*Input\s*:\s*(.+?)(?:\n\s*\n|\nThought\s*:|\z)").unwrap()
    })
}

fn thought_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)Thought\s*:\s*(.+?)(?:\nAction|\nFinal\s*Answer|\z)").unwrap()
    })
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^```(?:json)?\s*(.+?)\s*```").unwrap())
}

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:[\w+\-]+)?[ \t]*\n(.+?)\n\s*```").unwrap())
}

fn key_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z_][\w\-]*)\s*(=|:)\s*(.*)$").unwrap())
}

/// 解析一次模型响应
pub fn parse(raw: &str) -> ParsedStep {
    let thought = extract_thought(raw);

    if let Some(answer) = final_answer_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
    {
        return ParsedStep::FinalAnswer {
            thought,
            answer: answer.to_string(),
        };
    }

    let name = action_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    match (name, thought) {
        (Some(name), thought) => {
            let parameters = action_input_re()
                .captures(raw)
                .and_then(|c| c.get(1))
                .map(|m| parse_parameters(m.as_str()))
                .unwrap_or_default();
            ParsedStep::Action {
                thought,
                request: ActionRequest { name, parameters },
            }
        }
        (None, Some(thought)) => ParsedStep::ThoughtOnly { thought },
        (None, None) => ParsedStep::Unparseable,
    }
}

/// 抽取 `Thought:` 段（到下一个 Action / Final Answer 行或文本末尾）
pub fn extract_thought(raw: &str) -> Option<String> {
    thought_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 参数解析策略：每一种都是全函数，返回 None 表示本层未命中
pub type ParamParser = fn(&str) -> Option<Map<String, Value>>;

/// 按顺序尝试，首个命中即返回；最后一层总是命中
pub const PARAM_PARSERS: &[(&str, ParamParser)] = &[
    ("json", parse_json_object),
    ("key_value", parse_key_values),
    ("raw_input", parse_raw_input),
];

/// 解析 Action Input 段为参数表
pub fn parse_parameters(segment: &str) -> Map<String, Value> {
    for (name, parser) in PARAM_PARSERS {
        if let Some(params) = parser(segment) {
            tracing::debug!(strategy = %name, "action input parsed");
            return params;
        }
    }
    Map::new()
}

/// JSON 对象（先剥掉 ``` / ```json 围栏）
fn parse_json_object(segment: &str) -> Option<Map<String, Value>> {
    let trimmed = segment.trim();
    let body = fence_re()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        return Some(map);
    }
    // 对象后面跟了多余文字
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&body[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// `key=value` / `key: value` 行，至少一对；`scheme://...` 形式的 URL 不算键值
fn parse_key_values(segment: &str) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    for line in segment.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('{') {
            continue;
        }
        if let Some(caps) = key_value_re().captures(line) {
            if &caps[2] == ":" && caps[3].starts_with("//") {
                continue;
            }
            let key = caps[1].to_string();
            let value = strip_quotes(caps[3].trim());
            map.insert(key, Value::String(value.to_string()));
        }
    }
    (!map.is_empty()).then_some(map)
}

fn parse_raw_input(segment: &str) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    map.insert(
        "input".to_string(),
        Value::String(segment.trim().to_string()),
    );
    Some(map)
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// 响应中第一个围栏代码块的内容
pub fn extract_code_block(text: &str) -> Option<String> {
    code_block_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
