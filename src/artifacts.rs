//! 产物提取与最近产物历史
//!
//! 两个来源，首个非空者胜出：
//! 1. 输出文本中的短语（"generated file" / "saved to" / ...）后跟带已识别扩展名的路径
//! 2. 工具结构化结果中的 `artifact_path`
//!
//! 分类只看扩展名：源码、脚本、标记类归入 `code`，其它扩展名即类型标签，无扩展名为 `file`。

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// 类型标签 → 路径列表
pub type ArtifactBundle = BTreeMap<String, Vec<String>>;

/// 归入 `code` 的扩展名
pub const CODE_EXTENSIONS: &[&str] = &["py", "js", "ts", "jsx", "tsx", "html", "css", "sh"];

/// 默认保留的历史条数
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

const OPEN_TERMS: &[&str] = &["open", "show", "display", "view", "run", "execute"];

fn artifact_phrase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)(?:generated (?:file|document|code file)|created (?:file|document|code)|saved (?:to|as)|file (?:is at|available at)|output (?:file|saved to)|code (?:file saved as|artifact saved))[^\n]*?:?\s*([^\s:`'"()\[\]<>]+\.(?:py|js|html|css|pdf|md|txt|json|sh|ts|jsx|tsx))\b"#,
        )
        .unwrap()
    })
}

/// 按扩展名分类
pub fn classify(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext {
        Some(ext) if CODE_EXTENSIONS.contains(&ext.as_str()) => "code".to_string(),
        Some(ext) if !ext.is_empty() => ext,
        _ => "file".to_string(),
    }
}

fn bundle_from<'a>(paths: impl IntoIterator<Item = &'a str>) -> ArtifactBundle {
    let mut bundle = ArtifactBundle::new();
    for path in paths {
        let entry = bundle.entry(classify(path)).or_default();
        if !entry.iter().any(|p| p == path) {
            entry.push(path.to_string());
        }
    }
    bundle
}

/// 从输出文本提取；文本中没有时退回结构化结果中的 artifact_path
pub fn extract(output_text: &str, artifact_paths: &[String]) -> Option<ArtifactBundle> {
    let from_text = bundle_from(
        artifact_phrase_re()
            .captures_iter(output_text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str()),
    );
    if !from_text.is_empty() {
        return Some(from_text);
    }
    let from_results = bundle_from(
        artifact_paths
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty()),
    );
    (!from_results.is_empty()).then_some(from_results)
}

/// 一次运行产生的产物
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub timestamp_ms: i64,
    pub task: String,
    pub artifacts: ArtifactBundle,
}

/// 最近产物历史（FIFO，超出容量淘汰最旧）
#[derive(Debug, Clone)]
pub struct ArtifactHistory {
    entries: VecDeque<ArtifactRecord>,
    capacity: usize,
}

impl Default for ArtifactHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ArtifactHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, task: impl Into<String>, artifacts: ArtifactBundle) {
        if artifacts.is_empty() {
            return;
        }
        self.entries.push_back(ArtifactRecord {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            task: task.into(),
            artifacts,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&ArtifactRecord> {
        self.entries.back()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 用户是否在请求打开最近一次的产物：含 open/show/view/run 等词，且提到文件名或扩展名
    pub fn artifact_request(&self, prompt: &str) -> Option<String> {
        let lower = prompt.to_lowercase();
        if !OPEN_TERMS.iter().any(|t| lower.contains(t)) {
            return None;
        }
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let latest = self.latest()?;
        latest
            .artifacts
            .values()
            .flatten()
            .find(|path| {
                let p = Path::new(path.as_str());
                let file_name = p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.to_lowercase())
                    .unwrap_or_default();
                let ext = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase())
                    .unwrap_or_default();
                (!file_name.is_empty() && lower.contains(&file_name))
                    || (!ext.is_empty() && words.contains(&ext.as_str()))
            })
            .cloned()
    }
}
