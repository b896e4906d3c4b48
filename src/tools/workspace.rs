//! 沙箱工作目录
//!
//! 工具写文件时路径必须落在 root 下：拒绝绝对路径与 `..` 组件；文件尚不存在，因此按组件检查而非 canonicalize。

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 校验相对路径并拼到 root 下
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, String> {
        let trimmed = relative.trim().trim_start_matches("./");
        if trimmed.is_empty() {
            return Err("Empty path".to_string());
        }
        let path = Path::new(trimmed);
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(format!("Path escapes workspace: {}", relative)),
            }
        }
        Ok(self.root.join(path))
    }

    /// 写文件（自动创建父目录），返回写入路径
    pub async fn write(&self, relative: &str, content: &str) -> Result<PathBuf, String> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create parent directory: {}", e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        Ok(path)
    }
}
