use std::path::{Path, PathBuf};

use tokio::fs;

pub mod summary;

pub use summary::RunSummary;

/// 输出目录下的文件落盘
#[derive(Debug, Clone)]
pub struct DiskOutlet {
    output_dir: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 相对路径落在输出目录下，绝对路径保持不变
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.output_dir.join(path)
        }
    }

    pub async fn save_text(&self, path: &Path, content: &str) -> std::io::Result<PathBuf> {
        self.save_bytes(path, content.as_bytes()).await
    }

    pub async fn save_bytes(&self, path: &Path, content: &[u8]) -> std::io::Result<PathBuf> {
        let target = self.resolve(path);
        // 确保父目录存在
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, content).await?;
        Ok(target)
    }
}
