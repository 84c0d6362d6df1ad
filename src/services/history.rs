//! 调研历史记录

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::i18n::LanguageCode;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunStatus::Pending => "pending",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// 一次调研的历史记录
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RunRecord {
    pub id: u64,
    pub topic: String,
    pub language: LanguageCode,
    pub status: RunStatus,
    pub report_path: Option<PathBuf>,
    #[serde(default)]
    pub assets: Vec<AssetRecord>,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 成功时为报告摘要，失败时为错误原因
    pub summary: Option<String>,
}

/// 单个语言的产出文件
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AssetRecord {
    pub language: LanguageCode,
    pub text_path: PathBuf,
    pub audio_path: Option<PathBuf>,
}

/// 运行结束时写回的字段
#[derive(Debug, Clone, PartialEq)]
pub struct RunUpdate {
    pub status: RunStatus,
    pub report_path: Option<PathBuf>,
    pub assets: Vec<AssetRecord>,
    pub duration_seconds: Option<f64>,
    pub summary: Option<String>,
}

impl RunUpdate {
    pub fn failed(reason: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            status: RunStatus::Failed,
            report_path: None,
            assets: Vec::new(),
            duration_seconds: Some(duration_seconds),
            summary: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 创建pending状态的记录，返回记录ID
    async fn create(&self, topic: &str, language: LanguageCode) -> Result<u64>;

    async fn update(&self, id: u64, update: RunUpdate) -> Result<()>;

    /// 最近的记录在前
    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>>;
}

/// 以单个JSON文件保存的历史记录
pub struct JsonHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .context(format!("Failed to read history file: {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).context("Failed to parse history file")
    }

    async fn save(&self, records: &[RunRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, content)
            .await
            .context(format!("Failed to write history file: {:?}", self.path))
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn create(&self, topic: &str, language: LanguageCode) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let id = records.iter().map(|record| record.id).max().unwrap_or(0) + 1;
        records.push(RunRecord {
            id,
            topic: topic.to_string(),
            language,
            status: RunStatus::Pending,
            report_path: None,
            assets: Vec::new(),
            duration_seconds: None,
            created_at: Utc::now(),
            completed_at: None,
            summary: None,
        });
        self.save(&records).await?;
        Ok(id)
    }

    async fn update(&self, id: u64, update: RunUpdate) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .context(format!("History record {} not found", id))?;

        record.status = update.status;
        if update.report_path.is_some() {
            record.report_path = update.report_path;
        }
        if !update.assets.is_empty() {
            record.assets = update.assets;
        }
        record.duration_seconds = update.duration_seconds;
        record.summary = update.summary;
        if update.status != RunStatus::Pending {
            record.completed_at = Some(Utc::now());
        }
        self.save(&records).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_update_list() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("data").join("history.json"));

        let first = store.create("Solar Panel Efficiency", LanguageCode::English).await.unwrap();
        let second = store.create("Ocean Acidification", LanguageCode::French).await.unwrap();
        assert_eq!((first, second), (1, 2));

        let mut update = RunUpdate::failed("", 0.0);
        update.status = RunStatus::Completed;
        update.report_path = Some(PathBuf::from("output/Solar_Panel_Efficiency_final.md"));
        update.assets.push(AssetRecord {
            language: LanguageCode::English,
            text_path: PathBuf::from("output/report_en.md"),
            audio_path: Some(PathBuf::from("output/audio_en.mp3")),
        });
        update.summary = Some("done".to_string());
        store.update(first, update).await.unwrap();

        let listed = store.list(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[0].status, RunStatus::Pending);

        let record = &listed[1];
        assert_eq!(record.status, RunStatus::Completed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.assets.len(), 1);
        assert_eq!(store.list(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_reason() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json"));
        let id = store.create("Fusion", LanguageCode::Hindi).await.unwrap();

        store
            .update(id, RunUpdate::failed("no provider available", 1.5))
            .await
            .unwrap();

        let record = store.list(1).await.unwrap().remove(0);
        assert_eq!(record.id, id);
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.summary.as_deref(), Some("no provider available"));
        assert!(store.update(99, RunUpdate::failed("x", 0.0)).await.is_err());
    }
}
