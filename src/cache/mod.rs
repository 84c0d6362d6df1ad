use anyhow::Result;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::warn;

use crate::config::CacheConfig;

/// 阶段输出缓存，键为prompt的MD5
pub struct CacheManager {
    config: CacheConfig,
    stats: CacheStats,
}

/// 缓存条目
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: u64,
    /// prompt的MD5哈希值，用于缓存键的生成和验证
    pub prompt_hash: String,
    /// 使用的模型名称（可选）
    pub model_name: Option<String>,
}

#[derive(Default)]
struct CacheStats {
    hits: AtomicUsize,
    misses: AtomicUsize,
    writes: AtomicUsize,
    errors: AtomicUsize,
}

/// 本次运行的缓存统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheReport {
    pub hits: usize,
    pub misses: usize,
    pub writes: usize,
    pub errors: usize,
}

impl CacheReport {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            stats: CacheStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// 生成prompt的MD5哈希
    pub fn hash_prompt(&self, prompt: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 获取缓存文件路径
    fn get_cache_path(&self, category: &str, hash: &str) -> PathBuf {
        self.config
            .cache_dir
            .join(category)
            .join(format!("{}.json", hash))
    }

    /// 检查缓存是否过期
    fn is_expired(&self, timestamp: u64) -> bool {
        let expire_seconds = self.config.expire_hours * 3600;
        now_secs().saturating_sub(timestamp) > expire_seconds
    }

    /// 获取缓存，损坏或过期的条目视为未命中
    pub async fn get<T>(&self, category: &str, prompt: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        if !self.config.enabled {
            return Ok(None);
        }

        let hash = self.hash_prompt(prompt);
        let cache_path = self.get_cache_path(category, &hash);

        if !cache_path.exists() {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        match fs::read_to_string(&cache_path).await {
            Ok(content) => match serde_json::from_str::<CacheEntry<T>>(&content) {
                Ok(entry) => {
                    if self.is_expired(entry.timestamp) {
                        // 删除过期缓存
                        let _ = fs::remove_file(&cache_path).await;
                        self.stats.misses.fetch_add(1, Ordering::Relaxed);
                        return Ok(None);
                    }
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(entry.data))
                }
                Err(e) => {
                    warn!("⚠️ 缓存反序列化失败 {:?}: {}", cache_path, e);
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
            },
            Err(e) => {
                warn!("⚠️ 读取缓存文件失败 {:?}: {}", cache_path, e);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// 设置缓存
    pub async fn set<T>(
        &self,
        category: &str,
        prompt: &str,
        data: T,
        model_name: Option<String>,
    ) -> Result<()>
    where
        T: Serialize,
    {
        if !self.config.enabled {
            return Ok(());
        }

        let hash = self.hash_prompt(prompt);
        let cache_path = self.get_cache_path(category, &hash);

        // 确保目录存在
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let entry = CacheEntry {
            data,
            timestamp: now_secs(),
            prompt_hash: hash,
            model_name,
        };

        let content = serde_json::to_string_pretty(&entry).inspect_err(|_| {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
        })?;
        fs::write(&cache_path, content).await.inspect_err(|_| {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
        })?;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 生成统计报告
    pub fn report(&self) -> CacheReport {
        CacheReport {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            writes: self.stats.writes.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
        }
    }
}
