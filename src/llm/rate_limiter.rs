use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::RateLimitConfig;

/// 按key划分的滑动窗口限流器，key通常是Provider名称或外部服务名称
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_calls, Duration::from_secs(config.window_seconds))
    }

    /// 不做任何限制
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// 等待直到该key在窗口内仍有配额，然后登记本次调用
    pub async fn acquire(&self, key: &str) {
        loop {
            let wait = match self.try_acquire(key) {
                None => return,
                Some(wait) => wait,
            };
            debug!("⏳ {} 达到调用频率上限，等待 {:?}", key, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// 成功登记时返回None，否则返回需要等待的时长
    fn try_acquire(&self, key: &str) -> Option<Duration> {
        if self.max_calls == 0 || self.window.is_zero() {
            return None;
        }

        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        let history = calls.entry(key.to_string()).or_default();
        while let Some(front) = history.front() {
            if now.duration_since(*front) >= self.window {
                history.pop_front();
            } else {
                break;
            }
        }

        if history.len() < self.max_calls {
            history.push_back(now);
            return None;
        }

        history
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .map(|wait| wait.max(Duration::from_millis(1)))
    }

    /// 窗口内已登记的调用次数
    pub fn recent_calls(&self, key: &str) -> usize {
        let now = Instant::now();
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls
            .get(key)
            .map(|history| {
                history
                    .iter()
                    .filter(|at| now.duration_since(**at) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        for _ in 0..100 {
            limiter.acquire("groq").await;
        }
        assert_eq!(limiter.recent_calls("groq"), 0);
    }

    #[tokio::test]
    async fn test_waits_when_window_is_full() {
        let limiter = RateLimiter::new(2, Duration::from_millis(150));
        let started = Instant::now();
        limiter.acquire("translate").await;
        limiter.acquire("translate").await;
        assert!(started.elapsed() < Duration::from_millis(100));

        limiter.acquire("translate").await;
        assert!(started.elapsed() >= Duration::from_millis(140));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.acquire("groq").await;
        let started = Instant::now();
        limiter.acquire("gemini").await;
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.recent_calls("groq"), 1);
        assert_eq!(limiter.recent_calls("gemini"), 1);
    }
}
