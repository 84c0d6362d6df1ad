use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 以最多max_concurrent的并发度执行一组future，结果顺序与输入一致
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_concurrent: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let tasks = futures.into_iter().map(|future| {
        let semaphore = semaphore.clone();
        async move {
            // 信号量不会被关闭
            let _permit = semaphore.acquire().await.ok();
            future.await
        }
    });

    join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_respects_limit_and_order() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let futures = (0..6)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    i * 10
                }
            })
            .collect::<Vec<_>>();

        let results = do_parallel_with_limit(futures, 2).await;

        assert_eq!(results, vec![0, 10, 20, 30, 40, 50]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
