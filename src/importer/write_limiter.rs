// ==========================================
// 配置器导入管道 - 单表写入并发限制
// ==========================================
// 同一张表的逐行写入作为独立的异步操作并发派发,
// 信号量限制同时在途的写入数,join_all 作为表级屏障
// ==========================================

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct WriteLimiter {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
}

impl WriteLimiter {
    /// 创建限制器（上限至少为 1）
    pub fn new(max_in_flight: usize) -> Self {
        let permits = max_in_flight.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            max_in_flight: permits,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// 获取一个写入许可,满额时等待；许可在 drop 时归还
    ///
    /// 信号量从不关闭,None 只在理论上出现,此时不限流继续执行
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        if self.semaphore.available_permits() == 0 {
            debug!(max_in_flight = self.max_in_flight, "写入并发已满,等待许可");
        }
        self.semaphore.clone().acquire_owned().await.ok()
    }

    /// 并发执行全部写入,等待所有结果（成功或失败）后返回,结果顺序与输入一致
    ///
    /// op 只构造 future,future 在拿到许可后才开始执行
    pub async fn run_bounded<T, F, Fut>(&self, items: Vec<T>, op: F) -> Vec<Fut::Output>
    where
        F: Fn(T) -> Fut,
        Fut: Future,
    {
        let tasks = items.into_iter().map(|item| {
            let fut = op(item);
            async move {
                let _permit = self.acquire().await;
                fut.await
            }
        });
        join_all(tasks).await
    }
}
