//! 冲突重试
//!
//! 账本按组织串行写入，并发请求在唯一键或行锁上竞争失败时可以立即重放。
//! 只有调用方判定为可重试的错误才会重放，余额不足等业务拒绝直接返回。

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// 指数退避策略，每次重试等待时间翻倍，不超过 `max_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 首次执行之外的最大重试次数
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// 并发写冲突使用的毫秒级退避
    pub fn conflict(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }

    /// 第 `attempt` 次重试（从 0 开始）前的等待时间
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// 按策略执行异步操作
///
/// `is_retryable` 返回 false 的错误立即返回；重试用尽后返回最后一次的错误
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = operation_name, attempt, "冲突重试后成功");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }
        if attempt >= policy.max_retries {
            warn!(
                operation = operation_name,
                max_retries = policy.max_retries,
                error = %err,
                "冲突重试次数已用尽"
            );
            return Err(err);
        }

        let delay = policy.delay_for_attempt(attempt);
        debug!(
            operation = operation_name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "写冲突，退避后重试"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum LedgerConflict {
        SequenceTaken,
        InsufficientBalance,
    }

    impl std::fmt::Display for LedgerConflict {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_conflict_delays_are_capped() {
        let policy = RetryPolicy::conflict(3);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(5));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_conflict_replayed_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = retry_with_policy(
            &fast(3),
            "grant",
            |e: &LedgerConflict| *e == LedgerConflict::SequenceTaken,
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LedgerConflict::SequenceTaken)
                } else {
                    Ok(7)
                }
            },
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = retry_with_policy(
            &fast(2),
            "revoke",
            |_| true,
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerConflict::SequenceTaken)
            },
        )
        .await;

        assert_eq!(result, Err(LedgerConflict::SequenceTaken));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_business_rejection_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = retry_with_policy(
            &fast(5),
            "revoke",
            |e: &LedgerConflict| *e == LedgerConflict::SequenceTaken,
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerConflict::InsufficientBalance)
            },
        )
        .await;

        assert_eq!(result, Err(LedgerConflict::InsufficientBalance));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
