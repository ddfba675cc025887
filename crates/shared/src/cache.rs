//! 进程内 TTL 缓存
//!
//! 映射配置与等级标准由运营在后台修改，服务只需在短 TTL 内感知变更，
//! 无需重启进程。过期条目在下次读取时经加载函数重新获取。
//!
//! ## 刷新策略
//!
//! 读取时检查写入时间，超过 TTL 即调用加载函数刷新；加载失败时若仍有过期值，
//! 使用过期值继续服务并记录告警，保证可用性。

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct CacheEntry<V> {
    value: V,
    loaded_at: Instant,
}

/// 按键缓存、按 TTL 过期的异步缓存
pub struct TtlCache<K, V> {
    name: &'static str,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    /// 创建缓存，`name` 仅用于日志
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// 使用秒数创建缓存
    pub fn with_ttl_seconds(name: &'static str, ttl_seconds: u64) -> Self {
        Self::new(name, Duration::from_secs(ttl_seconds))
    }

    /// 读取未过期的值
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// 写入值并重置过期时间
    pub async fn insert(&self, key: K, value: V) {
        self.entries.write().await.insert(
            key,
            CacheEntry {
                value,
                loaded_at: Instant::now(),
            },
        );
    }

    /// 读取缓存，过期或缺失时调用 `loader` 加载
    ///
    /// 加载失败且存在过期值时返回过期值；没有任何值可用时返回加载错误
    pub async fn get_or_try_load<F, Fut, E>(&self, key: &K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        match loader().await {
            Ok(value) => {
                self.insert(key.clone(), value.clone()).await;
                tracing::debug!(cache = self.name, key = ?key, "缓存已刷新");
                Ok(value)
            }
            Err(e) => {
                let entries = self.entries.read().await;
                if let Some(stale) = entries.get(key) {
                    tracing::warn!(
                        cache = self.name,
                        key = ?key,
                        error = %e,
                        "刷新缓存失败，使用过期缓存继续服务"
                    );
                    Ok(stale.value.clone())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// 清空缓存
    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_loader_called_once_within_ttl() {
        let cache: TtlCache<String, u32> = TtlCache::with_ttl_seconds("test", 60);
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let counter = calls.clone();
            let value = cache
                .get_or_try_load(&"k".to_string(), || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reloads() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new("test", Duration::ZERO);
        cache.insert("k", 1).await;
        assert!(cache.get(&"k").await.is_none());

        let value = cache
            .get_or_try_load(&"k", || async { Ok::<_, String>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_stale_value_served_when_loader_fails() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new("test", Duration::ZERO);
        cache.insert("k", 5).await;

        let value = cache
            .get_or_try_load(&"k", || async { Err::<u32, _>("db down".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, 5);

        let missing = cache
            .get_or_try_load(&"other", || async { Err::<u32, _>("db down".to_string()) })
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache: TtlCache<u8, u8> = TtlCache::with_ttl_seconds("test", 60);
        cache.insert(1, 1).await;
        cache.insert(2, 2).await;
        cache.invalidate_all().await;
        assert!(cache.get(&1).await.is_none());
        assert!(cache.get(&2).await.is_none());
    }
}
