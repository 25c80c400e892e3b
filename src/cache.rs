//! 可选的查询结果缓存：按 SQL 文本与参数的哈希建键，TTL 约束有效期，
//! 一把读写锁覆盖全部操作，另有一个后台任务定期清扫过期项。
//!
//! 这是优化层而非正确性要求；不挂接缓存时引擎行为完全不变。

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::collection::Collection;
use crate::value::Value;

#[derive(Debug)]
pub struct QueryCache {
    ttl: Duration,
    entries: RwLock<HashMap<u64, CacheEntry>>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    rows: Collection,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(sql: &str, bindings: &[Value]) -> u64 {
        let mut hasher = DefaultHasher::new();
        sql.hash(&mut hasher);
        bindings.hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&self, sql: &str, bindings: &[Value]) -> Option<Collection> {
        let key = Self::key(sql, bindings);
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(&key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.rows.clone())
    }

    pub fn put(&self, sql: &str, bindings: &[Value], rows: Collection) {
        let key = Self::key(sql, bindings);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                rows,
            },
        );
    }

    /// 移除所有过期项，返回移除的条数。
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| e.stored_at.elapsed() <= ttl);
        before - entries.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 启动后台清扫任务。任务只持有弱引用，缓存被丢弃后自行退出；也可以
    /// 直接 abort 返回的句柄。
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else { break };
                let evicted = cache.sweep();
                if evicted > 0 {
                    tracing::trace!(evicted, "query cache sweep");
                }
            }
        })
    }
}
