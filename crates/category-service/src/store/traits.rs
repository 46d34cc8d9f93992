//! 存储 Trait 定义
//!
//! 分组依赖此抽象而非具体实现；过期完全由存储负责，调用方不维护本地时钟。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// 存储错误类型
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("存储不可用: {0}")]
    Unavailable(String),

    #[error("存储返回了意外的结果: {0}")]
    UnexpectedReply(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 剩余存活时间查询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// key 不存在（含已过期）
    Missing,
    /// key 存在且没有过期时间
    Persistent,
    /// key 存在，剩余存活时间
    Expires(Duration),
}

/// 比较交换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Swapped,
    /// 当前值与期望值不同，未写入
    Mismatch,
    /// key 不存在，未写入
    Missing,
}

/// 键值存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 写入值；`ttl` 为 None 或零时不设置过期时间
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// 删除 key，不存在时不报错
    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    /// 当且仅当当前值等于 `expected` 时原子地写入 `new`，并重置过期时间
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<CasOutcome>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// 过滤掉零时长，统一"无过期"的表示
pub(crate) fn effective_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|t| !t.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_ttl() {
        assert_eq!(effective_ttl(None), None);
        assert_eq!(effective_ttl(Some(Duration::ZERO)), None);
        assert_eq!(
            effective_ttl(Some(Duration::from_secs(5))),
            Some(Duration::from_secs(5))
        );
    }
}
