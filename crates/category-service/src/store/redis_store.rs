//! Redis 存储实现
//!
//! 过期写入使用 `SET ... PX`，剩余时间使用 `PTTL`，
//! 比较交换通过服务端 Lua 脚本完成，避免读-比较-写之间的竞态。

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info, instrument};

use category_shared::config::RedisConfig;

use super::traits::{CasOutcome, KeyTtl, KeyValueStore, StoreError, StoreResult, effective_ttl};

/// KEYS[1] = key, ARGV[1] = 期望值, ARGV[2] = 新值, ARGV[3] = 过期毫秒数（0 表示不过期）
///
/// 返回 1 = 已交换, 0 = 值不匹配, -1 = key 不存在
const COMPARE_AND_SWAP_LUA: &str = r#"
    local current = redis.call("GET", KEYS[1])
    if not current then
        return -1
    end
    if current ~= ARGV[1] then
        return 0
    end
    local ttl = tonumber(ARGV[3])
    if ttl > 0 then
        redis.call("SET", KEYS[1], ARGV[2], "PX", ttl)
    else
        redis.call("SET", KEYS[1], ARGV[2])
    end
    return 1
"#;

static COMPARE_AND_SWAP: LazyLock<Script> = LazyLock::new(|| Script::new(COMPARE_AND_SWAP_LUA));

/// 过期时间转换为毫秒，不足 1 毫秒按 1 毫秒计
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// 解析 PTTL 返回值：-2 表示不存在，-1 表示无过期时间
fn parse_pttl(reply: i64) -> StoreResult<KeyTtl> {
    match reply {
        -2 => Ok(KeyTtl::Missing),
        -1 => Ok(KeyTtl::Persistent),
        ms if ms >= 0 => Ok(KeyTtl::Expires(Duration::from_millis(ms as u64))),
        other => Err(StoreError::UnexpectedReply(format!("PTTL 返回 {}", other))),
    }
}

fn parse_cas_reply(reply: i64) -> StoreResult<CasOutcome> {
    match reply {
        1 => Ok(CasOutcome::Swapped),
        0 => Ok(CasOutcome::Mismatch),
        -1 => Ok(CasOutcome::Missing),
        other => Err(StoreError::UnexpectedReply(format!(
            "compare-and-swap 脚本返回 {}",
            other
        ))),
    }
}

/// Redis 键值存储
///
/// 持有一个多路复用连接，clone 后共享底层连接。
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// 连接 Redis
    ///
    /// 连接的生命周期由构造方持有；drop 最后一个 clone 即断开。
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let timeout = config.connect_timeout();

        let conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                StoreError::Unavailable(format!("连接 Redis 超时 ({}s)", timeout.as_secs()))
            })??;

        info!("Redis store connected");
        Ok(Self { conn })
    }

    /// 使用已有连接
    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn();
        match effective_ttl(ttl) {
            Some(ttl) => {
                let _: () = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let mut conn = self.conn();
        let reply: i64 = conn.pttl(key).await?;
        parse_pttl(reply)
    }

    #[instrument(skip(self, expected, new))]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<CasOutcome> {
        let mut conn = self.conn();
        let ttl_ms = effective_ttl(ttl).map(ttl_millis).unwrap_or(0);

        let reply: i64 = COMPARE_AND_SWAP
            .key(key)
            .arg(expected)
            .arg(new)
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await?;

        let outcome = parse_cas_reply(reply)?;
        debug!(key = %key, outcome = ?outcome, "compare-and-swap finished");
        Ok(outcome)
    }

    async fn health_check(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(StoreError::from)
    }
}
