//! 键值存储层
//!
//! - `traits`: 存储能力抽象（带过期时间的读写、剩余 TTL、原子比较交换）
//! - `redis_store`: 基于 Redis 的实现
//! - `memory_store`: 进程内实现，用于测试与本地开发

pub mod memory_store;
pub mod redis_store;
pub mod traits;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use traits::{CasOutcome, KeyTtl, KeyValueStore, StoreError, StoreResult};

#[cfg(test)]
pub use traits::MockKeyValueStore;
