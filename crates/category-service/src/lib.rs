//! 分组与徽章服务
//!
//! 管理用户在命名分组中的成员关系，以及成员持有的限时徽章令牌。
//!
//! ## 核心功能
//!
//! - **成员关系**：添加、移除、查询成员
//! - **徽章签发**：为成员生成不可预测的令牌，有效期由存储 TTL 控制
//! - **徽章续期**：出示当前令牌换取新令牌，原子比较交换防止并发续期互相覆盖
//! - **徽章撤销与查询**：显式撤销，查询令牌与剩余有效期
//!
//! ## 模块结构
//!
//! - `category`: 分组组件
//! - `identifier`: 用户标识与徽章令牌
//! - `error`: 错误类型定义
//! - `store`: 键值存储抽象与 Redis / 内存实现
//! - `minter`: 令牌生成器
//! - `keys`: 存储 key 命名

pub mod category;
pub mod error;
pub mod identifier;
pub mod keys;
pub mod minter;
pub mod store;

pub use category::{BadgeInfo, Category};
pub use error::{CategoryError, Result};
pub use identifier::{BadgeToken, UserId};
pub use minter::{MintError, RandomTokenMinter, TokenMinter, UuidTokenMinter, minter_from_config};
pub use store::{CasOutcome, KeyTtl, KeyValueStore, MemoryStore, RedisStore, StoreError};
