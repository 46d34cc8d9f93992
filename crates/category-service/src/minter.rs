//! 令牌生成
//!
//! 分组只依赖 `TokenMinter` 抽象，令牌的格式与熵源由实现决定。

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use uuid::Uuid;

use category_shared::config::{CategoryConfig, MinterKind};

use crate::identifier::{BadgeToken, MAX_IDENTIFIER_LEN};

/// 令牌生成失败
#[derive(Debug, Error)]
#[error("令牌生成失败: {0}")]
pub struct MintError(String);

impl MintError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// 令牌生成器
#[cfg_attr(test, mockall::automock)]
pub trait TokenMinter: Send + Sync {
    fn mint(&self) -> Result<BadgeToken, MintError>;
}

/// 默认随机令牌字节数
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// 随机令牌字节数上限：编码后的长度不能超过 `MAX_IDENTIFIER_LEN`
pub const MAX_TOKEN_BYTES: usize = MAX_IDENTIFIER_LEN / 4 * 3;

/// 操作系统熵源生成的随机令牌，URL 安全 base64 编码（无填充）
#[derive(Debug, Clone)]
pub struct RandomTokenMinter {
    bytes: usize,
}

impl RandomTokenMinter {
    /// 创建随机令牌生成器
    ///
    /// 字节数必须在 `1..=MAX_TOKEN_BYTES` 之间。
    pub fn new(bytes: usize) -> Result<Self, MintError> {
        if bytes == 0 || bytes > MAX_TOKEN_BYTES {
            return Err(MintError::new(format!(
                "token_bytes 必须在 1..={} 之间, 实际为 {}",
                MAX_TOKEN_BYTES, bytes
            )));
        }
        Ok(Self { bytes })
    }
}

impl Default for RandomTokenMinter {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_TOKEN_BYTES,
        }
    }
}

impl TokenMinter for RandomTokenMinter {
    fn mint(&self) -> Result<BadgeToken, MintError> {
        let mut buf = vec![0u8; self.bytes];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| MintError::new(e.to_string()))?;

        BadgeToken::try_from(URL_SAFE_NO_PAD.encode(&buf)).map_err(|e| MintError::new(e.to_string()))
    }
}

/// UUID v4 令牌
#[derive(Debug, Clone, Default)]
pub struct UuidTokenMinter;

impl TokenMinter for UuidTokenMinter {
    fn mint(&self) -> Result<BadgeToken, MintError> {
        BadgeToken::try_from(Uuid::new_v4().to_string()).map_err(|e| MintError::new(e.to_string()))
    }
}

/// 按配置构建令牌生成器
///
/// 配置不合法时在启动阶段失败，而不是在每次签发时失败。
pub fn minter_from_config(config: &CategoryConfig) -> Result<Arc<dyn TokenMinter>, MintError> {
    let minter: Arc<dyn TokenMinter> = match config.minter {
        MinterKind::Random => Arc::new(RandomTokenMinter::new(config.token_bytes)?),
        MinterKind::Uuid => Arc::new(UuidTokenMinter),
    };
    Ok(minter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_minter_length() {
        let token = RandomTokenMinter::new(32).unwrap().mint().unwrap();
        // 32 字节 -> 43 个 base64 字符（无填充）
        assert_eq!(token.as_str().len(), 43);
        assert!(!token.as_str().contains('='));
    }

    #[test]
    fn test_random_minter_is_unpredictable() {
        let minter = RandomTokenMinter::default();
        let tokens: HashSet<String> = (0..100)
            .map(|_| minter.mint().unwrap().into_inner())
            .collect();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_token_bytes_bounds() {
        assert!(RandomTokenMinter::new(0).is_err());
        assert!(RandomTokenMinter::new(MAX_TOKEN_BYTES + 1).is_err());

        // 上限处编码后恰好为标识长度上限
        let token = RandomTokenMinter::new(MAX_TOKEN_BYTES).unwrap().mint().unwrap();
        assert_eq!(token.as_str().len(), MAX_IDENTIFIER_LEN);

        let token = RandomTokenMinter::new(1).unwrap().mint().unwrap();
        assert_eq!(token.as_str().len(), 2);
    }

    #[test]
    fn test_minter_from_config_rejects_bad_token_bytes() {
        for token_bytes in [0, 193, 200, usize::MAX] {
            let config = CategoryConfig {
                token_bytes,
                ..Default::default()
            };
            let err = minter_from_config(&config).err().unwrap();
            assert!(err.to_string().contains("token_bytes"));
        }
    }

    #[test]
    fn test_uuid_minter() {
        let token = UuidTokenMinter.mint().unwrap();
        assert!(Uuid::parse_str(token.as_str()).is_ok());
    }

    #[test]
    fn test_minter_from_config() {
        let config = CategoryConfig {
            minter: MinterKind::Uuid,
            ..Default::default()
        };
        let token = minter_from_config(&config).unwrap().mint().unwrap();
        assert!(Uuid::parse_str(token.as_str()).is_ok());

        let config = CategoryConfig {
            token_bytes: 16,
            ..Default::default()
        };
        let token = minter_from_config(&config).unwrap().mint().unwrap();
        assert_eq!(token.as_str().len(), 22);
    }
}
