//! 分组服务错误类型
//!
//! 定义成员关系与徽章生命周期的业务错误和存储错误

use std::convert::Infallible;

use thiserror::Error;

use crate::minter::MintError;
use crate::store::StoreError;

/// 分组服务错误类型
#[derive(Debug, Error)]
pub enum CategoryError {
    // === 输入校验 ===
    #[error("无效的标识: {reason}")]
    InvalidIdentifier { reason: String },

    #[error("无效的配置: {0}")]
    InvalidConfig(String),

    // === 徽章相关错误 ===
    #[error("徽章已过期或不存在: user_id={user_id}")]
    BadgeExpired { user_id: String },

    #[error("徽章不匹配: user_id={user_id}")]
    BadgeMismatch { user_id: String },

    // === 系统错误 ===
    #[error(transparent)]
    Mint(#[from] MintError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 分组服务 Result 类型别名
pub type Result<T> = std::result::Result<T, CategoryError>;

impl From<Infallible> for CategoryError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl CategoryError {
    pub(crate) fn invalid_identifier(reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            reason: reason.into(),
        }
    }

    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Mint(_) | Self::InvalidConfig(_))
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::BadgeExpired { .. } => "BADGE_EXPIRED",
            Self::BadgeMismatch { .. } => "BADGE_MISMATCH",
            Self::Mint(_) => "MINT_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// 指标标签
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "invalid_identifier",
            Self::InvalidConfig(_) => "invalid_config",
            Self::BadgeExpired { .. } => "badge_expired",
            Self::BadgeMismatch { .. } => "badge_mismatch",
            Self::Mint(_) => "mint_error",
            Self::Store(_) => "store_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(CategoryError::Store(StoreError::Unavailable("down".to_string())).is_retryable());
        assert!(
            !CategoryError::BadgeExpired {
                user_id: "alice".to_string()
            }
            .is_retryable()
        );
        assert!(!CategoryError::Mint(MintError::new("exhausted")).is_retryable());
    }

    #[test]
    fn test_error_is_business_error() {
        assert!(
            CategoryError::BadgeMismatch {
                user_id: "alice".to_string()
            }
            .is_business_error()
        );
        assert!(CategoryError::invalid_identifier("empty").is_business_error());
        assert!(!CategoryError::Mint(MintError::new("exhausted")).is_business_error());
        assert!(
            !CategoryError::Store(StoreError::Unavailable("down".to_string()))
                .is_business_error()
        );
    }

    #[test]
    fn test_error_code() {
        assert_eq!(
            CategoryError::invalid_identifier("empty").error_code(),
            "INVALID_IDENTIFIER"
        );
        assert_eq!(
            CategoryError::BadgeExpired {
                user_id: "alice".to_string()
            }
            .error_code(),
            "BADGE_EXPIRED"
        );
        assert_eq!(
            CategoryError::Mint(MintError::new("exhausted")).error_code(),
            "MINT_ERROR"
        );
    }

    #[test]
    fn test_error_display() {
        let err = CategoryError::BadgeMismatch {
            user_id: "user-123".to_string(),
        };
        assert!(err.to_string().contains("user-123"));

        let err = CategoryError::invalid_identifier("期望字符串, 实际为 number");
        assert!(err.to_string().contains("number"));
    }
}
