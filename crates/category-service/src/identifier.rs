//! 用户标识与徽章令牌
//!
//! 两者都是对字符串的强类型包装，在 API 边界一次性校验。
//! 非字符串输入（来自 JSON 等无类型来源）统一转换为 `InvalidIdentifier`。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CategoryError;

/// 标识的最大字节长度
pub const MAX_IDENTIFIER_LEN: usize = 256;

fn validate(kind: &str, raw: &str) -> Result<(), CategoryError> {
    if raw.is_empty() {
        return Err(CategoryError::invalid_identifier(format!("{kind} 不能为空")));
    }
    if raw.len() > MAX_IDENTIFIER_LEN {
        return Err(CategoryError::invalid_identifier(format!(
            "{kind} 长度 {} 超过上限 {MAX_IDENTIFIER_LEN}",
            raw.len()
        )));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CategoryError::invalid_identifier(format!(
            "{kind} 不能包含空白或控制字符"
        )));
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_string<'a>(kind: &str, value: &'a Value) -> Result<&'a str, CategoryError> {
    value.as_str().ok_or_else(|| {
        CategoryError::invalid_identifier(format!(
            "{kind} 期望字符串, 实际为 {}",
            json_kind(value)
        ))
    })
}

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl From<&$name> for $name {
            fn from(value: &$name) -> Self {
                value.clone()
            }
        }

        impl TryFrom<String> for $name {
            type Error = CategoryError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate($kind, &value)?;
                Ok(Self(value))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = CategoryError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                validate($kind, value)?;
                Ok(Self(value.to_string()))
            }
        }

        impl TryFrom<&String> for $name {
            type Error = CategoryError;

            fn try_from(value: &String) -> Result<Self, Self::Error> {
                Self::try_from(value.as_str())
            }
        }

        impl TryFrom<&Value> for $name {
            type Error = CategoryError;

            fn try_from(value: &Value) -> Result<Self, Self::Error> {
                Self::try_from(expect_string($kind, value)?)
            }
        }

        impl TryFrom<Value> for $name {
            type Error = CategoryError;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    Value::String(s) => Self::try_from(s),
                    other => Self::try_from(&other),
                }
            }
        }
    };
}

string_identifier!(
    /// 用户标识
    UserId,
    "user_id"
);

string_identifier!(
    /// 徽章令牌
    ///
    /// 令牌值对分组不透明，只用于相等比较；不要写入日志。
    BadgeToken,
    "badge"
);

impl BadgeToken {
    /// 包装从存储中读出的值，不做格式校验
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }
}

/// 将调用方输入转换为强类型标识
pub(crate) fn convert<T, U>(input: U) -> Result<T, CategoryError>
where
    U: TryInto<T>,
    CategoryError: From<U::Error>,
{
    input.try_into().map_err(CategoryError::from)
}
