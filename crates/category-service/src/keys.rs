//! 存储 key 生成
//!
//! 成员关系与徽章使用不同的命名空间，两张映射之间不会互相覆盖。

use crate::identifier::UserId;

/// key 各段之间的分隔符，分组名中不允许出现
pub const KEY_SEPARATOR: char = ':';

/// 成员关系记录的哨兵值
pub const MEMBER_SENTINEL: &str = "1";

/// 单个分组的 key 生成器
#[derive(Debug, Clone)]
pub struct CategoryKeys {
    member_prefix: String,
    badge_prefix: String,
}

impl CategoryKeys {
    pub fn new(category: &str) -> Self {
        Self {
            member_prefix: format!("category:{}:member:", category),
            badge_prefix: format!("category:{}:badge:", category),
        }
    }

    pub fn member(&self, uid: &UserId) -> String {
        format!("{}{}", self.member_prefix, uid)
    }

    pub fn badge(&self, uid: &UserId) -> String {
        format!("{}{}", self.badge_prefix, uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let keys = CategoryKeys::new("citizens");
        let uid = UserId::try_from("alice").unwrap();
        assert_eq!(keys.member(&uid), "category:citizens:member:alice");
        assert_eq!(keys.badge(&uid), "category:citizens:badge:alice");
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let keys = CategoryKeys::new("citizens");
        let uid = UserId::try_from("bob").unwrap();
        assert_ne!(keys.member(&uid), keys.badge(&uid));

        let other = CategoryKeys::new("visitors");
        assert_ne!(keys.badge(&uid), other.badge(&uid));
    }

    #[test]
    fn test_keys_of_distinct_categories_never_collide() {
        // 分组名不含分隔符时，前缀在第二个分隔符处结束，key 可唯一解析出分组名与命名空间
        let categories = ["a", "ab", "a-member", "citizens"];
        let users = ["x", "x:badge:y", "member:y", "badge", "y"];

        let mut seen = std::collections::HashMap::new();
        for category in categories {
            let keys = CategoryKeys::new(category);
            for raw in users {
                let uid = UserId::try_from(raw).unwrap();
                for (ns, key) in [("member", keys.member(&uid)), ("badge", keys.badge(&uid))] {
                    if let Some(prev) = seen.insert(key.clone(), (category, ns, raw)) {
                        panic!("key {} 同时属于 {:?} 和 {:?}", key, prev, (category, ns, raw));
                    }
                }
            }
        }
    }
}
