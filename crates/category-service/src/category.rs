//! 分组（Category）
//!
//! 组合成员关系与徽章生命周期两部分职责：
//!
//! - **成员关系**：以存在性记录表示用户是否属于分组，记录不过期
//! - **徽章**：成员可持有至多一个限时令牌，过期完全由存储的 TTL 驱动
//!
//! ## 徽章状态机
//!
//! ```text
//! NoBadge --issue--> Active(token)
//! Active  --renew(当前令牌)--> Active(新令牌, TTL 重置)
//! Active  --renew(其他令牌)--> Active(不变), BadgeMismatch
//! Active  --revoke / TTL 到期--> NoBadge
//! NoBadge --renew--> NoBadge, BadgeExpired
//! ```
//!
//! 成员关系与徽章相互独立：移除成员默认不会撤销其徽章，
//! 需要级联时通过 `with_revoke_on_remove(true)` 打开。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Span, debug, field, info, instrument, warn};

use category_shared::config::CategoryConfig;
use category_shared::observability::metrics::{record_badge_op, record_membership_op};

use crate::error::{CategoryError, Result};
use crate::identifier::{BadgeToken, UserId, convert};
use crate::keys::{CategoryKeys, KEY_SEPARATOR, MEMBER_SENTINEL};
use crate::minter::TokenMinter;
use crate::store::{CasOutcome, KeyTtl, KeyValueStore, StoreError};

/// 当前徽章及其剩余有效期
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeInfo {
    pub token: BadgeToken,
    pub remaining_ttl: Duration,
}

/// 分组
///
/// 存储与令牌生成器由构造方注入，连接的生命周期也由构造方负责。
pub struct Category {
    name: String,
    badge_ttl: Duration,
    keys: CategoryKeys,
    store: Arc<dyn KeyValueStore>,
    minter: Arc<dyn TokenMinter>,
    revoke_badge_on_remove: bool,
}

impl Category {
    /// 创建分组
    ///
    /// 分组名不能为空，不能包含空白字符或 key 分隔符 `:`；徽章有效期必须大于零。
    pub fn new(
        name: impl Into<String>,
        badge_ttl: Duration,
        store: Arc<dyn KeyValueStore>,
        minter: Arc<dyn TokenMinter>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty()
            || name
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || c == KEY_SEPARATOR)
        {
            return Err(CategoryError::InvalidConfig(format!(
                "分组名不合法: {:?}",
                name
            )));
        }
        if badge_ttl.is_zero() {
            return Err(CategoryError::InvalidConfig(
                "徽章有效期必须大于零".to_string(),
            ));
        }

        Ok(Self {
            keys: CategoryKeys::new(&name),
            name,
            badge_ttl,
            store,
            minter,
            revoke_badge_on_remove: false,
        })
    }

    /// 按配置创建分组
    pub fn from_config(
        config: &CategoryConfig,
        store: Arc<dyn KeyValueStore>,
        minter: Arc<dyn TokenMinter>,
    ) -> Result<Self> {
        Ok(Self::new(config.name.clone(), config.badge_ttl(), store, minter)?
            .with_revoke_on_remove(config.revoke_badge_on_remove))
    }

    /// 移除成员时是否级联撤销徽章
    pub fn with_revoke_on_remove(mut self, enabled: bool) -> Self {
        self.revoke_badge_on_remove = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn badge_ttl(&self) -> Duration {
        self.badge_ttl
    }

    // ==================== 成员关系 ====================

    /// 添加成员（记录不过期）
    #[instrument(skip_all, fields(category = %self.name, user_id = field::Empty))]
    pub async fn add_user<U>(&self, uid: U) -> Result<()>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
    {
        let result = match self.user_id(uid) {
            Ok(uid) => self.add_member(&uid).await,
            Err(e) => Err(e),
        };
        self.record_membership("add_user", &result);
        result
    }

    /// 移除成员，非成员时为空操作
    #[instrument(skip_all, fields(category = %self.name, user_id = field::Empty))]
    pub async fn remove_user<U>(&self, uid: U) -> Result<()>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
    {
        let result = match self.user_id(uid) {
            Ok(uid) => self.remove_member(&uid).await,
            Err(e) => Err(e),
        };
        self.record_membership("remove_user", &result);
        result
    }

    /// 是否为成员
    ///
    /// 只有记录存在且等于成员哨兵值时才返回 true。
    #[instrument(skip_all, fields(category = %self.name, user_id = field::Empty))]
    pub async fn contains<U>(&self, uid: U) -> Result<bool>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
    {
        let result = match self.user_id(uid) {
            Ok(uid) => self.is_member(&uid).await,
            Err(e) => Err(e),
        };
        self.record_membership("contains", &result);
        result
    }

    /// `contains` 的别名
    pub async fn is_group_of<U>(&self, uid: U) -> Result<bool>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
    {
        self.contains(uid).await
    }

    // ==================== 徽章生命周期 ====================

    /// 签发徽章
    ///
    /// 生成新令牌并以配置的有效期写入，覆盖已有徽章。
    /// 不检查当前成员关系，由调用方负责。
    #[instrument(skip_all, fields(category = %self.name, user_id = field::Empty))]
    pub async fn issue_badge<U>(&self, uid: U) -> Result<BadgeToken>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
    {
        let started = Instant::now();
        let result = match self.user_id(uid) {
            Ok(uid) => self.issue(&uid).await,
            Err(e) => Err(e),
        };
        self.record_badge("issue_badge", started, &result);
        result
    }

    /// 续期徽章
    ///
    /// 出示的令牌必须等于当前存储的令牌，成功后返回新令牌并重置有效期。
    /// 最终写入通过存储的原子比较交换完成，并发续期中只有一方能成功。
    #[instrument(skip_all, fields(category = %self.name, user_id = field::Empty))]
    pub async fn renew_badge<U, P>(&self, uid: U, presented: P) -> Result<BadgeToken>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
        P: TryInto<BadgeToken>,
        CategoryError: From<P::Error>,
    {
        let started = Instant::now();
        let result = match (self.user_id(uid), convert::<BadgeToken, _>(presented)) {
            (Ok(uid), Ok(presented)) => self.renew(&uid, &presented).await,
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        self.record_badge("renew_badge", started, &result);
        result
    }

    /// 撤销徽章，没有徽章时为空操作
    #[instrument(skip_all, fields(category = %self.name, user_id = field::Empty))]
    pub async fn revoke_badge<U>(&self, uid: U) -> Result<()>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
    {
        let started = Instant::now();
        let result = match self.user_id(uid) {
            Ok(uid) => self.revoke(&uid).await,
            Err(e) => Err(e),
        };
        self.record_badge("revoke_badge", started, &result);
        result
    }

    /// 查询当前徽章及剩余有效期
    #[instrument(skip_all, fields(category = %self.name, user_id = field::Empty))]
    pub async fn get_badge<U>(&self, uid: U) -> Result<BadgeInfo>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
    {
        let started = Instant::now();
        let result = match self.user_id(uid) {
            Ok(uid) => self.lookup(&uid).await,
            Err(e) => Err(e),
        };
        self.record_badge("get_badge", started, &result);
        result
    }

    /// 存储健康检查
    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await.map_err(CategoryError::from)
    }

    // ==================== 内部实现 ====================

    fn user_id<U>(&self, uid: U) -> Result<UserId>
    where
        U: TryInto<UserId>,
        CategoryError: From<U::Error>,
    {
        let uid: UserId = convert(uid)?;
        Span::current().record("user_id", uid.as_str());
        Ok(uid)
    }

    fn expired(uid: &UserId) -> CategoryError {
        CategoryError::BadgeExpired {
            user_id: uid.to_string(),
        }
    }

    fn mismatch(uid: &UserId) -> CategoryError {
        CategoryError::BadgeMismatch {
            user_id: uid.to_string(),
        }
    }

    async fn add_member(&self, uid: &UserId) -> Result<()> {
        self.store
            .set(&self.keys.member(uid), MEMBER_SENTINEL, None)
            .await?;
        info!("成员已添加");
        Ok(())
    }

    async fn remove_member(&self, uid: &UserId) -> Result<()> {
        self.store.delete(&self.keys.member(uid)).await?;
        if self.revoke_badge_on_remove {
            self.store.delete(&self.keys.badge(uid)).await?;
            debug!("成员移除，徽章已级联撤销");
        }
        info!("成员已移除");
        Ok(())
    }

    async fn is_member(&self, uid: &UserId) -> Result<bool> {
        let value = self.store.get(&self.keys.member(uid)).await?;
        Ok(value.as_deref() == Some(MEMBER_SENTINEL))
    }

    async fn issue(&self, uid: &UserId) -> Result<BadgeToken> {
        let token = self.minter.mint()?;
        self.store
            .set(
                &self.keys.badge(uid),
                token.as_str(),
                Some(self.badge_ttl),
            )
            .await?;

        info!(ttl_secs = self.badge_ttl.as_secs(), "徽章已签发");
        Ok(token)
    }

    async fn renew(&self, uid: &UserId, presented: &BadgeToken) -> Result<BadgeToken> {
        let key = self.keys.badge(uid);

        let stored = match self.store.get(&key).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Err(Self::expired(uid)),
            Err(e) => {
                warn!(error = %e, "读取徽章失败，按已过期处理");
                return Err(Self::expired(uid));
            }
        };
        if stored != presented.as_str() {
            warn!("续期令牌与当前徽章不匹配");
            return Err(Self::mismatch(uid));
        }

        let token = self.minter.mint()?;
        let outcome = self
            .store
            .compare_and_swap(&key, presented.as_str(), token.as_str(), Some(self.badge_ttl))
            .await?;

        match outcome {
            CasOutcome::Swapped => {
                info!(ttl_secs = self.badge_ttl.as_secs(), "徽章已续期");
                Ok(token)
            }
            CasOutcome::Mismatch => {
                warn!("徽章在校验后被并发修改，续期失败");
                Err(Self::mismatch(uid))
            }
            CasOutcome::Missing => {
                debug!("徽章在校验后过期或被撤销");
                Err(Self::expired(uid))
            }
        }
    }

    async fn revoke(&self, uid: &UserId) -> Result<()> {
        self.store.delete(&self.keys.badge(uid)).await?;
        info!("徽章已撤销");
        Ok(())
    }

    async fn lookup(&self, uid: &UserId) -> Result<BadgeInfo> {
        let key = self.keys.badge(uid);

        let Some(value) = self.store.get(&key).await? else {
            return Err(Self::expired(uid));
        };

        match self.store.ttl(&key).await? {
            KeyTtl::Expires(remaining) if !remaining.is_zero() => Ok(BadgeInfo {
                token: BadgeToken::from_stored(value),
                remaining_ttl: remaining,
            }),
            KeyTtl::Expires(_) | KeyTtl::Missing => Err(Self::expired(uid)),
            KeyTtl::Persistent => Err(StoreError::UnexpectedReply(format!(
                "徽章记录没有过期时间: {}",
                key
            ))
            .into()),
        }
    }

    fn record_membership<T>(&self, op: &'static str, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        record_membership_op(&self.name, op, outcome);
    }

    fn record_badge<T>(&self, op: &'static str, started: Instant, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        record_badge_op(&self.name, op, outcome, started.elapsed().as_secs_f64());
    }
}
