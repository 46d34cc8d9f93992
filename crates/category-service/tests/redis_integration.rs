//! Redis 集成测试
//!
//! 需要可用的 Redis 实例，默认忽略：
//!
//! ```bash
//! TEST_REDIS_URL=redis://localhost:6379/1 cargo test -p category-service -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use category::{
    CasOutcome, Category, CategoryError, KeyTtl, KeyValueStore, RandomTokenMinter, RedisStore,
};
use category_shared::config::RedisConfig;
use uuid::Uuid;

fn test_redis_config() -> RedisConfig {
    RedisConfig {
        url: std::env::var("TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379/1".to_string()),
        connect_timeout_seconds: 2,
    }
}

async fn redis_store() -> Arc<RedisStore> {
    Arc::new(
        RedisStore::connect(&test_redis_config())
            .await
            .expect("Redis should be reachable for ignored tests"),
    )
}

/// 每个测试使用独立的分组名，避免并行测试互相干扰
fn unique_category(store: Arc<RedisStore>, ttl: Duration) -> Category {
    Category::new(
        format!("test-{}", Uuid::new_v4()),
        ttl,
        store,
        Arc::new(RandomTokenMinter::default()),
    )
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_redis_health_check() {
    let store = redis_store().await;
    store.health_check().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_redis_ttl_and_compare_and_swap() {
    let store = redis_store().await;
    let key = format!("test:cas:{}", Uuid::new_v4());

    assert_eq!(store.ttl(&key).await.unwrap(), KeyTtl::Missing);
    assert_eq!(
        store.compare_and_swap(&key, "a", "b", None).await.unwrap(),
        CasOutcome::Missing
    );

    store
        .set(&key, "a", Some(Duration::from_secs(30)))
        .await
        .unwrap();
    assert!(matches!(store.ttl(&key).await.unwrap(), KeyTtl::Expires(_)));
    assert_eq!(
        store.compare_and_swap(&key, "x", "b", None).await.unwrap(),
        CasOutcome::Mismatch
    );
    assert_eq!(
        store
            .compare_and_swap(&key, "a", "b", Some(Duration::from_secs(30)))
            .await
            .unwrap(),
        CasOutcome::Swapped
    );
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("b"));

    store.delete(&key).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), None);
}

#[tokio::test]
#[ignore]
async fn test_redis_badge_lifecycle() {
    let category = unique_category(redis_store().await, Duration::from_secs(30));

    category.add_user("alice").await.unwrap();
    assert!(category.contains("alice").await.unwrap());

    let issued = category.issue_badge("alice").await.unwrap();
    let info = category.get_badge("alice").await.unwrap();
    assert_eq!(info.token, issued);
    assert!(info.remaining_ttl <= Duration::from_secs(30));

    let renewed = category.renew_badge("alice", &issued).await.unwrap();
    assert_ne!(renewed, issued);
    assert!(matches!(
        category.renew_badge("alice", &issued).await,
        Err(CategoryError::BadgeMismatch { .. })
    ));

    category.revoke_badge("alice").await.unwrap();
    category.remove_user("alice").await.unwrap();
    assert!(!category.contains("alice").await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_redis_badge_expiry() {
    let category = unique_category(redis_store().await, Duration::from_millis(200));

    category.issue_badge("alice").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(matches!(
        category.get_badge("alice").await,
        Err(CategoryError::BadgeExpired { .. })
    ));
}

#[tokio::test]
#[ignore]
async fn test_redis_concurrent_renewals() {
    let category = Arc::new(unique_category(redis_store().await, Duration::from_secs(30)));
    let issued = category.issue_badge("alice").await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let category = category.clone();
            let issued = issued.clone();
            tokio::spawn(async move { category.renew_badge("alice", issued).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        if let Ok(token) = handle.await.unwrap() {
            winners.push(token);
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(category.get_badge("alice").await.unwrap().token, winners[0]);
}
