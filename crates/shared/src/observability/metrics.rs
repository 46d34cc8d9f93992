//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。
//! 未安装 recorder 时，记录函数为空操作。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const MEMBERSHIP_OPS_TOTAL: &str = "category_membership_ops_total";
pub const BADGE_OPS_TOTAL: &str = "category_badge_ops_total";
pub const BADGE_OP_DURATION_SECONDS: &str = "category_badge_op_duration_seconds";

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl MetricsHandle {
    /// 停止指标 HTTP 服务器
    pub fn shutdown(self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    describe_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

fn describe_metrics(service_name: &str) {
    metrics::describe_counter!(
        MEMBERSHIP_OPS_TOTAL,
        "Total number of membership operations by op and outcome"
    );
    metrics::describe_counter!(
        BADGE_OPS_TOTAL,
        "Total number of badge lifecycle operations by op and outcome"
    );
    metrics::describe_histogram!(
        BADGE_OP_DURATION_SECONDS,
        "Badge lifecycle operation duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// 记录成员关系操作
#[inline]
pub fn record_membership_op(category: &str, op: &'static str, outcome: &'static str) {
    metrics::counter!(
        MEMBERSHIP_OPS_TOTAL,
        "category" => category.to_string(),
        "op" => op,
        "outcome" => outcome
    )
    .increment(1);
}

/// 记录徽章生命周期操作
#[inline]
pub fn record_badge_op(category: &str, op: &'static str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!(
        BADGE_OPS_TOTAL,
        "category" => category.to_string(),
        "op" => op,
        "outcome" => outcome
    )
    .increment(1);

    metrics::histogram!(
        BADGE_OP_DURATION_SECONDS,
        "category" => category.to_string(),
        "op" => op
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_membership_op("citizens", "add_user", "ok");
        record_badge_op("citizens", "renew_badge", "badge_mismatch", 0.002);
        assert!(get_handle().is_none());
    }
}
