//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus 指标导出
//! - 双摄选择器指标记录与内存聚合
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init, metrics};
//!
//! observability::init()?;
//!
//! let outcome = selector.submit(master, frame, pipe_id, false, None)?;
//! metrics::record_submit("preview", master, outcome);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-exports
pub use crate::metrics::{
    record_buffer_release_failure, record_consistency_violation, record_eviction,
    record_pair_matched, record_queue_depth, record_selection, record_submit, MetricsSummary,
    RunningStats, SelectorMetricsAggregator, StatsSummary,
};

/// 初始化可观测性（Tracing + Prometheus）
///
/// - Tracing: JSON 格式，支持 RUST_LOG 环境变量
/// - Prometheus: 监听 0.0.0.0:9000
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// Prometheus 监听地址 (None = 禁用)
    pub metrics_addr: Option<SocketAddr>,
    /// 默认日志级别
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_addr: Some(SocketAddr::from(([0, 0, 0, 0], 9000))),
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// 只输出日志，不启动 Prometheus
    pub fn logs_only(log_format: LogFormat, default_log_level: impl Into<String>) -> Self {
        Self {
            log_format,
            metrics_addr: None,
            default_log_level: default_log_level.into(),
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON 结构化日志
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 使用自定义配置初始化
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let registry = tracing_subscriber::registry().with(filter);
    let initialized = match config.log_format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };
    initialized.context("Failed to initialize tracing subscriber")?;

    if let Some(addr) = config.metrics_addr {
        install_prometheus(addr)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_addr = ?config.metrics_addr,
        "Observability initialized"
    );

    Ok(())
}

/// 仅初始化 Prometheus 指标（不初始化 Tracing）
///
/// 用于 Tracing 已由其他模块初始化的场景。
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(SocketAddr::from(([0, 0, 0, 0], port)))
}

fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}
