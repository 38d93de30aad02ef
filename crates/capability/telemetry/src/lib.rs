//! 追踪初始化与进程内计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub heartbeats: u64,
    pub device_log_failures: u64,
    pub crossings_committed: u64,
    pub population_adjustments: u64,
    pub snapshots_published: u64,
    pub ws_connects: u64,
    pub ws_disconnects: u64,
    pub ws_lagged_messages: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    packets_received: AtomicU64,
    packets_dropped: AtomicU64,
    heartbeats: AtomicU64,
    device_log_failures: AtomicU64,
    crossings_committed: AtomicU64,
    population_adjustments: AtomicU64,
    snapshots_published: AtomicU64,
    ws_connects: AtomicU64,
    ws_disconnects: AtomicU64,
    ws_lagged_messages: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            heartbeats: AtomicU64::new(0),
            device_log_failures: AtomicU64::new(0),
            crossings_committed: AtomicU64::new(0),
            population_adjustments: AtomicU64::new(0),
            snapshots_published: AtomicU64::new(0),
            ws_connects: AtomicU64::new(0),
            ws_disconnects: AtomicU64::new(0),
            ws_lagged_messages: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            device_log_failures: self.device_log_failures.load(Ordering::Relaxed),
            crossings_committed: self.crossings_committed.load(Ordering::Relaxed),
            population_adjustments: self.population_adjustments.load(Ordering::Relaxed),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
            ws_connects: self.ws_connects.load(Ordering::Relaxed),
            ws_disconnects: self.ws_disconnects.load(Ordering::Relaxed),
            ws_lagged_messages: self.ws_lagged_messages.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录收到的原始帧次数。
pub fn record_packet_received() {
    metrics().packets_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录解析失败被丢弃的帧次数。
pub fn record_packet_dropped() {
    metrics().packets_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录心跳次数。
pub fn record_heartbeat() {
    metrics().heartbeats.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备日志写入失败次数。
pub fn record_device_log_failure() {
    metrics().device_log_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录判定成立的穿门次数。
pub fn record_crossing_committed() {
    metrics().crossings_committed.fetch_add(1, Ordering::Relaxed);
}

/// 记录侧通道的人数调整次数。
pub fn record_population_adjustment() {
    metrics().population_adjustments.fetch_add(1, Ordering::Relaxed);
}

/// 记录推送出去的状态快照次数。
pub fn record_snapshot_published() {
    metrics().snapshots_published.fetch_add(1, Ordering::Relaxed);
}

/// 记录订阅端接入次数。
pub fn record_ws_connect() {
    metrics().ws_connects.fetch_add(1, Ordering::Relaxed);
}

/// 记录订阅端断开次数。
pub fn record_ws_disconnect() {
    metrics().ws_disconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录慢订阅端被挤掉的消息条数。
pub fn record_ws_lagged(skipped: u64) {
    metrics()
        .ws_lagged_messages
        .fetch_add(skipped, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let before = metrics().snapshot();
        record_packet_received();
        record_ws_lagged(3);
        let after = metrics().snapshot();
        assert_eq!(after.packets_received, before.packets_received + 1);
        assert_eq!(after.ws_lagged_messages, before.ws_lagged_messages + 3);
    }
}
