//! 设备在线状态跟踪。
//!
//! 每收到一次心跳就把设备续命 60 秒，同时把掉线转在线的变化写回
//! 存储；后台任务每 5 秒清扫一次，把续命过期的设备标记为掉线并
//! 落库。心跳周期远小于 60 秒，宽限窗口用来容忍 TCP 抖动，
//! 清扫周期决定掉线检测的最大延迟。

use domain::{ConnectionStatus, now_epoch_ms};
use rewired_storage::{DeviceStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 心跳失效窗口。
pub const CONNECTION_TTL: Duration = Duration::from_secs(60);

/// 清扫周期。
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct DeviceState {
    connected: bool,
    valid_till_ms: i64,
}

/// 在线状态跟踪器。
///
/// 整表一把锁：心跳入口与清扫任务互斥。
pub struct LivenessTracker {
    states: Mutex<HashMap<u16, DeviceState>>,
    devices: Arc<dyn DeviceStore>,
}

impl LivenessTracker {
    /// 从存储加载全部设备，初始化在线表。
    pub async fn init(devices: Arc<dyn DeviceStore>) -> Result<Arc<Self>, StorageError> {
        let all = devices.list_all_devices().await?;
        let now_ms = now_epoch_ms();

        let mut states = HashMap::with_capacity(all.len());
        for device in all {
            states.insert(
                device.gate_id,
                DeviceState {
                    connected: device.status.is_connected(),
                    valid_till_ms: now_ms + CONNECTION_TTL.as_millis() as i64,
                },
            );
        }

        info!(devices = states.len(), "liveness tracker initialized");
        Ok(Arc::new(Self {
            states: Mutex::new(states),
            devices,
        }))
    }

    /// 心跳续命入口。
    pub async fn keep_connected(&self, gate_id: u16) {
        self.keep_connected_at(gate_id, now_epoch_ms()).await;
    }

    /// 以显式时钟续命。
    pub async fn keep_connected_at(&self, gate_id: u16, now_ms: i64) {
        let mut states = self.states.lock().await;

        let Some(state) = states.get_mut(&gate_id) else {
            warn!(gate_id, "heartbeat from unknown gate");
            return;
        };

        if state.connected {
            state.valid_till_ms = now_ms + CONNECTION_TTL.as_millis() as i64;
            return;
        }

        // 掉线转在线先落库；写失败时保持掉线，等下一次心跳重试
        if let Err(err) = self
            .devices
            .set_device_status(gate_id, ConnectionStatus::Connected)
            .await
        {
            warn!(gate_id, error = %err, "failed to save device status update");
            return;
        }

        state.connected = true;
        state.valid_till_ms = now_ms + CONNECTION_TTL.as_millis() as i64;
        info!(gate_id, "device connected");
    }

    /// 单次清扫：把续命过期的设备标记为掉线并落库。
    pub async fn sweep_at(&self, now_ms: i64) {
        let mut states = self.states.lock().await;

        for (gate_id, state) in states.iter_mut() {
            if !state.connected || state.valid_till_ms >= now_ms {
                continue;
            }

            if let Err(err) = self
                .devices
                .set_device_status(*gate_id, ConnectionStatus::Disconnected)
                .await
            {
                warn!(gate_id, error = %err, "failed to save device status update");
                continue;
            }

            state.connected = false;
            info!(gate_id, "device timed out");
        }
    }

    /// 读取当前的在线标记（测试与诊断用）。
    pub async fn is_connected(&self, gate_id: u16) -> Option<bool> {
        self.states
            .lock()
            .await
            .get(&gate_id)
            .map(|state| state.connected)
    }

    /// 后台清扫循环，直到取消信号到来。
    pub async fn run_sweeper(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.sweep_at(now_epoch_ms()).await,
            }
        }
        info!("liveness sweeper stopped");
    }
}
