//! 服务器状态快照。
//!
//! 每秒构建一次指定归属的设备连接状态与房间人数，推给状态
//! 订阅端；没有订阅者时直接跳过查库。

use domain::OwnerContext;
use rewired_storage::{DevicePairStore, RoomStore, StorageError};
use rewired_telemetry::record_snapshot_published;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 快照周期。
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

/// 推送给订阅端的整体状态。
#[derive(Debug, Default, Serialize)]
pub struct ServerStatus {
    pub devices: Vec<DeviceStatus>,
    pub rooms: Vec<RoomStatus>,
}

/// 单台设备的连接状态。
#[derive(Debug, Serialize)]
pub struct DeviceStatus {
    pub id: u16,
    pub status: u8,
}

/// 单个房间的人数。
#[derive(Debug, Serialize)]
pub struct RoomStatus {
    pub name: String,
    pub population: u32,
}

/// 读取指定归属的设备与房间状态。
pub async fn build_status(
    ctx: &OwnerContext,
    pairs: &dyn DevicePairStore,
    rooms: &dyn RoomStore,
) -> Result<ServerStatus, StorageError> {
    let mut status = ServerStatus::default();

    for pair in pairs.list_pairs_for_owner(ctx).await? {
        status.devices.push(DeviceStatus {
            id: pair.inner_gate.gate_id,
            status: pair.inner_gate.status.as_u8(),
        });
        status.devices.push(DeviceStatus {
            id: pair.outer_gate.gate_id,
            status: pair.outer_gate.status.as_u8(),
        });
    }

    for room in rooms.list_rooms_with_population(ctx).await? {
        status.rooms.push(RoomStatus {
            name: room.room.name,
            population: room.population,
        });
    }

    Ok(status)
}

/// 周期推送状态快照，直到取消信号到来。
pub async fn run_status_snapshots(
    ctx: OwnerContext,
    pairs: Arc<dyn DevicePairStore>,
    rooms: Arc<dyn RoomStore>,
    status_tx: broadcast::Sender<String>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(SNAPSHOT_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // 构建要查库，没人订阅就不做
        if status_tx.receiver_count() == 0 {
            continue;
        }

        let status = match build_status(&ctx, pairs.as_ref(), rooms.as_ref()).await {
            Ok(status) => status,
            Err(err) => {
                warn!(owner_id = ctx.owner_id, error = %err, "failed to build server status");
                continue;
            }
        };

        match serde_json::to_string(&status) {
            Ok(json) => {
                if status_tx.send(json).is_ok() {
                    record_snapshot_published();
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize server status"),
        }
    }

    info!("status snapshotter stopped");
}
