//! 预聚合计数侧通道。
//!
//! 自带判定逻辑的设备会直接上报加减计数。约定两侧闸门都指向
//! 该门的内侧房间：加减只作用于内侧房间的人数。

use rewired_storage::Store;
use rewired_telemetry::record_population_adjustment;
use tracing::warn;

/// 把 gate_id 所属门的内侧房间人数 +1。
pub async fn increment_population(store: &dyn Store, gate_id: u16) {
    adjust_inner_room(store, gate_id, 1).await;
}

/// 把 gate_id 所属门的内侧房间人数 -1，在 0 处饱和。
pub async fn decrement_population(store: &dyn Store, gate_id: u16) {
    adjust_inner_room(store, gate_id, -1).await;
}

async fn adjust_inner_room(store: &dyn Store, gate_id: u16, delta: i32) {
    let pair = match store.find_pair_by_gate(gate_id).await {
        Ok(Some(pair)) => pair,
        Ok(None) => {
            warn!(gate_id, "no device pair registered for gate");
            return;
        }
        Err(err) => {
            warn!(gate_id, error = %err, "failed to find the device pair");
            return;
        }
    };

    if let Err(err) = store.adjust_population(pair.inner_room_id, delta).await {
        warn!(
            gate_id,
            room_id = pair.inner_room_id,
            error = %err,
            "failed to adjust the room population"
        );
        return;
    }

    record_population_adjustment();
}
