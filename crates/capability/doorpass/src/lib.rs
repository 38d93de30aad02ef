//! 穿门判定引擎。
//!
//! 一扇门由内外两只闸门组成。人穿门时会先后遮挡两只闸门的光束，
//! 每只闸门在光束恢复时上报一次 unblocked。把一只闸门相邻两次
//! 活动之间的间隔看作一个遮挡区间，再把两侧的遮挡区间放到时间轴
//! 上对齐，就能推断穿门方向，进而调整两侧房间的人数。
//!
//! 判定用到两个窗口：
//! - 遮挡区间不超过 [`ALLOWANCE_FRAME_MS`] 的视为发射端信号抖动；
//! - 两侧遮挡区间的起止间隔都落在 [`PASS_FRAME_MS`] 内才算同一个
//!   人先后经过两只闸门。

use domain::CrossingDirection;
use rewired_storage::{DevicePairStore, PopulationStore, StorageError};
use rewired_telemetry::record_crossing_committed;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// 小于等于该时长的遮挡视为信号噪声（毫秒）。
pub const ALLOWANCE_FRAME_MS: i64 = 500;

/// 两侧遮挡区间允许的最大间隔（毫秒）。
pub const PASS_FRAME_MS: i64 = 1000;

/// 门的某一侧。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Inner,
    Outer,
}

/// 最近一次尚未配对的遮挡区间。
#[derive(Debug, Clone, Copy)]
struct LastBlock {
    side: Option<Side>,
    start_ms: Option<i64>,
    end_ms: Option<i64>,
}

impl LastBlock {
    fn cleared() -> Self {
        Self {
            side: None,
            start_ms: None,
            end_ms: None,
        }
    }

    fn recorded(side: Side, start_ms: i64, end_ms: i64) -> Self {
        Self {
            side: Some(side),
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
        }
    }
}

/// 单侧闸门的活动记录。
#[derive(Debug, Clone, Copy)]
struct GateSide {
    gate_id: u16,
    last_active_ms: Option<i64>,
}

/// 可变的门状态，由每扇门自己的锁串行化。
#[derive(Debug)]
struct DoorState {
    inner: GateSide,
    outer: GateSide,
    last_block: LastBlock,
}

/// 一扇门：不变的房间绑定加上受锁保护的判定状态。
#[derive(Debug)]
struct Door {
    pair_id: i64,
    inner_room_id: i64,
    outer_room_id: i64,
    state: Mutex<DoorState>,
}

/// 穿门判定引擎。
///
/// 索引以 gate_id 为键，内外两个 gate_id 指向同一扇共享的门；
/// 索引本身在初始化后只读。
pub struct DoorEngine {
    doors: HashMap<u16, Arc<Door>>,
    populations: Arc<dyn PopulationStore>,
}

impl DoorEngine {
    /// 从存储加载全部门并建立索引。
    pub async fn init(
        pairs: Arc<dyn DevicePairStore>,
        populations: Arc<dyn PopulationStore>,
    ) -> Result<Self, StorageError> {
        let records = pairs.list_pairs_with_gates().await?;

        let mut doors = HashMap::with_capacity(records.len() * 2);
        for record in &records {
            let door = Arc::new(Door {
                pair_id: record.id,
                inner_room_id: record.inner_room_id,
                outer_room_id: record.outer_room_id,
                state: Mutex::new(DoorState {
                    inner: GateSide {
                        gate_id: record.inner_gate.gate_id,
                        last_active_ms: None,
                    },
                    outer: GateSide {
                        gate_id: record.outer_gate.gate_id,
                        last_active_ms: None,
                    },
                    last_block: LastBlock::cleared(),
                }),
            });
            doors.insert(record.inner_gate.gate_id, Arc::clone(&door));
            doors.insert(record.outer_gate.gate_id, door);
        }

        info!(doors = records.len(), "door engine initialized");
        Ok(Self { doors, populations })
    }

    /// 处理一次光束恢复事件。
    ///
    /// `now_ms` 用服务端接收时间；未登记的 gate_id 直接忽略。
    pub async fn gate_active(&self, gate_id: u16, now_ms: i64) {
        let Some(door) = self.doors.get(&gate_id) else {
            return;
        };

        let mut state = door.state.lock().await;

        let side = if state.inner.gate_id == gate_id {
            Side::Inner
        } else if state.outer.gate_id == gate_id {
            Side::Outer
        } else {
            return;
        };

        // 该侧首次活动只建立基线
        let Some(previous_ms) = last_active(&state, side) else {
            set_last_active(&mut state, side, now_ms);
            return;
        };

        // 过短的遮挡当作发射端抖动
        if now_ms - previous_ms <= ALLOWANCE_FRAME_MS {
            set_last_active(&mut state, side, now_ms);
            return;
        }

        // 真实遮挡区间 [previous_ms, now_ms]，与已记录的遮挡对齐
        match state.last_block.side {
            // 之前没有遮挡：记下本侧遮挡，等对侧响应
            None => {
                state.last_block = LastBlock::recorded(side, previous_ms, now_ms);
                set_last_active(&mut state, side, now_ms);
                return;
            }
            // 同侧再次遮挡：对象还没过门，用最新区间重新起算
            Some(recorded) if recorded == side => {
                state.last_block = LastBlock::recorded(side, previous_ms, now_ms);
                set_last_active(&mut state, side, now_ms);
                return;
            }
            // 对侧已有遮挡：进入穿门结算
            Some(_) => {}
        }

        // 两侧遮挡的起点差或终点差超过窗口时，对侧那次遮挡已经太
        // 久远，先把遮挡改记为本侧区间，随后照常走结算
        let too_stale = state
            .last_block
            .start_ms
            .is_none_or(|start_ms| previous_ms - start_ms > PASS_FRAME_MS)
            || state
                .last_block
                .end_ms
                .is_none_or(|end_ms| now_ms - end_ms > PASS_FRAME_MS);
        if too_stale {
            state.last_block = LastBlock::recorded(side, previous_ms, now_ms);
            set_last_active(&mut state, side, now_ms);
        }

        // 结算：后触发的一侧就是进入的一侧。人数更新仍在门锁内，
        // 同一扇门的判定与落库保持同序
        state.last_block = LastBlock::cleared();
        set_last_active(&mut state, side, now_ms);

        let direction = match side {
            Side::Inner => CrossingDirection::OuterToInner,
            Side::Outer => CrossingDirection::InnerToOuter,
        };

        info!(
            pair_id = door.pair_id,
            gate_id,
            direction = ?direction,
            "crossing committed"
        );
        record_crossing_committed();

        if let Err(err) = self
            .populations
            .apply_crossing(door.inner_room_id, door.outer_room_id, direction)
            .await
        {
            // 事务由存储侧回滚；内存里的判定状态已经前进，
            // 单次穿越的偏差可以接受
            error!(pair_id = door.pair_id, error = %err, "failed to update population after crossing");
        }
    }

    /// 已登记的门数。
    pub fn door_count(&self) -> usize {
        self.doors.len() / 2
    }
}

fn last_active(state: &DoorState, side: Side) -> Option<i64> {
    match side {
        Side::Inner => state.inner.last_active_ms,
        Side::Outer => state.outer.last_active_ms,
    }
}

fn set_last_active(state: &mut DoorState, side: Side, now_ms: i64) {
    match side {
        Side::Inner => state.inner.last_active_ms = Some(now_ms),
        Side::Outer => state.outer.last_active_ms = Some(now_ms),
    }
}
