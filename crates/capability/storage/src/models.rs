//! 数据模型
//!
//! 定义所有存储相关的数据结构：
//! - 设备模型：DeviceRecord
//! - 门模型：DevicePairRecord（内外闸门随行）
//! - 房间模型：RoomRecord, RoomWithPopulation
//! - 设备日志：NewDeviceLog, LogType

use domain::ConnectionStatus;

/// 设备记录：一台闸门传感器。
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub id: i64,
    /// 设备侧烧录的 16 位稳定标识，全局唯一。
    pub gate_id: u16,
    pub status: ConnectionStatus,
    /// 创建时间，Unix 秒。
    pub created_at: i64,
}

/// 门记录：一对内外闸门与两侧的房间。
///
/// 不变式：内外闸门不同、两侧房间不同。
#[derive(Debug, Clone)]
pub struct DevicePairRecord {
    pub id: i64,
    pub inner_gate: DeviceRecord,
    pub outer_gate: DeviceRecord,
    pub inner_room_id: i64,
    pub outer_room_id: i64,
    pub owner_id: i64,
}

/// 房间记录。
#[derive(Debug, Clone)]
pub struct RoomRecord {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

/// 房间与当前人数。
#[derive(Debug, Clone)]
pub struct RoomWithPopulation {
    pub room: RoomRecord,
    pub population: u32,
}

/// 设备日志类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogType {
    Heartbeat = 1,
    GateStatus = 2,
    Increment = 3,
    Decrement = 4,
}

/// 待写入的设备日志。日志只增不改，也不由服务端删除。
#[derive(Debug, Clone)]
pub struct NewDeviceLog {
    pub device_id: i64,
    pub log_type: LogType,
    /// 仅状态日志携带：1 开机、2 光束恢复、3 光束遮挡、4 故障。
    pub status: Option<u8>,
    /// 仅状态日志携带：设备侧触发时间，Unix 秒。
    pub trigger_time: Option<i64>,
}
