//! 存储接口 Trait 定义
//!
//! 按资源拆分的异步接口：
//! - DeviceStore：设备查询与状态更新
//! - DevicePairStore：门（设备对）查询
//! - RoomStore：房间与人数查询
//! - DeviceLogStore：设备日志追加
//! - PopulationStore：人数计数调整
//!
//! 设计原则：
//! - 按归属过滤的接口显式接收 OwnerContext
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{DevicePairRecord, DeviceRecord, NewDeviceLog, RoomWithPopulation};
use async_trait::async_trait;
use domain::{ConnectionStatus, CrossingDirection, OwnerContext};

/// 设备存储接口
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 按 gate_id 查找设备
    async fn find_device_by_gate(&self, gate_id: u16)
    -> Result<Option<DeviceRecord>, StorageError>;

    /// 列出全部设备
    async fn list_all_devices(&self) -> Result<Vec<DeviceRecord>, StorageError>;

    /// 更新设备连接状态的持久化镜像
    async fn set_device_status(
        &self,
        gate_id: u16,
        status: ConnectionStatus,
    ) -> Result<(), StorageError>;
}

/// 门（设备对）存储接口
#[async_trait]
pub trait DevicePairStore: Send + Sync {
    /// 列出全部门，内外闸门设备随行返回
    async fn list_pairs_with_gates(&self) -> Result<Vec<DevicePairRecord>, StorageError>;

    /// 列出指定归属的门
    async fn list_pairs_for_owner(
        &self,
        ctx: &OwnerContext,
    ) -> Result<Vec<DevicePairRecord>, StorageError>;

    /// 按任意一侧的 gate_id 查找所属的门
    async fn find_pair_by_gate(
        &self,
        gate_id: u16,
    ) -> Result<Option<DevicePairRecord>, StorageError>;
}

/// 房间存储接口
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// 列出指定归属的房间与当前人数
    async fn list_rooms_with_population(
        &self,
        ctx: &OwnerContext,
    ) -> Result<Vec<RoomWithPopulation>, StorageError>;
}

/// 设备日志存储接口
#[async_trait]
pub trait DeviceLogStore: Send + Sync {
    /// 追加一条设备日志
    async fn insert_device_log(&self, log: NewDeviceLog) -> Result<(), StorageError>;
}

/// 人数计数存储接口
#[async_trait]
pub trait PopulationStore: Send + Sync {
    /// 在一个事务里记一次穿门：一侧 +1、另一侧 -1，减法在 0 处饱和
    async fn apply_crossing(
        &self,
        inner_room_id: i64,
        outer_room_id: i64,
        direction: CrossingDirection,
    ) -> Result<(), StorageError>;

    /// 调整单个房间的人数，结果不会低于 0
    async fn adjust_population(&self, room_id: i64, delta: i32) -> Result<(), StorageError>;
}

/// 聚合接口，供需要多种存储能力的消费方（如调度器）使用
pub trait Store: DeviceStore + DevicePairStore + RoomStore + DeviceLogStore + PopulationStore {}

impl<T> Store for T where
    T: DeviceStore + DevicePairStore + RoomStore + DeviceLogStore + PopulationStore
{
}
