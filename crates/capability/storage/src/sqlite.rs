//! SQLite 存储实现
//!
//! 通过 SQL 查询实现全部存储接口。
//!
//! ## 设计要点
//!
//! - **参数化查询**：所有 SQL 使用参数绑定，防止注入
//! - **饱和计数**：人数的减法在 SQL 里用 `MAX(..., 0)` 收底
//! - **事务**：穿门的两次人数更新放在同一个事务里
//! - **宽行读取**：门查询把内外设备一次 JOIN 出来，避免 N+1

use crate::error::StorageError;
use crate::models::{DevicePairRecord, DeviceRecord, NewDeviceLog, RoomRecord, RoomWithPopulation};
use crate::traits::{DeviceLogStore, DevicePairStore, DeviceStore, PopulationStore, RoomStore};
use async_trait::async_trait;
use domain::{ConnectionStatus, CrossingDirection, OwnerContext};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// SQLite 存储
pub struct SqliteStore {
    /// SQLite 连接池
    pub pool: SqlitePool,
}

impl SqliteStore {
    /// 用已初始化的连接池创建存储实例
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 从数据库 URL 建立连接池并完成启动迁移
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        crate::connection::auto_migrate(&pool).await?;
        Ok(Self { pool })
    }
}

/// 门查询的公共 SELECT：内外设备取别名列一次带出
const PAIR_COLUMNS: &str = "p.id AS pair_id, p.inner_room_id, p.outer_room_id, p.owner_id, \
     ig.id AS inner_id, ig.gate_id AS inner_gate, ig.status AS inner_status, ig.created_at AS inner_created_at, \
     og.id AS outer_id, og.gate_id AS outer_gate, og.status AS outer_status, og.created_at AS outer_created_at \
     FROM device_pairs p \
     JOIN devices ig ON ig.id = p.inner_gate_id \
     JOIN devices og ON og.id = p.outer_gate_id";

fn device_from_row(row: &SqliteRow) -> Result<DeviceRecord, StorageError> {
    Ok(DeviceRecord {
        id: row.try_get("id")?,
        gate_id: row.try_get::<i64, _>("gate_id")? as u16,
        status: ConnectionStatus::from_u8(row.try_get::<i64, _>("status")? as u8),
        created_at: row.try_get("created_at")?,
    })
}

fn pair_from_row(row: &SqliteRow) -> Result<DevicePairRecord, StorageError> {
    Ok(DevicePairRecord {
        id: row.try_get("pair_id")?,
        inner_gate: DeviceRecord {
            id: row.try_get("inner_id")?,
            gate_id: row.try_get::<i64, _>("inner_gate")? as u16,
            status: ConnectionStatus::from_u8(row.try_get::<i64, _>("inner_status")? as u8),
            created_at: row.try_get("inner_created_at")?,
        },
        outer_gate: DeviceRecord {
            id: row.try_get("outer_id")?,
            gate_id: row.try_get::<i64, _>("outer_gate")? as u16,
            status: ConnectionStatus::from_u8(row.try_get::<i64, _>("outer_status")? as u8),
            created_at: row.try_get("outer_created_at")?,
        },
        inner_room_id: row.try_get("inner_room_id")?,
        outer_room_id: row.try_get("outer_room_id")?,
        owner_id: row.try_get("owner_id")?,
    })
}

#[async_trait]
impl DeviceStore for SqliteStore {
    /// 按 gate_id 查找设备
    async fn find_device_by_gate(
        &self,
        gate_id: u16,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let row = sqlx::query("SELECT id, gate_id, status, created_at FROM devices WHERE gate_id = ?")
            .bind(i64::from(gate_id))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(device_from_row(&row)?))
    }

    /// 列出全部设备
    async fn list_all_devices(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let rows = sqlx::query("SELECT id, gate_id, status, created_at FROM devices")
            .fetch_all(&self.pool)
            .await?;

        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            devices.push(device_from_row(&row)?);
        }
        Ok(devices)
    }

    /// 更新设备连接状态；不存在的 gate_id 静默落空
    async fn set_device_status(
        &self,
        gate_id: u16,
        status: ConnectionStatus,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE devices SET status = ? WHERE gate_id = ?")
            .bind(i64::from(status.as_u8()))
            .bind(i64::from(gate_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DevicePairStore for SqliteStore {
    /// 列出全部门，内外闸门设备随行返回
    async fn list_pairs_with_gates(&self) -> Result<Vec<DevicePairRecord>, StorageError> {
        let rows = sqlx::query(&format!("SELECT {PAIR_COLUMNS}"))
            .fetch_all(&self.pool)
            .await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push(pair_from_row(&row)?);
        }
        Ok(pairs)
    }

    /// 列出指定归属的门
    async fn list_pairs_for_owner(
        &self,
        ctx: &OwnerContext,
    ) -> Result<Vec<DevicePairRecord>, StorageError> {
        let rows = sqlx::query(&format!("SELECT {PAIR_COLUMNS} WHERE p.owner_id = ?"))
            .bind(ctx.owner_id)
            .fetch_all(&self.pool)
            .await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push(pair_from_row(&row)?);
        }
        Ok(pairs)
    }

    /// 按任意一侧的 gate_id 查找所属的门
    async fn find_pair_by_gate(
        &self,
        gate_id: u16,
    ) -> Result<Option<DevicePairRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PAIR_COLUMNS} WHERE ig.gate_id = ? OR og.gate_id = ? LIMIT 1"
        ))
        .bind(i64::from(gate_id))
        .bind(i64::from(gate_id))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(pair_from_row(&row)?))
    }
}

#[async_trait]
impl RoomStore for SqliteStore {
    /// 列出指定归属的房间与当前人数
    ///
    /// 人数行缺失时按 0 返回，避免初始化顺序问题。
    async fn list_rooms_with_population(
        &self,
        ctx: &OwnerContext,
    ) -> Result<Vec<RoomWithPopulation>, StorageError> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.owner_id, COALESCE(rp.population, 0) AS population \
             FROM rooms r \
             LEFT JOIN room_populations rp ON rp.room_id = r.id \
             WHERE r.owner_id = ?",
        )
        .bind(ctx.owner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rooms = Vec::with_capacity(rows.len());
        for row in rows {
            rooms.push(RoomWithPopulation {
                room: RoomRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    owner_id: row.try_get("owner_id")?,
                },
                population: row.try_get::<i64, _>("population")? as u32,
            });
        }
        Ok(rooms)
    }
}

#[async_trait]
impl DeviceLogStore for SqliteStore {
    /// 追加一条设备日志
    async fn insert_device_log(&self, log: NewDeviceLog) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO device_logs (device_id, log_type, status, trigger_time) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(log.device_id)
        .bind(i64::from(log.log_type as u8))
        .bind(log.status.map(i64::from))
        .bind(log.trigger_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PopulationStore for SqliteStore {
    /// 在一个事务里记一次穿门
    ///
    /// 进入的一侧 +1、离开的一侧 -1；减法在 0 处饱和，
    /// 任一步失败整体回滚。
    async fn apply_crossing(
        &self,
        inner_room_id: i64,
        outer_room_id: i64,
        direction: CrossingDirection,
    ) -> Result<(), StorageError> {
        let (entered_room_id, left_room_id) = match direction {
            CrossingDirection::OuterToInner => (inner_room_id, outer_room_id),
            CrossingDirection::InnerToOuter => (outer_room_id, inner_room_id),
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE room_populations SET population = population + 1 WHERE room_id = ?")
            .bind(entered_room_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE room_populations SET population = MAX(population - 1, 0) WHERE room_id = ?",
        )
        .bind(left_room_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// 调整单个房间的人数，结果不会低于 0
    async fn adjust_population(&self, room_id: i64, delta: i32) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE room_populations SET population = MAX(population + ?, 0) WHERE room_id = ?",
        )
        .bind(i64::from(delta))
        .bind(room_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
