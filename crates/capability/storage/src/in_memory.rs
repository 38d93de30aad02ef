//! 内存存储实现
//!
//! 仅用于测试和本地演示。使用 RwLock 保护的单块状态，
//! 另提供 seed_* 植入方法与只读探查方法。

use crate::error::StorageError;
use crate::models::{DevicePairRecord, DeviceRecord, NewDeviceLog, RoomRecord, RoomWithPopulation};
use crate::traits::{DeviceLogStore, DevicePairStore, DeviceStore, PopulationStore, RoomStore};
use async_trait::async_trait;
use domain::{ConnectionStatus, CrossingDirection, OwnerContext};
use std::collections::HashMap;
use std::sync::RwLock;

/// 门的内部表示：只存引用，物化时再查设备。
#[derive(Debug, Clone)]
struct StoredPair {
    id: i64,
    inner_device_id: i64,
    outer_device_id: i64,
    inner_room_id: i64,
    outer_room_id: i64,
    owner_id: i64,
}

#[derive(Debug, Default)]
struct InMemoryState {
    next_id: i64,
    devices: Vec<DeviceRecord>,
    pairs: Vec<StoredPair>,
    rooms: HashMap<i64, RoomRecord>,
    populations: HashMap<i64, u32>,
    logs: Vec<NewDeviceLog>,
}

impl InMemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn device_by_id(&self, device_id: i64) -> Option<&DeviceRecord> {
        self.devices.iter().find(|device| device.id == device_id)
    }

    fn materialize_pair(&self, pair: &StoredPair) -> Option<DevicePairRecord> {
        Some(DevicePairRecord {
            id: pair.id,
            inner_gate: self.device_by_id(pair.inner_device_id)?.clone(),
            outer_gate: self.device_by_id(pair.outer_device_id)?.clone(),
            inner_room_id: pair.inner_room_id,
            outer_room_id: pair.outer_room_id,
            owner_id: pair.owner_id,
        })
    }
}

/// 内存存储
pub struct InMemoryStore {
    state: RwLock<InMemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(InMemoryState::default()),
        }
    }

    /// 植入一台设备，返回记录 id。
    pub fn seed_device(
        &self,
        gate_id: u16,
        status: ConnectionStatus,
    ) -> Result<i64, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if state.devices.iter().any(|device| device.gate_id == gate_id) {
            return Err(StorageError::Constraint(format!(
                "gate_id {gate_id} already registered"
            )));
        }

        let id = state.allocate_id();
        state.devices.push(DeviceRecord {
            id,
            gate_id,
            status,
            created_at: 0,
        });
        Ok(id)
    }

    /// 植入一个房间与初始人数，返回房间 id。
    pub fn seed_room(
        &self,
        name: &str,
        owner_id: i64,
        population: u32,
    ) -> Result<i64, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;

        let id = state.allocate_id();
        state.rooms.insert(
            id,
            RoomRecord {
                id,
                name: name.to_string(),
                owner_id,
            },
        );
        state.populations.insert(id, population);
        Ok(id)
    }

    /// 植入一扇门（两侧设备须已存在），返回门 id。
    pub fn seed_pair(
        &self,
        inner_gate: u16,
        outer_gate: u16,
        inner_room_id: i64,
        outer_room_id: i64,
        owner_id: i64,
    ) -> Result<i64, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;

        let inner_device_id = state
            .devices
            .iter()
            .find(|device| device.gate_id == inner_gate)
            .map(|device| device.id)
            .ok_or_else(|| {
                StorageError::Constraint(format!("inner gate {inner_gate} not registered"))
            })?;
        let outer_device_id = state
            .devices
            .iter()
            .find(|device| device.gate_id == outer_gate)
            .map(|device| device.id)
            .ok_or_else(|| {
                StorageError::Constraint(format!("outer gate {outer_gate} not registered"))
            })?;

        let id = state.allocate_id();
        state.pairs.push(StoredPair {
            id,
            inner_device_id,
            outer_device_id,
            inner_room_id,
            outer_room_id,
            owner_id,
        });
        Ok(id)
    }

    /// 读取已写入的全部日志（测试用）。
    pub fn logs(&self) -> Vec<NewDeviceLog> {
        self.state
            .read()
            .map(|state| state.logs.clone())
            .unwrap_or_default()
    }

    /// 读取房间当前人数（测试用）。
    pub fn population_of(&self, room_id: i64) -> Option<u32> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.populations.get(&room_id).copied())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStore for InMemoryStore {
    async fn find_device_by_gate(
        &self,
        gate_id: u16,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(state
            .devices
            .iter()
            .find(|device| device.gate_id == gate_id)
            .cloned())
    }

    async fn list_all_devices(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(state.devices.clone())
    }

    async fn set_device_status(
        &self,
        gate_id: u16,
        status: ConnectionStatus,
    ) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if let Some(device) = state
            .devices
            .iter_mut()
            .find(|device| device.gate_id == gate_id)
        {
            device.status = status;
        }
        Ok(())
    }
}

#[async_trait]
impl DevicePairStore for InMemoryStore {
    async fn list_pairs_with_gates(&self) -> Result<Vec<DevicePairRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(state
            .pairs
            .iter()
            .filter_map(|pair| state.materialize_pair(pair))
            .collect())
    }

    async fn list_pairs_for_owner(
        &self,
        ctx: &OwnerContext,
    ) -> Result<Vec<DevicePairRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(state
            .pairs
            .iter()
            .filter(|pair| pair.owner_id == ctx.owner_id)
            .filter_map(|pair| state.materialize_pair(pair))
            .collect())
    }

    async fn find_pair_by_gate(
        &self,
        gate_id: u16,
    ) -> Result<Option<DevicePairRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;

        let Some(device_id) = state
            .devices
            .iter()
            .find(|device| device.gate_id == gate_id)
            .map(|device| device.id)
        else {
            return Ok(None);
        };

        Ok(state
            .pairs
            .iter()
            .find(|pair| pair.inner_device_id == device_id || pair.outer_device_id == device_id)
            .and_then(|pair| state.materialize_pair(pair)))
    }
}

#[async_trait]
impl RoomStore for InMemoryStore {
    async fn list_rooms_with_population(
        &self,
        ctx: &OwnerContext,
    ) -> Result<Vec<RoomWithPopulation>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut rooms: Vec<RoomWithPopulation> = state
            .rooms
            .values()
            .filter(|room| room.owner_id == ctx.owner_id)
            .map(|room| RoomWithPopulation {
                room: room.clone(),
                population: state.populations.get(&room.id).copied().unwrap_or(0),
            })
            .collect();
        rooms.sort_by_key(|item| item.room.id);
        Ok(rooms)
    }
}

#[async_trait]
impl DeviceLogStore for InMemoryStore {
    async fn insert_device_log(&self, log: NewDeviceLog) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        state.logs.push(log);
        Ok(())
    }
}

#[async_trait]
impl PopulationStore for InMemoryStore {
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

        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;

        if let Some(population) = state.populations.get_mut(&entered_room_id) {
            *population += 1;
        }
        if let Some(population) = state.populations.get_mut(&left_room_id) {
            *population = population.saturating_sub(1);
        }
        Ok(())
    }

    async fn adjust_population(&self, room_id: i64, delta: i32) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if let Some(population) = state.populations.get_mut(&room_id) {
            *population = population.saturating_add_signed(delta);
        }
        Ok(())
    }
}
