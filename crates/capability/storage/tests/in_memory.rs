use domain::{ConnectionStatus, CrossingDirection, OwnerContext};
use rewired_storage::{
    DeviceLogStore, DevicePairStore, DeviceStore, InMemoryStore, LogType, NewDeviceLog,
    PopulationStore, RoomStore,
};

fn seeded_store() -> (InMemoryStore, i64, i64) {
    let store = InMemoryStore::new();
    let inner_room = store.seed_room("living", 1, 0).expect("seed inner room");
    let outer_room = store.seed_room("hall", 1, 5).expect("seed outer room");
    store
        .seed_device(100, ConnectionStatus::Disconnected)
        .expect("seed inner gate");
    store
        .seed_device(200, ConnectionStatus::Connected)
        .expect("seed outer gate");
    store
        .seed_pair(100, 200, inner_room, outer_room, 1)
        .expect("seed pair");
    (store, inner_room, outer_room)
}

#[tokio::test]
async fn finds_device_by_gate() {
    let (store, _, _) = seeded_store();

    let device = store
        .find_device_by_gate(100)
        .await
        .expect("query")
        .expect("device exists");
    assert_eq!(device.gate_id, 100);
    assert_eq!(device.status, ConnectionStatus::Disconnected);

    let missing = store.find_device_by_gate(999).await.expect("query");
    assert!(missing.is_none());
}

#[tokio::test]
async fn set_device_status_persists() {
    let (store, _, _) = seeded_store();

    store
        .set_device_status(100, ConnectionStatus::Connected)
        .await
        .expect("update");

    let device = store
        .find_device_by_gate(100)
        .await
        .expect("query")
        .expect("device exists");
    assert!(device.status.is_connected());
}

#[tokio::test]
async fn pair_lookup_works_from_both_gates() {
    let (store, inner_room, outer_room) = seeded_store();

    for gate in [100u16, 200] {
        let pair = store
            .find_pair_by_gate(gate)
            .await
            .expect("query")
            .expect("pair exists");
        assert_eq!(pair.inner_gate.gate_id, 100);
        assert_eq!(pair.outer_gate.gate_id, 200);
        assert_eq!(pair.inner_room_id, inner_room);
        assert_eq!(pair.outer_room_id, outer_room);
    }
}

#[tokio::test]
async fn crossing_moves_population_between_rooms() {
    let (store, inner_room, outer_room) = seeded_store();

    store
        .apply_crossing(inner_room, outer_room, CrossingDirection::OuterToInner)
        .await
        .expect("crossing");
    assert_eq!(store.population_of(inner_room), Some(1));
    assert_eq!(store.population_of(outer_room), Some(4));

    store
        .apply_crossing(inner_room, outer_room, CrossingDirection::InnerToOuter)
        .await
        .expect("crossing");
    assert_eq!(store.population_of(inner_room), Some(0));
    assert_eq!(store.population_of(outer_room), Some(5));
}

#[tokio::test]
async fn crossing_saturates_at_zero() {
    let (store, inner_room, outer_room) = seeded_store();

    // 内侧房间是 0，往外走只会把外侧 +1，内侧保持 0
    store
        .apply_crossing(inner_room, outer_room, CrossingDirection::InnerToOuter)
        .await
        .expect("crossing");
    assert_eq!(store.population_of(inner_room), Some(0));
    assert_eq!(store.population_of(outer_room), Some(6));
}

#[tokio::test]
async fn adjust_population_saturates_at_zero() {
    let (store, inner_room, _) = seeded_store();

    store
        .adjust_population(inner_room, -1)
        .await
        .expect("adjust");
    assert_eq!(store.population_of(inner_room), Some(0));

    store.adjust_population(inner_room, 3).await.expect("adjust");
    assert_eq!(store.population_of(inner_room), Some(3));
}

#[tokio::test]
async fn room_listing_is_owner_scoped() {
    let (store, _, _) = seeded_store();
    store.seed_room("warehouse", 2, 9).expect("seed other owner");

    let rooms = store
        .list_rooms_with_population(&OwnerContext::new(1))
        .await
        .expect("list");
    assert_eq!(rooms.len(), 2);
    assert!(rooms.iter().all(|item| item.room.owner_id == 1));

    let other = store
        .list_rooms_with_population(&OwnerContext::new(2))
        .await
        .expect("list");
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].population, 9);
}

#[tokio::test]
async fn pair_listing_is_owner_scoped() {
    let (store, inner_room, outer_room) = seeded_store();
    store
        .seed_device(300, ConnectionStatus::Disconnected)
        .expect("seed");
    store
        .seed_device(400, ConnectionStatus::Disconnected)
        .expect("seed");
    store
        .seed_pair(300, 400, outer_room, inner_room, 2)
        .expect("seed pair");

    let all = store.list_pairs_with_gates().await.expect("list");
    assert_eq!(all.len(), 2);

    let owned = store
        .list_pairs_for_owner(&OwnerContext::new(1))
        .await
        .expect("list");
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].inner_gate.gate_id, 100);
}

#[tokio::test]
async fn device_logs_append_only() {
    let (store, _, _) = seeded_store();

    store
        .insert_device_log(NewDeviceLog {
            device_id: 3,
            log_type: LogType::GateStatus,
            status: Some(2),
            trigger_time: Some(1716912942),
        })
        .await
        .expect("insert");

    let logs = store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::GateStatus);
    assert_eq!(logs[0].status, Some(2));
}
