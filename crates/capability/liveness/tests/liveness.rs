use domain::ConnectionStatus;
use rewired_liveness::LivenessTracker;
use rewired_storage::{DeviceStore, InMemoryStore};
use std::sync::Arc;

async fn tracker_with_device(gate_id: u16) -> (Arc<InMemoryStore>, Arc<LivenessTracker>) {
    let store = Arc::new(InMemoryStore::new());
    store
        .seed_device(gate_id, ConnectionStatus::Disconnected)
        .expect("seed device");
    let tracker = LivenessTracker::init(store.clone() as Arc<dyn DeviceStore>)
        .await
        .expect("init tracker");
    (store, tracker)
}

#[tokio::test]
async fn heartbeat_marks_device_connected_and_persists() {
    let (store, tracker) = tracker_with_device(10).await;
    let now_ms = 1_000_000;

    tracker.keep_connected_at(10, now_ms).await;

    assert_eq!(tracker.is_connected(10).await, Some(true));
    let device = store
        .find_device_by_gate(10)
        .await
        .expect("query")
        .expect("device exists");
    assert!(device.status.is_connected());
}

#[tokio::test]
async fn sweep_disconnects_after_ttl() {
    let (store, tracker) = tracker_with_device(10).await;
    let now_ms = 1_000_000;

    tracker.keep_connected_at(10, now_ms).await;

    // 59 秒后还在窗口内
    tracker.sweep_at(now_ms + 59_000).await;
    assert_eq!(tracker.is_connected(10).await, Some(true));

    // 61 秒后过期，标记掉线并落库
    tracker.sweep_at(now_ms + 61_000).await;
    assert_eq!(tracker.is_connected(10).await, Some(false));
    let device = store
        .find_device_by_gate(10)
        .await
        .expect("query")
        .expect("device exists");
    assert!(!device.status.is_connected());
}

#[tokio::test]
async fn repeated_heartbeats_extend_the_window() {
    let (_, tracker) = tracker_with_device(10).await;
    let now_ms = 1_000_000;

    tracker.keep_connected_at(10, now_ms).await;
    tracker.keep_connected_at(10, now_ms + 50_000).await;

    // 以第二次心跳起算，原本的过期点已经后移
    tracker.sweep_at(now_ms + 100_000).await;
    assert_eq!(tracker.is_connected(10).await, Some(true));

    tracker.sweep_at(now_ms + 120_000).await;
    assert_eq!(tracker.is_connected(10).await, Some(false));
}

#[tokio::test]
async fn unknown_gate_heartbeat_is_dropped() {
    let (store, tracker) = tracker_with_device(10).await;

    tracker.keep_connected_at(99, 1_000_000).await;

    assert_eq!(tracker.is_connected(99).await, None);
    assert!(store
        .find_device_by_gate(99)
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn disconnected_devices_are_left_alone_by_sweep() {
    let (_, tracker) = tracker_with_device(10).await;

    // 从未收到心跳：初始为掉线，清扫不应报错也不应翻转
    tracker.sweep_at(10_000_000_000).await;
    assert_eq!(tracker.is_connected(10).await, Some(false));
}
