use domain::{ConnectionStatus, OwnerContext};
use rewired_doorpass::DoorEngine;
use rewired_liveness::LivenessTracker;
use rewired_pipeline::{Dispatcher, build_status};
use rewired_protocol::{
    CURRENT_VERSION, DecrementPacket, GateStatus, GateStatusPacket, HeartbeatPacket,
    IncrementPacket, PacketType, RawPacket,
};
use rewired_storage::{
    DevicePairStore, DeviceStore, InMemoryStore, LogType, PopulationStore, RoomStore, Store,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

struct Fixture {
    store: Arc<InMemoryStore>,
    debug_rx: broadcast::Receiver<String>,
    packets_tx: mpsc::Sender<RawPacket>,
    dispatcher: tokio::task::JoinHandle<()>,
    inner_room: i64,
    outer_room: i64,
}

/// 一扇门（闸门 100/200，内侧房间 0 人、外侧 5 人）加一台独立设备 10。
async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let inner_room = store.seed_room("living", 1, 0).expect("seed inner room");
    let outer_room = store.seed_room("hall", 1, 5).expect("seed outer room");
    store
        .seed_device(10, ConnectionStatus::Disconnected)
        .expect("seed lone device");
    store
        .seed_device(100, ConnectionStatus::Connected)
        .expect("seed inner gate");
    store
        .seed_device(200, ConnectionStatus::Connected)
        .expect("seed outer gate");
    store
        .seed_pair(100, 200, inner_room, outer_room, 1)
        .expect("seed pair");

    let liveness = LivenessTracker::init(store.clone() as Arc<dyn DeviceStore>)
        .await
        .expect("init liveness");
    let doors = Arc::new(
        DoorEngine::init(
            store.clone() as Arc<dyn DevicePairStore>,
            store.clone() as Arc<dyn PopulationStore>,
        )
        .await
        .expect("init doors"),
    );

    let (debug_tx, debug_rx) = broadcast::channel(16);
    let (packets_tx, packets_rx) = mpsc::channel(1);

    let dispatcher = Dispatcher::new(
        store.clone() as Arc<dyn Store>,
        liveness,
        doors,
        debug_tx,
    );
    let handle = tokio::spawn(dispatcher.run(packets_rx, CancellationToken::new()));

    Fixture {
        store,
        debug_rx,
        packets_tx,
        dispatcher: handle,
        inner_room,
        outer_room,
    }
}

impl Fixture {
    /// 投递完所有帧后关闭通道，等调度器处理完退出。
    async fn finish(self) -> (Arc<InMemoryStore>, broadcast::Receiver<String>) {
        drop(self.packets_tx);
        self.dispatcher.await.expect("dispatcher task");
        (self.store, self.debug_rx)
    }
}

#[tokio::test]
async fn heartbeat_is_logged_and_marks_device_connected() {
    let fixture = fixture().await;

    fixture
        .packets_tx
        .send(HeartbeatPacket::new(10).to_frame())
        .await
        .expect("send");

    let (store, mut debug_rx) = fixture.finish().await;

    let json = debug_rx.recv().await.expect("debug payload");
    assert!(json.contains("\"GateID\":10"));
    assert!(json.contains("\"PacketType\":1"));

    let logs = store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::Heartbeat);

    let device = store
        .find_device_by_gate(10)
        .await
        .expect("query")
        .expect("device exists");
    assert!(device.status.is_connected());
}

#[tokio::test]
async fn unknown_gate_packet_is_published_but_not_logged() {
    let fixture = fixture().await;

    fixture
        .packets_tx
        .send(HeartbeatPacket::new(99).to_frame())
        .await
        .expect("send");

    let (store, mut debug_rx) = fixture.finish().await;

    // 调试流在设备定位之前推送，依然能看到这帧
    let json = debug_rx.recv().await.expect("debug payload");
    assert!(json.contains("\"GateID\":99"));

    assert!(store.logs().is_empty());
}

#[tokio::test]
async fn malformed_payload_is_dropped() {
    let fixture = fixture().await;

    fixture
        .packets_tx
        .send(RawPacket {
            version: CURRENT_VERSION,
            packet_type: PacketType::Heartbeat,
            raw: vec![0x00],
        })
        .await
        .expect("send");

    let (store, mut debug_rx) = fixture.finish().await;

    assert!(debug_rx.try_recv().is_err());
    assert!(store.logs().is_empty());
}

#[tokio::test]
async fn increment_targets_inner_room() {
    let fixture = fixture().await;
    let inner_room = fixture.inner_room;
    let outer_room = fixture.outer_room;

    // 外侧闸门发的 increment 同样落在内侧房间
    fixture
        .packets_tx
        .send(IncrementPacket::new(200).to_frame())
        .await
        .expect("send");

    let (store, _) = fixture.finish().await;

    assert_eq!(store.population_of(inner_room), Some(1));
    assert_eq!(store.population_of(outer_room), Some(5));
    assert_eq!(store.logs()[0].log_type, LogType::Increment);
}

#[tokio::test]
async fn decrement_saturates_at_zero() {
    let fixture = fixture().await;
    let inner_room = fixture.inner_room;

    fixture
        .packets_tx
        .send(DecrementPacket::new(100).to_frame())
        .await
        .expect("send");

    let (store, _) = fixture.finish().await;

    // 内侧房间本来就是 0，减法落空但不报错
    assert_eq!(store.population_of(inner_room), Some(0));
    assert_eq!(store.logs()[0].log_type, LogType::Decrement);
}

#[tokio::test]
async fn gate_status_is_logged_with_status_fields() {
    let fixture = fixture().await;

    fixture
        .packets_tx
        .send(
            GateStatusPacket::new(100, GateStatus::Blocked, 1716912942)
                .to_frame()
                .expect("frame"),
        )
        .await
        .expect("send");

    let (store, mut debug_rx) = fixture.finish().await;

    let json = debug_rx.recv().await.expect("debug payload");
    assert!(json.contains("\"Status\":3"));
    assert!(json.contains("\"TriggerTime\":1716912942"));

    let logs = store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_type, LogType::GateStatus);
    assert_eq!(logs[0].status, Some(3));
    assert_eq!(logs[0].trigger_time, Some(1716912942));
}

#[tokio::test]
async fn status_snapshot_covers_devices_and_rooms() {
    let fixture = fixture().await;
    let (store, _) = fixture.finish().await;

    let ctx = OwnerContext::new(1);
    let status = build_status(
        &ctx,
        store.as_ref() as &dyn DevicePairStore,
        store.as_ref() as &dyn RoomStore,
    )
    .await
    .expect("build status");

    // 成对设备各出一条；单独的设备 10 不在任何门里，不出现
    assert_eq!(status.devices.len(), 2);
    assert_eq!(status.rooms.len(), 2);

    let json = serde_json::to_value(&status).expect("json");
    assert_eq!(json["devices"][0]["id"], 100);
    assert_eq!(json["devices"][1]["id"], 200);
    assert!(json["rooms"][0]["population"].is_u64());
}
