//! 报文调度。
//!
//! 原始帧通道的唯一消费者。每个帧按固定顺序处理：解析成类型化
//! 报文、序列化后推到调试流、定位设备并追加设备日志，最后按
//! 类型触发对应动作。解析失败只丢这一帧，连接由接入层维持。

use domain::now_epoch_ms;
use rewired_doorpass::DoorEngine;
use rewired_liveness::LivenessTracker;
use rewired_protocol::{
    DecrementPacket, GateStatus, GateStatusPacket, HeartbeatPacket, IncrementPacket, PacketType,
    RawPacket,
};
use rewired_storage::{DeviceRecord, LogType, NewDeviceLog, Store};
use rewired_telemetry::{
    record_device_log_failure, record_heartbeat, record_packet_dropped, record_packet_received,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 报文调度器。
pub struct Dispatcher {
    store: Arc<dyn Store>,
    liveness: Arc<LivenessTracker>,
    doors: Arc<DoorEngine>,
    debug_tx: broadcast::Sender<String>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        liveness: Arc<LivenessTracker>,
        doors: Arc<DoorEngine>,
        debug_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            store,
            liveness,
            doors,
            debug_tx,
        }
    }

    /// 消费原始帧直到通道关闭或取消信号到来。
    pub async fn run(self, mut packets_rx: mpsc::Receiver<RawPacket>, cancel: CancellationToken) {
        loop {
            let packet = tokio::select! {
                _ = cancel.cancelled() => break,
                received = packets_rx.recv() => match received {
                    Some(packet) => packet,
                    None => break,
                },
            };

            self.handle(packet).await;
        }

        info!("dispatcher stopped");
    }

    async fn handle(&self, packet: RawPacket) {
        record_packet_received();

        match packet.packet_type {
            PacketType::Heartbeat => self.handle_heartbeat(&packet).await,
            PacketType::GateStatus => self.handle_gate_status(&packet).await,
            PacketType::Increment => self.handle_increment(&packet).await,
            PacketType::Decrement => self.handle_decrement(&packet).await,
        }
    }

    async fn handle_heartbeat(&self, packet: &RawPacket) {
        let parsed = match HeartbeatPacket::parse(packet) {
            Ok(parsed) => parsed,
            Err(err) => {
                record_packet_dropped();
                warn!(error = %err, "failed to parse heartbeat packet");
                return;
            }
        };

        info!(gate_id = parsed.gate_id, "received a heartbeat");
        self.publish_debug(&parsed);

        let Some(device) = self.find_device(parsed.gate_id).await else {
            return;
        };
        self.write_log(
            NewDeviceLog {
                device_id: device.id,
                log_type: LogType::Heartbeat,
                status: None,
                trigger_time: None,
            },
            parsed.gate_id,
        )
        .await;

        record_heartbeat();
        self.liveness.keep_connected(parsed.gate_id).await;
    }

    async fn handle_gate_status(&self, packet: &RawPacket) {
        let parsed = match GateStatusPacket::parse(packet) {
            Ok(parsed) => parsed,
            Err(err) => {
                record_packet_dropped();
                warn!(error = %err, "failed to parse gate status packet");
                return;
            }
        };

        info!(
            gate_id = parsed.gate_id,
            status = ?parsed.status,
            trigger_time = parsed.trigger_time,
            "received a status"
        );
        self.publish_debug(&parsed);

        let Some(device) = self.find_device(parsed.gate_id).await else {
            return;
        };
        self.write_log(
            NewDeviceLog {
                device_id: device.id,
                log_type: LogType::GateStatus,
                status: Some(parsed.status as u8),
                trigger_time: Some(parsed.trigger_time),
            },
            parsed.gate_id,
        )
        .await;

        // 判定只关心光束恢复事件，且用服务端接收时间，
        // 设备侧的 trigger_time 仅留档
        if parsed.status == GateStatus::Unblocked {
            self.doors.gate_active(parsed.gate_id, now_epoch_ms()).await;
        }
    }

    async fn handle_increment(&self, packet: &RawPacket) {
        let parsed = match IncrementPacket::parse(packet) {
            Ok(parsed) => parsed,
            Err(err) => {
                record_packet_dropped();
                warn!(error = %err, "failed to parse increment packet");
                return;
            }
        };

        info!(gate_id = parsed.gate_id, "received an increment");
        self.publish_debug(&parsed);

        let Some(device) = self.find_device(parsed.gate_id).await else {
            return;
        };
        self.write_log(
            NewDeviceLog {
                device_id: device.id,
                log_type: LogType::Increment,
                status: None,
                trigger_time: None,
            },
            parsed.gate_id,
        )
        .await;

        crate::population::increment_population(self.store.as_ref(), parsed.gate_id).await;
    }

    async fn handle_decrement(&self, packet: &RawPacket) {
        let parsed = match DecrementPacket::parse(packet) {
            Ok(parsed) => parsed,
            Err(err) => {
                record_packet_dropped();
                warn!(error = %err, "failed to parse decrement packet");
                return;
            }
        };

        info!(gate_id = parsed.gate_id, "received a decrement");
        self.publish_debug(&parsed);

        let Some(device) = self.find_device(parsed.gate_id).await else {
            return;
        };
        self.write_log(
            NewDeviceLog {
                device_id: device.id,
                log_type: LogType::Decrement,
                status: None,
                trigger_time: None,
            },
            parsed.gate_id,
        )
        .await;

        crate::population::decrement_population(self.store.as_ref(), parsed.gate_id).await;
    }

    /// 序列化并推到调试流；没有订阅者时 send 会失败，属正常情况。
    fn publish_debug<T: Serialize>(&self, packet: &T) {
        match serde_json::to_string(packet) {
            Ok(json) => {
                let _ = self.debug_tx.send(json);
            }
            Err(err) => warn!(error = %err, "failed to serialize packet"),
        }
    }

    /// 定位报文所属设备；未登记的 gate_id 丢弃该帧。
    async fn find_device(&self, gate_id: u16) -> Option<DeviceRecord> {
        match self.store.find_device_by_gate(gate_id).await {
            Ok(Some(device)) => Some(device),
            Ok(None) => {
                warn!(gate_id, "packet from unknown gate");
                None
            }
            Err(err) => {
                warn!(gate_id, error = %err, "failed to find the device");
                None
            }
        }
    }

    /// 追加设备日志；写失败记录后继续走后续动作。
    async fn write_log(&self, log: NewDeviceLog, gate_id: u16) {
        if let Err(err) = self.store.insert_device_log(log).await {
            record_device_log_failure();
            warn!(gate_id, error = %err, "failed to create the device log");
        }
    }
}
