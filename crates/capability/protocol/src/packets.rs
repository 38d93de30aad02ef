//! 四种类型化报文及其编解码。
//!
//! 解析只消费 [`RawPacket`] 的负载，编码则反向生成负载；
//! JSON 序列化面向调试推送流，字段名与线上字段一一对应。

use crate::error::ProtocolError;
use crate::frame::{CURRENT_VERSION, PacketType, RawPacket};
use crate::time32::{seconds_to_wire, wire_to_seconds};
use serde::Serialize;

/// 闸门状态，随状态变化由设备上报。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GateStatus {
    TurnOn = 1,
    Unblocked = 2,
    Blocked = 3,
    Faulty = 4,
}

impl GateStatus {
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(Self::TurnOn),
            2 => Ok(Self::Unblocked),
            3 => Ok(Self::Blocked),
            4 => Ok(Self::Faulty),
            other => Err(ProtocolError::InvalidGateStatus(other)),
        }
    }
}

impl serde::Serialize for GateStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// 校验负载长度与包类型是否匹配解析目标。
fn expect_payload(raw: &RawPacket, expected: PacketType) -> Result<(), ProtocolError> {
    if raw.raw.len() != expected.payload_len() {
        return Err(ProtocolError::InvalidBinarySize {
            expected: expected.payload_len(),
            actual: raw.raw.len(),
        });
    }

    if raw.packet_type != expected {
        return Err(ProtocolError::PacketTypeMismatch);
    }

    Ok(())
}

/// 心跳报文：证明设备仍然在线。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartbeatPacket {
    #[serde(rename = "Version")]
    pub version: u8,
    #[serde(rename = "PacketType")]
    pub packet_type: PacketType,
    #[serde(rename = "GateID")]
    pub gate_id: u16,
}

impl HeartbeatPacket {
    pub fn new(gate_id: u16) -> Self {
        Self {
            version: CURRENT_VERSION,
            packet_type: PacketType::Heartbeat,
            gate_id,
        }
    }

    pub fn parse(raw: &RawPacket) -> Result<Self, ProtocolError> {
        expect_payload(raw, PacketType::Heartbeat)?;
        Ok(Self {
            version: raw.version,
            packet_type: raw.packet_type,
            gate_id: u16::from_be_bytes([raw.raw[0], raw.raw[1]]),
        })
    }

    pub fn to_frame(&self) -> RawPacket {
        RawPacket {
            version: self.version,
            packet_type: self.packet_type,
            raw: self.gate_id.to_be_bytes().to_vec(),
        }
    }
}

/// 加计数报文：设备自行判定后直接上报 +1。
///
/// 两侧闸门的 gate_id 都可以用来定位所属的门。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IncrementPacket {
    #[serde(rename = "Version")]
    pub version: u8,
    #[serde(rename = "PacketType")]
    pub packet_type: PacketType,
    #[serde(rename = "GateID")]
    pub gate_id: u16,
}

impl IncrementPacket {
    pub fn new(gate_id: u16) -> Self {
        Self {
            version: CURRENT_VERSION,
            packet_type: PacketType::Increment,
            gate_id,
        }
    }

    pub fn parse(raw: &RawPacket) -> Result<Self, ProtocolError> {
        expect_payload(raw, PacketType::Increment)?;
        Ok(Self {
            version: raw.version,
            packet_type: raw.packet_type,
            gate_id: u16::from_be_bytes([raw.raw[0], raw.raw[1]]),
        })
    }

    pub fn to_frame(&self) -> RawPacket {
        RawPacket {
            version: self.version,
            packet_type: self.packet_type,
            raw: self.gate_id.to_be_bytes().to_vec(),
        }
    }
}

/// 减计数报文：设备自行判定后直接上报 -1。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecrementPacket {
    #[serde(rename = "Version")]
    pub version: u8,
    #[serde(rename = "PacketType")]
    pub packet_type: PacketType,
    #[serde(rename = "GateID")]
    pub gate_id: u16,
}

impl DecrementPacket {
    pub fn new(gate_id: u16) -> Self {
        Self {
            version: CURRENT_VERSION,
            packet_type: PacketType::Decrement,
            gate_id,
        }
    }

    pub fn parse(raw: &RawPacket) -> Result<Self, ProtocolError> {
        expect_payload(raw, PacketType::Decrement)?;
        Ok(Self {
            version: raw.version,
            packet_type: raw.packet_type,
            gate_id: u16::from_be_bytes([raw.raw[0], raw.raw[1]]),
        })
    }

    pub fn to_frame(&self) -> RawPacket {
        RawPacket {
            version: self.version,
            packet_type: self.packet_type,
            raw: self.gate_id.to_be_bytes().to_vec(),
        }
    }
}

/// 状态报文：负载为 gate_id、状态字节、触发时间（i32 大端 Unix 秒）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateStatusPacket {
    #[serde(rename = "Version")]
    pub version: u8,
    #[serde(rename = "PacketType")]
    pub packet_type: PacketType,
    #[serde(rename = "GateID")]
    pub gate_id: u16,
    #[serde(rename = "Status")]
    pub status: GateStatus,
    /// 设备侧的触发时间，Unix 秒。
    #[serde(rename = "TriggerTime")]
    pub trigger_time: i64,
}

impl GateStatusPacket {
    pub fn new(gate_id: u16, status: GateStatus, trigger_time: i64) -> Self {
        Self {
            version: CURRENT_VERSION,
            packet_type: PacketType::GateStatus,
            gate_id,
            status,
            trigger_time,
        }
    }

    pub fn parse(raw: &RawPacket) -> Result<Self, ProtocolError> {
        expect_payload(raw, PacketType::GateStatus)?;

        let gate_id = u16::from_be_bytes([raw.raw[0], raw.raw[1]]);
        let trigger_time = wire_to_seconds(i32::from_be_bytes([
            raw.raw[3], raw.raw[4], raw.raw[5], raw.raw[6],
        ]));
        let status = GateStatus::from_u8(raw.raw[2])?;

        Ok(Self {
            version: raw.version,
            packet_type: raw.packet_type,
            gate_id,
            status,
            trigger_time,
        })
    }

    /// 编码为原始帧，触发时间超出 i32 范围时失败。
    pub fn to_frame(&self) -> Result<RawPacket, ProtocolError> {
        let wire = seconds_to_wire(self.trigger_time)?;

        let mut raw = Vec::with_capacity(7);
        raw.extend_from_slice(&self.gate_id.to_be_bytes());
        raw.push(self.status as u8);
        raw.extend_from_slice(&wire.to_be_bytes());

        Ok(RawPacket {
            version: self.version,
            packet_type: self.packet_type,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heartbeat_round_trips_through_wire() {
        let packet = HeartbeatPacket::new(0x1234);
        let bytes = packet.to_frame().to_bytes().expect("encode");
        assert_eq!(bytes, vec![0x11, 0x12, 0x34]);

        let mut reader: &[u8] = &bytes;
        let raw = RawPacket::read_from(&mut reader).await.expect("read");
        assert_eq!(HeartbeatPacket::parse(&raw).expect("parse"), packet);
    }

    #[tokio::test]
    async fn gate_status_round_trips_through_wire() {
        let packet = GateStatusPacket::new(100, GateStatus::Unblocked, 1716912942);
        let bytes = packet.to_frame().expect("frame").to_bytes().expect("encode");
        assert_eq!(bytes[0], 0x12);
        assert_eq!(bytes.len(), 8);

        let mut reader: &[u8] = &bytes;
        let raw = RawPacket::read_from(&mut reader).await.expect("read");
        assert_eq!(GateStatusPacket::parse(&raw).expect("parse"), packet);
    }

    #[test]
    fn increment_and_decrement_round_trip() {
        let increment = IncrementPacket::new(7);
        let parsed = IncrementPacket::parse(&increment.to_frame()).expect("parse increment");
        assert_eq!(parsed, increment);

        let decrement = DecrementPacket::new(7);
        let parsed = DecrementPacket::parse(&decrement.to_frame()).expect("parse decrement");
        assert_eq!(parsed, decrement);
    }

    #[test]
    fn unknown_status_byte_rejected() {
        let raw = RawPacket {
            version: CURRENT_VERSION,
            packet_type: PacketType::GateStatus,
            raw: vec![0x00, 0x64, 0x07, 0x00, 0x00, 0x00, 0x00],
        };
        let err = GateStatusPacket::parse(&raw).expect_err("status 7");
        assert!(matches!(err, ProtocolError::InvalidGateStatus(7)));
    }

    #[test]
    fn wrong_payload_size_rejected() {
        let raw = RawPacket {
            version: CURRENT_VERSION,
            packet_type: PacketType::Heartbeat,
            raw: vec![0x00],
        };
        let err = HeartbeatPacket::parse(&raw).expect_err("short payload");
        assert!(matches!(
            err,
            ProtocolError::InvalidBinarySize {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn cross_type_parse_rejected() {
        let raw = HeartbeatPacket::new(9).to_frame();
        let err = IncrementPacket::parse(&raw).expect_err("wrong type");
        assert!(matches!(err, ProtocolError::PacketTypeMismatch));
    }

    #[test]
    fn out_of_range_trigger_time_cannot_encode() {
        let packet = GateStatusPacket::new(1, GateStatus::Blocked, i64::from(i32::MAX) + 1);
        assert!(matches!(
            packet.to_frame(),
            Err(ProtocolError::TimestampOutOfRange(_))
        ));
    }

    #[test]
    fn debug_json_uses_wire_field_names() {
        let value =
            serde_json::to_value(GateStatusPacket::new(100, GateStatus::Unblocked, 42)).expect("json");
        assert_eq!(value["Version"], 1);
        assert_eq!(value["PacketType"], 2);
        assert_eq!(value["GateID"], 100);
        assert_eq!(value["Status"], 2);
        assert_eq!(value["TriggerTime"], 42);

        let value = serde_json::to_value(HeartbeatPacket::new(5)).expect("json");
        assert_eq!(value["PacketType"], 1);
        assert_eq!(value.get("Status"), None);
    }
}
