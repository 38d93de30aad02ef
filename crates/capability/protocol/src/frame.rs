//! 原始帧的读写。

use crate::error::ProtocolError;
use crate::nibble::{join_nibbles, split_byte};
use tokio::io::{AsyncRead, AsyncReadExt};

/// 当前协议版本。
pub const CURRENT_VERSION: u8 = 1;

/// 包类型，决定负载长度与解析目标。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Heartbeat = 1,
    GateStatus = 2,
    Increment = 3,
    Decrement = 4,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(Self::Heartbeat),
            2 => Ok(Self::GateStatus),
            3 => Ok(Self::Increment),
            4 => Ok(Self::Decrement),
            other => Err(ProtocolError::InvalidPacketType(other)),
        }
    }

    /// 该类型的负载字节数。
    pub fn payload_len(self) -> usize {
        match self {
            Self::GateStatus => 7,
            _ => 2,
        }
    }
}

impl serde::Serialize for PacketType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// 从设备收到的一个原始 TCP 帧。
///
/// 负载尚未解析，由各报文类型的 `parse` 负责。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub version: u8,
    pub packet_type: PacketType,
    pub raw: Vec<u8>,
}

impl RawPacket {
    /// 从字节流里读出恰好一个帧。
    ///
    /// 版本不符或类型未知时报错，此后流无法重新对齐，
    /// 调用方应当断开该连接。
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; 1];
        reader.read_exact(&mut header).await?;

        let (version, type_bits) = split_byte(header[0]);
        if version != CURRENT_VERSION {
            return Err(ProtocolError::VersionMismatch(version));
        }

        let packet_type = PacketType::from_u8(type_bits)?;
        let mut raw = vec![0u8; packet_type.payload_len()];
        reader.read_exact(&mut raw).await?;

        Ok(Self {
            version,
            packet_type,
            raw,
        })
    }

    /// 编码回线上字节。
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.raw.is_empty() {
            return Err(ProtocolError::EmptyRawData);
        }

        let mut data = Vec::with_capacity(1 + self.raw.len());
        data.push(join_nibbles(self.version, self.packet_type as u8));
        data.extend_from_slice(&self.raw);
        Ok(data)
    }
}
