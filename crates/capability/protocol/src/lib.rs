//! # 设备接入协议模块
//!
//! 设备与服务器之间走定长二进制帧：每帧首字节的高 4 位是协议版本、
//! 低 4 位是包类型，之后按包类型跟随定长负载。
//!
//! 包类型：
//! - **heartbeat**：负载 2 字节（gate_id，大端 u16）
//! - **gate-status**：负载 7 字节（gate_id + 状态字节 + 触发时间，i32 大端 Unix 秒）
//! - **increment / decrement**：负载 2 字节（gate_id）
//!
//! 分层：
//! - `frame`：原始帧的读取与回写，负责版本与类型校验
//! - `packets`：四种类型化报文的解析与编码
//! - `nibble` / `time32`：半字节与 32 位时间戳的底层换算
//! - `tcp_server`：设备侧 TCP 接入，把帧投递给调度通道

mod error;
mod frame;
mod nibble;
mod packets;
mod tcp_server;
mod time32;

pub use error::ProtocolError;
pub use frame::{CURRENT_VERSION, PacketType, RawPacket};
pub use nibble::{join_nibbles, split_byte};
pub use packets::{DecrementPacket, GateStatus, GateStatusPacket, HeartbeatPacket, IncrementPacket};
pub use tcp_server::TcpIngestServer;
pub use time32::{seconds_to_wire, wire_to_seconds};
