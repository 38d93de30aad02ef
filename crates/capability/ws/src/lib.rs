//! # 订阅端 WebSocket 模块
//!
//! 对外暴露两个推送端点：
//! - `/debug`：解码后的报文流，一帧一条 JSON，纯推送
//! - `/ws`：周期性的服务器状态快照，带 ping/pong 保活
//!
//! 扇出走 broadcast 通道：每个订阅端有自己的有界队列，写满时
//! 挤掉最老的消息，慢订阅端不会拖住其他人。

mod client;
mod manager;

pub use manager::Manager;
