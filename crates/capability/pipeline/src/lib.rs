//! # 报文调度模块
//!
//! 接入层送来的原始帧在这里汇成单一消费流：
//! - `dispatcher`：解析类型化报文、推调试流、落设备日志、按类型分发
//! - `population`：increment/decrement 的预聚合计数侧通道
//! - `status`：周期构建服务器状态快照推给订阅端

mod dispatcher;
mod population;
mod status;

pub use dispatcher::Dispatcher;
pub use population::{decrement_population, increment_population};
pub use status::{DeviceStatus, RoomStatus, ServerStatus, build_status, run_status_snapshots};
