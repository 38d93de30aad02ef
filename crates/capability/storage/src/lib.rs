//! # 存储模块
//!
//! 统一的数据存储抽象层，供调度器、在线跟踪与穿门引擎消费。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：按资源拆分的异步 Trait 接口
//! 2. **数据模型层** (`models.rs`)：设备、门、房间、设备日志
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **连接管理层** (`connection.rs`)：SQLite 连接池与启动迁移
//! 5. **实现层**：
//!    - `sqlite.rs`：SQLite 存储实现（生产使用）
//!    - `in_memory.rs`：内存存储实现（测试与演示）
//!
//! ## 设计约束
//!
//! - 所有接口返回 `Result<_, StorageError>`，调用方不得依赖具体 SQL
//! - 按归属过滤的查询显式接收 `OwnerContext`
//! - 人数计数永不为负：减法一律在 0 处饱和

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod sqlite;
pub mod traits;

pub use connection::{auto_migrate, connect_pool};
pub use error::StorageError;
pub use in_memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;
pub use traits::*;
