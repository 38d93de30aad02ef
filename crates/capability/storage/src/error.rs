//! 存储层错误类型
//!
//! 按失败来源区分：连接建立、启动迁移、SQL 执行、内存实现的
//! 锁毒化、以及植入数据的约束冲突。调用方据此决定是致命退出
//! （连接/迁移）还是记录后继续（单条查询）。

/// 存储错误
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 连接池建立失败
    #[error("connection error: {0}")]
    Connection(String),

    /// 启动迁移失败
    #[error("migration error: {0}")]
    Migration(String),

    /// SQL 执行失败
    #[error("query error: {0}")]
    Query(String),

    /// 内存存储的状态锁被毒化
    #[error("state lock poisoned")]
    LockPoisoned,

    /// 数据不满足存储约束
    #[error("constraint violated: {0}")]
    Constraint(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Query(err.to_string())
    }
}
