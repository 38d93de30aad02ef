//! 协议错误类型定义

/// 协议通信与编解码错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 协议版本不匹配
    #[error("version mismatched: got {0}")]
    VersionMismatch(u8),

    /// 未知包类型
    #[error("invalid packet type: {0}")]
    InvalidPacketType(u8),

    /// 包类型与解析目标不一致
    #[error("packet type mismatched")]
    PacketTypeMismatch,

    /// 未知闸门状态
    #[error("invalid gate status: {0}")]
    InvalidGateStatus(u8),

    /// 负载长度不符
    #[error("invalid binary size: expected {expected}, got {actual}")]
    InvalidBinarySize { expected: usize, actual: usize },

    /// 空负载
    #[error("empty raw data")]
    EmptyRawData,

    /// 时间戳超出 32 位范围
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
