//! 触发时间的 32 位线上表示。

use crate::error::ProtocolError;

/// 把 Unix 秒压缩为线上的 i32，超出范围视为编码错误。
pub fn seconds_to_wire(secs: i64) -> Result<i32, ProtocolError> {
    i32::try_from(secs).map_err(|_| ProtocolError::TimestampOutOfRange(secs))
}

/// 把线上的 i32 还原为 Unix 秒。
pub fn wire_to_seconds(wire: i32) -> i64 {
    i64::from(wire)
}
