//! 数据库连接管理
//!
//! - connect_pool：建立 SQLite 连接池，文件不存在时创建
//! - auto_migrate：启动时建出最新的表结构

use crate::error::StorageError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// 建立 SQLite 连接池，最大连接数限制为 8。
pub async fn connect_pool(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|err| StorageError::Connection(err.to_string()))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
    Ok(pool)
}

/// 启动时自动迁移表结构，全部语句幂等。
pub async fn auto_migrate(pool: &SqlitePool) -> Result<(), StorageError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|err| StorageError::Migration(err.to_string()))?;
    }
    Ok(())
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users ( \
        id INTEGER PRIMARY KEY AUTOINCREMENT, \
        created_at INTEGER NOT NULL DEFAULT (unixepoch()), \
        name TEXT NOT NULL UNIQUE)",
    "CREATE TABLE IF NOT EXISTS devices ( \
        id INTEGER PRIMARY KEY AUTOINCREMENT, \
        created_at INTEGER NOT NULL DEFAULT (unixepoch()), \
        gate_id INTEGER NOT NULL UNIQUE, \
        status INTEGER NOT NULL DEFAULT 0)",
    "CREATE TABLE IF NOT EXISTS rooms ( \
        id INTEGER PRIMARY KEY AUTOINCREMENT, \
        created_at INTEGER NOT NULL DEFAULT (unixepoch()), \
        name TEXT NOT NULL, \
        owner_id INTEGER NOT NULL REFERENCES users(id))",
    "CREATE TABLE IF NOT EXISTS room_populations ( \
        id INTEGER PRIMARY KEY AUTOINCREMENT, \
        room_id INTEGER NOT NULL UNIQUE REFERENCES rooms(id), \
        population INTEGER NOT NULL DEFAULT 0)",
    "CREATE TABLE IF NOT EXISTS device_pairs ( \
        id INTEGER PRIMARY KEY AUTOINCREMENT, \
        created_at INTEGER NOT NULL DEFAULT (unixepoch()), \
        inner_gate_id INTEGER NOT NULL REFERENCES devices(id), \
        outer_gate_id INTEGER NOT NULL REFERENCES devices(id), \
        inner_room_id INTEGER NOT NULL REFERENCES rooms(id), \
        outer_room_id INTEGER NOT NULL REFERENCES rooms(id), \
        owner_id INTEGER NOT NULL REFERENCES users(id))",
    "CREATE TABLE IF NOT EXISTS device_logs ( \
        id INTEGER PRIMARY KEY AUTOINCREMENT, \
        created_at INTEGER NOT NULL DEFAULT (unixepoch()), \
        device_id INTEGER NOT NULL REFERENCES devices(id), \
        log_type INTEGER NOT NULL, \
        status INTEGER, \
        trigger_time INTEGER)",
    "CREATE INDEX IF NOT EXISTS idx_device_logs_device ON device_logs(device_id)",
    "CREATE INDEX IF NOT EXISTS idx_rooms_owner ON rooms(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_device_pairs_owner ON device_pairs(owner_id)",
];
