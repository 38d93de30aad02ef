//! 服务运行配置与跨域来源策略。

use std::env;

/// 默认的设备接入端口。
pub const DEFAULT_TCP_PORT: u16 = 42069;

/// 默认的 WebSocket 服务端口。
pub const DEFAULT_WS_PORT: u16 = 80;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 来源配置整体为空
    #[error("origins must not be empty")]
    EmptyOrigins,

    /// 来源列表里有空项（多半是多写或漏写了逗号）
    #[error("empty entry in origins list: {0}")]
    EmptyOriginEntry(String),
}

/// 服务运行配置。
#[derive(Debug, Clone)]
pub struct Settings {
    pub tcp_port: u16,
    pub ws_port: u16,
    pub origins: OriginPolicy,
    pub database_url: String,
}

impl Settings {
    /// 以给定的监听参数构建配置，数据库地址从环境变量读取。
    pub fn new(tcp_port: u16, ws_port: u16, origins: OriginPolicy) -> Self {
        Self {
            tcp_port,
            ws_port,
            origins,
            database_url: database_url_from_env(),
        }
    }
}

/// 读取数据库地址，默认使用工作目录下的 rewired.db。
pub fn database_url_from_env() -> String {
    env::var("REWIRED_DATABASE_URL").unwrap_or_else(|_| "sqlite://rewired.db?mode=rwc".to_string())
}

/// 允许的跨域来源策略。
///
/// 升级握手前用请求的 Origin 头做全等比较，不做任何归一化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// 放行所有来源。
    Any,
    /// 只放行单一来源。
    One(String),
    /// 放行列表内的来源。
    List(Vec<String>),
}

impl OriginPolicy {
    /// 解析命令行形式的来源配置：`*`、单个来源、或逗号分隔的多个来源。
    ///
    /// 空值与带空项的列表在启动时拒绝，不会落成一个谁也匹配不上
    /// 的策略。
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        if value == "*" {
            return Ok(Self::Any);
        }

        if value.is_empty() {
            return Err(ConfigError::EmptyOrigins);
        }

        if !value.contains(',') {
            return Ok(Self::One(value.to_string()));
        }

        let entries: Vec<String> = value.split(',').map(str::to_string).collect();
        if entries.iter().any(|entry| entry.is_empty()) {
            return Err(ConfigError::EmptyOriginEntry(value.to_string()));
        }

        Ok(Self::List(entries))
    }

    /// 判断请求的 Origin 是否放行。
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::One(allowed) => allowed == origin,
            Self::List(allowed) => allowed.iter().any(|item| item == origin),
        }
    }
}
