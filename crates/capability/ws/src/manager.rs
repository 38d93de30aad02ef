//! 订阅端管理与路由。

use crate::client;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use rewired_config::OriginPolicy;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// 每个订阅端队列的容量，写满后最老的消息先被挤掉。
const CHANNEL_CAPACITY: usize = 64;

/// 入站消息大小上限（字节）。
const MAX_MESSAGE_SIZE: usize = 512;

/// WebSocket 管理器：持有两条推送通道与跨域策略。
pub struct Manager {
    debug_tx: broadcast::Sender<String>,
    status_tx: broadcast::Sender<String>,
    origins: OriginPolicy,
}

impl Manager {
    pub fn new(origins: OriginPolicy) -> Self {
        let (debug_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (status_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            debug_tx,
            status_tx,
            origins,
        }
    }

    /// 调试流的发送端。
    pub fn debug_sender(&self) -> broadcast::Sender<String> {
        self.debug_tx.clone()
    }

    /// 状态流的发送端。
    pub fn status_sender(&self) -> broadcast::Sender<String> {
        self.status_tx.clone()
    }

    /// 两个订阅端点的路由。
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/ws", get(serve_status))
            .route("/debug", get(serve_debug))
            .with_state(self)
    }

    fn origin_allowed(&self, headers: &HeaderMap) -> bool {
        let origin = headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        self.origins.allows(origin)
    }
}

/// `/ws`：状态快照订阅，带保活。
async fn serve_status(
    State(manager): State<Arc<Manager>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !manager.origin_allowed(&headers) {
        warn!("ws upgrade rejected by origin policy");
        return StatusCode::FORBIDDEN.into_response();
    }

    let rx = manager.status_tx.subscribe();
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| client::run_client(socket, rx, true))
}

/// `/debug`：报文流订阅，纯推送。
async fn serve_debug(
    State(manager): State<Arc<Manager>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !manager.origin_allowed(&headers) {
        warn!("ws upgrade rejected by origin policy");
        return StatusCode::FORBIDDEN.into_response();
    }

    let rx = manager.debug_tx.subscribe();
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| client::run_client(socket, rx, false))
}
