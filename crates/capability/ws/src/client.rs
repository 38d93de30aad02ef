//! 单个订阅连接的读写任务。

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::RngCore;
use rewired_telemetry::{record_ws_connect, record_ws_disconnect, record_ws_lagged};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// 等待对端活动的期限。
const PONG_WAIT: Duration = Duration::from_secs(10);

/// 主动 ping 的周期，取期限的九成。
const PING_INTERVAL: Duration = Duration::from_secs(9);

/// 一条订阅连接：读写各一个任务，任一方向结束即整体断开。
///
/// `keepalive` 打开时写侧周期发 ping、读侧强制期限；
/// 关闭时为纯推送，读侧只负责排空入站帧直到对端关闭。
pub(crate) async fn run_client(socket: WebSocket, rx: broadcast::Receiver<String>, keepalive: bool) {
    let id = client_id();
    info!(client_id = %id, "client connected");
    record_ws_connect();

    let (sink, stream) = socket.split();
    let deadline = keepalive.then_some(PONG_WAIT);

    let mut write_task = tokio::spawn(write_messages(sink, rx, keepalive));
    let mut read_task = tokio::spawn(read_messages(stream, deadline));

    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    record_ws_disconnect();
    info!(client_id = %id, "client disconnecting");
}

/// 写循环：转发广播消息，按需发 ping。
///
/// 自己的队列被写满时会收到 Lagged，丢掉最老的积压继续跟上，
/// 不影响其他订阅端。
async fn write_messages(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: broadcast::Receiver<String>,
    keepalive: bool,
) {
    let mut ping = tokio::time::interval(PING_INTERVAL);
    // interval 的首个 tick 立即完成，先消耗掉
    ping.tick().await;

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(message) => {
                    if let Err(err) = sink.send(Message::Text(message.into())).await {
                        debug!(error = %err, "failed to send message");
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    record_ws_lagged(skipped);
                    warn!(skipped, "subscriber lagging, oldest messages dropped");
                }
                Err(RecvError::Closed) => {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
            },
            _ = ping.tick(), if keepalive => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// 读循环：排空入站帧。
///
/// 有期限时任何入站帧（pong 在内）都会刷新期限，超时视为
/// 对端失联。
async fn read_messages(mut stream: SplitStream<WebSocket>, deadline: Option<Duration>) {
    loop {
        let received = match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, stream.next()).await {
                Ok(received) => received,
                Err(_) => {
                    debug!("read deadline reached without pong");
                    return;
                }
            },
            None => stream.next().await,
        };

        match received {
            Some(Ok(Message::Close(_))) => {
                info!("client closed socket");
                return;
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                debug!(error = %err, "unexpected ws close");
                return;
            }
            None => return,
        }
    }
}

/// 为每条连接生成 256 位随机十六进制标识。
fn client_id() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);

    let mut id = String::with_capacity(buf.len() * 2);
    for byte in buf {
        use std::fmt::Write;
        let _ = write!(id, "{byte:02x}");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_256_bit_hex() {
        let id = client_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn client_ids_are_unique() {
        assert_ne!(client_id(), client_id());
    }

    #[test]
    fn ping_interval_is_nine_tenths_of_pong_wait() {
        assert_eq!(PING_INTERVAL, PONG_WAIT * 9 / 10);
    }
}
