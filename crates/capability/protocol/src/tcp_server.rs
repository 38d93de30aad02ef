//! 设备侧 TCP 接入。
//!
//! 监听 TCP 端口，每个连接一个读取任务，把解析出的原始帧投递到
//! 容量为 1 的通道。通道满时读取任务原地等待，慢消费直接反压到
//! 设备连接上。

use crate::error::ProtocolError;
use crate::frame::RawPacket;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// 设备接入服务器。
pub struct TcpIngestServer {
    listener: TcpListener,
    packets_tx: mpsc::Sender<RawPacket>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl TcpIngestServer {
    /// 绑定监听端口。
    pub async fn bind(
        port: u16,
        packets_tx: mpsc::Sender<RawPacket>,
        cancel: CancellationToken,
    ) -> Result<Self, ProtocolError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!(port, "tcp server listening");

        Ok(Self {
            listener,
            packets_tx,
            cancel,
            tracker: TaskTracker::new(),
        })
    }

    /// 运行接受循环，直到取消信号到来，再等所有连接读完退出。
    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        debug!(peer = %peer_addr, "device connected");
                        let packets_tx = self.packets_tx.clone();
                        let cancel = self.cancel.clone();
                        self.tracker.spawn(read_connection(stream, packets_tx, cancel));
                    }
                    Err(err) => error!(error = %err, "failed to accept connection"),
                },
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        info!("tcp server stopped");
    }
}

/// 读取单个连接上的帧流。
///
/// 解码错误之后流无法重新对齐，直接断开该连接；EOF 按正常下线处理。
async fn read_connection(
    mut stream: TcpStream,
    packets_tx: mpsc::Sender<RawPacket>,
    cancel: CancellationToken,
) {
    loop {
        let packet = tokio::select! {
            _ = cancel.cancelled() => break,
            read = RawPacket::read_from(&mut stream) => match read {
                Ok(packet) => packet,
                Err(ProtocolError::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("socket received EOF");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "failed to read packet");
                    break;
                }
            },
        };

        if packets_tx.send(packet).await.is_err() {
            warn!("packet channel closed, dropping connection");
            break;
        }
    }

    debug!("finished reading from connection");
}
