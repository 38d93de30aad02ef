//! 门禁人数网关服务入口。
//!
//! 装配顺序：配置 → 日志 → 存储（含迁移）→ 在线跟踪 → 穿门引擎，
//! 随后拉起调度器、状态快照、在线清扫、WebSocket 服务与 TCP 接入，
//! 最后等 SIGINT 统一收尾。

use clap::Parser;
use domain::OwnerContext;
use rewired_config::{DEFAULT_TCP_PORT, DEFAULT_WS_PORT, OriginPolicy, Settings};
use rewired_doorpass::DoorEngine;
use rewired_liveness::LivenessTracker;
use rewired_pipeline::{Dispatcher, run_status_snapshots};
use rewired_protocol::TcpIngestServer;
use rewired_storage::{
    DevicePairStore, DeviceStore, PopulationStore, RoomStore, SqliteStore, Store,
};
use rewired_telemetry::init_tracing;
use rewired_ws::Manager;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// 门禁人数网关：接入成对的门禁传感器，维护房间实时人数。
#[derive(Debug, Parser)]
#[command(name = "rewired-server")]
struct Cli {
    /// 设备接入的 TCP 端口
    #[arg(long = "tcpport", default_value_t = DEFAULT_TCP_PORT)]
    tcp_port: u16,

    /// WebSocket 服务端口
    #[arg(long = "wsport", default_value_t = DEFAULT_WS_PORT)]
    ws_port: u16,

    /// 允许的跨域来源：* 或逗号分隔的列表
    #[arg(long = "origins", default_value = "*")]
    origins: String,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let origins = match OriginPolicy::parse(&cli.origins) {
        Ok(origins) => origins,
        Err(err) => {
            error!(error = %err, "invalid origins configuration");
            std::process::exit(1);
        }
    };
    let settings = Settings::new(cli.tcp_port, cli.ws_port, origins);

    if run(settings).await.is_err() {
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<(), ()> {
    // 初始化失败一律致命
    let store = match SqliteStore::connect(&settings.database_url).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(error = %err, "failed to open database");
            return Err(());
        }
    };

    let liveness = match LivenessTracker::init(store.clone() as Arc<dyn DeviceStore>).await {
        Ok(liveness) => liveness,
        Err(err) => {
            error!(error = %err, "failed to init liveness tracker");
            return Err(());
        }
    };

    let doors = match DoorEngine::init(
        store.clone() as Arc<dyn DevicePairStore>,
        store.clone() as Arc<dyn PopulationStore>,
    )
    .await
    {
        Ok(doors) => Arc::new(doors),
        Err(err) => {
            error!(error = %err, "failed to init door engine");
            return Err(());
        }
    };

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    let failed = Arc::new(AtomicBool::new(false));

    let manager = Arc::new(Manager::new(settings.origins.clone()));
    let (packets_tx, packets_rx) = mpsc::channel(1);

    // 原始帧的唯一消费者
    let dispatcher = Dispatcher::new(
        store.clone() as Arc<dyn Store>,
        liveness.clone(),
        doors,
        manager.debug_sender(),
    );
    tracker.spawn(dispatcher.run(packets_rx, cancel.clone()));

    // 状态快照推送
    tracker.spawn(run_status_snapshots(
        OwnerContext::new(1),
        store.clone() as Arc<dyn DevicePairStore>,
        store.clone() as Arc<dyn RoomStore>,
        manager.status_sender(),
        cancel.clone(),
    ));

    // 在线清扫
    tracker.spawn(liveness.clone().run_sweeper(cancel.clone()));

    // WebSocket 服务
    let ws_listener = match tokio::net::TcpListener::bind(("0.0.0.0", settings.ws_port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, port = settings.ws_port, "failed to bind ws server");
            cancel.cancel();
            tracker.close();
            tracker.wait().await;
            return Err(());
        }
    };
    info!(port = settings.ws_port, "starting ws server");
    {
        let cancel = cancel.clone();
        let failed = failed.clone();
        let router = manager.clone().router();
        tracker.spawn(async move {
            let shutdown = cancel.clone();
            let serve = axum::serve(ws_listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(err) = serve.await {
                error!(error = %err, "ws server closed unexpectedly");
                failed.store(true, Ordering::SeqCst);
                cancel.cancel();
            }
        });
    }

    // 设备 TCP 接入
    let tcp = match TcpIngestServer::bind(settings.tcp_port, packets_tx, cancel.clone()).await {
        Ok(tcp) => tcp,
        Err(err) => {
            error!(error = %err, port = settings.tcp_port, "failed to bind tcp server");
            cancel.cancel();
            tracker.close();
            tracker.wait().await;
            return Err(());
        }
    };
    tracker.spawn(tcp.run());

    tracker.close();

    // SIGINT 或任一服务异常退出都会触发统一收尾
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                error!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        }
        _ = cancel.cancelled() => {}
    }

    cancel.cancel();
    tracker.wait().await;

    if failed.load(Ordering::SeqCst) {
        return Err(());
    }

    info!("server exited");
    Ok(())
}
