use anyhow::Context;
use clap::Parser;
use hostwatch_config::{
    ConfigLoader, ConfigManager, ConfigProvider, FileConfigProvider, PolicyHandle,
};
use hostwatch_server::{api, logging, AppState, Services};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 配置文件轮询间隔
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// 关闭时等待分发队列的最长时间
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about = "Host metric alerting service", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 配置错误直接退出，没有合法阈值无法评估告警
    let config = ConfigLoader::new(&args.config)
        .load_validated()
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    logging::init_tracing(&config.logging);
    info!(config = %args.config, "Starting hostwatch");

    let policy = Arc::new(PolicyHandle::new(config.policy_snapshot()));

    let provider = Arc::new(FileConfigProvider::new(&args.config));
    let version = provider.version().await.unwrap_or(0);
    let manager = Arc::new(ConfigManager::new(
        provider,
        config.clone(),
        version,
        policy.clone(),
    ));

    let mut services = Services::build(&config, policy).await?;
    services.start_background(&config);
    let reload_task = manager.clone().start_polling(CONFIG_POLL_INTERVAL);

    let state = AppState::new(services.coordinator.clone(), manager.subscribe());
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reload_task.abort();
    services.shutdown(DRAIN_TIMEOUT).await;
    info!("hostwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
