//! Binary entry point: reads deployment config from the environment and
//! runs the WebSocket server edge until the process is killed.

use flowstate_server::RoomConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = RoomConfig::from_env();
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));

    flowstate_server::transport::run_ws(addr, config).await?;
    Ok(())
}
