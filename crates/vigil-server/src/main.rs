//! Binary entry point: load config, build state, serve HTTP/WS.

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing_subscriber::prelude::*;
use vigil_config::VigilConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "vigil_server=info,vigil_camera=info,info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let config_path = std::env::var("VIGIL_CONFIG").ok().map(PathBuf::from);
    let config = VigilConfig::load(config_path.as_deref())?;

    let state = vigil_server::build_state(config)?;
    let _cancel = vigil_server::spawn_background_tasks(&state);

    let addr: SocketAddr = std::env::var("VIGIL_BIND")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let router = vigil_server::router(state);
    vigil_server::serve(router, addr).await
}
