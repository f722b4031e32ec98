//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use vigil_config::VigilConfig;

/// A test server running in the background against a fresh temp-dir store.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    _handle: JoinHandle<()>,
    _cancel: CancellationToken,
    _temp_dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Start a server against a fresh temp-dir store, letting the caller
    /// tweak the config (e.g. a non-default `attendance_min`) before it's
    /// validated and built into running state.
    pub async fn start_with(customize: impl FnOnce(&mut VigilConfig)) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let addr = find_available_port().await?;

        let mut config = VigilConfig::default();
        config.persistence.database_path = temp_dir.path().join("vigil.db").to_string_lossy().into_owned();
        config.persistence.image_root = temp_dir.path().join("images").to_string_lossy().into_owned();
        config.persistence.snapshot_root = temp_dir.path().join("snapshots").to_string_lossy().into_owned();
        config.persistence.index_vector_path = temp_dir.path().join("index.vectors").to_string_lossy().into_owned();
        config.persistence.index_slot_map_path = temp_dir.path().join("index.slots").to_string_lossy().into_owned();
        config.presence.eviction_period_secs = 1;
        config.presence.refresh_period_secs = 1;
        customize(&mut config);

        let state = vigil_server::build_state(config)?;
        let cancel = vigil_server::spawn_background_tasks(&state);
        let router = vigil_server::router(state);

        let handle = tokio::spawn(async move {
            let _ = vigil_server::serve(router, addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            _handle: handle,
            _cancel: cancel,
            _temp_dir: temp_dir,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(format!("{}{}", self.base_url(), path))
    }
}

async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);
    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("timeout waiting for server to start"),
    }
}
