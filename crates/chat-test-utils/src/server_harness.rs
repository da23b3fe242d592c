//! Test server harness for E2E testing
//!
//! Provides `TestChatServer` for spawning real chat server instances in tests.

use chat_service::config::Config;
use chat_service::routes::{self, AppState};
use chat_service::services::{ChatStore, InMemoryChatStore, PgChatStore};
use chat_service::tasks::{start_liveness_sweeper, SweeperConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning the chat server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_join_flow() -> Result<()> {
///     let (server, store) = TestChatServer::spawn_in_memory().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .post(format!("{}/participants", server.url()))
///         .json(&serde_json::json!({ "name": "alice" }))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 201);
///     Ok(())
/// }
/// ```
pub struct TestChatServer {
    addr: SocketAddr,
    store: Arc<dyn ChatStore>,
    config: Config,
    sweeper_token: Option<CancellationToken>,
    sweeper_handle: Option<JoinHandle<()>>,
    _handle: JoinHandle<()>,
}

impl TestChatServer {
    /// Spawn a server backed by a fresh in-memory store.
    ///
    /// Returns the concrete store too, so tests can inject failures or age
    /// participants.
    pub async fn spawn_in_memory() -> Result<(Self, Arc<InMemoryChatStore>), anyhow::Error> {
        let store = Arc::new(InMemoryChatStore::new());
        let server = Self::spawn(store.clone()).await?;
        Ok((server, store))
    }

    /// Spawn a server backed by PostgreSQL.
    ///
    /// # Arguments
    /// * `pool` - Database connection pool (typically from `#[sqlx::test]`)
    pub async fn spawn_with_pool(pool: PgPool) -> Result<Self, anyhow::Error> {
        Self::spawn(Arc::new(PgChatStore::new(pool))).await
    }

    /// Spawn a server over any store.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    ///
    /// No sweeper runs unless [`Self::start_sweeper`] is called.
    pub async fn spawn(store: Arc<dyn ChatStore>) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_HOST".to_string(), "127.0.0.1".to_string()),
            ("PORT".to_string(), "0".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState { store: store.clone() });

        // Each server gets its own recorder handle; nothing is installed globally
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            store,
            config,
            sweeper_token: None,
            sweeper_handle: None,
            _handle: handle,
        })
    }

    /// Start a liveness sweeper against this server's store.
    ///
    /// Replaces any sweeper already started by this harness.
    pub fn start_sweeper(&mut self, config: SweeperConfig) {
        self.stop_sweeper();

        let token = CancellationToken::new();
        let handle = tokio::spawn(start_liveness_sweeper(
            self.store.clone(),
            config,
            token.clone(),
        ));

        self.sweeper_token = Some(token);
        self.sweeper_handle = Some(handle);
    }

    fn stop_sweeper(&mut self) {
        if let Some(token) = self.sweeper_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.sweeper_handle.take() {
            handle.abort();
        }
    }

    /// Get the store the server reads and writes.
    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestChatServer {
    fn drop(&mut self) {
        self.stop_sweeper();
        self._handle.abort();
    }
}
