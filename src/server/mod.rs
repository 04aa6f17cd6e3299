//! TLS mock of the spreadsheet API and its process-wide lifecycle.
//!
//! [`MockServerManager`] owns at most one running server. The server runs on
//! a dedicated OS thread with its own tokio runtime, so it keeps serving
//! after the runtime of the test that started it is gone.

pub mod a1;
pub(crate) mod routes;
pub(crate) mod state;

pub use state::{Expectation, RecordedRequest};

use crate::client::RedirectedClientConfig;
use crate::config::{Credentials, HarnessConfig, SheetsConfiguration};
use crate::error::{HarnessError, HarnessResult};
use crate::logging::{log_debug, log_error, log_info};
use crate::port::find_available_tcp_port;
use crate::tls::KeyStore;
use axum_server::tls_rustls::RustlsConfig;
use state::{ServerState, SharedState};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, OnceCell};

const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
const SERVER_WORKER_THREADS: usize = 2;

/// Builder for a mock server instance.
#[derive(Debug, Clone)]
pub struct MockSheetsServer {
    credentials: Credentials,
    keystore: KeyStore,
    port: Option<u16>,
    startup_timeout: Duration,
}

impl MockSheetsServer {
    pub fn new(credentials: Credentials, keystore: KeyStore) -> Self {
        Self {
            credentials,
            keystore,
            port: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Builder presenting the identity stored in the PKCS#12 file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::KeyStore`] if the file is unreadable or
    /// `password` does not open it.
    pub fn with_keystore_file(
        credentials: Credentials,
        path: impl AsRef<Path>,
        password: &str,
    ) -> HarnessResult<Self> {
        Ok(Self::new(credentials, KeyStore::load(path, password)?))
    }

    /// Listen on `port` instead of a randomly allocated one.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Start serving and wait until the listener is bound.
    pub async fn start(self) -> HarnessResult<MockServerHandle> {
        let port = match self.port {
            Some(port) => port,
            None => find_available_tcp_port()?,
        };
        let tls = RustlsConfig::from_config(Arc::new(self.keystore.server_config()?));
        let state: SharedState = Arc::new(ServerState::new(self.credentials.clone()));
        let app = routes::router(state.clone());
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let server = axum_server::Handle::new();
        let running = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel::<Result<SocketAddr, String>>();

        let thread_server = server.clone();
        let thread_running = running.clone();
        std::thread::Builder::new()
            .name(format!("mock-sheets-{port}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(SERVER_WORKER_THREADS)
                    .thread_name("mock-sheets-worker")
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("could not build runtime: {e}")));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let serve = axum_server::bind_rustls(addr, tls)
                        .handle(thread_server.clone())
                        .serve(app.into_make_service());
                    tokio::pin!(serve);

                    let bound = tokio::select! {
                        bound = thread_server.listening() => {
                            bound.ok_or_else(|| "listener closed before binding".to_string())
                        }
                        result = &mut serve => Err(match result {
                            Ok(()) => "server exited before binding".to_string(),
                            Err(e) => e.to_string(),
                        }),
                    };

                    match bound {
                        Ok(bound) => {
                            thread_running.store(true, Ordering::SeqCst);
                            let _ = ready_tx.send(Ok(bound));
                            if let Err(e) = serve.await {
                                log_error!(
                                    port = port,
                                    error = %e,
                                    "Mock server stopped with error"
                                );
                            }
                            thread_running.store(false, Ordering::SeqCst);
                        }
                        Err(message) => {
                            let _ = ready_tx.send(Err(message));
                        }
                    }
                });
            })
            .map_err(|e| {
                HarnessError::server_startup(format!("Failed to spawn mock server thread: {e}"))
            })?;

        let local_addr = match tokio::time::timeout(self.startup_timeout, ready_rx).await {
            Ok(Ok(Ok(bound))) => bound,
            Ok(Ok(Err(message))) => {
                return Err(HarnessError::server_startup(format!(
                    "Mock server could not listen on port {port}: {message}"
                )));
            }
            Ok(Err(_)) => {
                return Err(HarnessError::server_startup(format!(
                    "Mock server thread for port {port} exited before listening"
                )));
            }
            Err(_) => {
                server.shutdown();
                return Err(HarnessError::server_startup(format!(
                    "Mock server did not start listening on port {port} within {} ms",
                    self.startup_timeout.as_millis()
                )));
            }
        };

        log_info!(
            port = port,
            local_addr = %local_addr,
            keystore = %self.keystore.path().display(),
            "Mock spreadsheet server listening"
        );

        Ok(MockServerHandle {
            port,
            local_addr,
            keystore: self.keystore,
            credentials: self.credentials,
            running,
            state,
            server,
        })
    }
}

/// A running mock server.
pub struct MockServerHandle {
    port: u16,
    local_addr: SocketAddr,
    keystore: KeyStore,
    credentials: Credentials,
    running: Arc<AtomicBool>,
    state: SharedState,
    server: axum_server::Handle,
}

impl fmt::Debug for MockServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServerHandle")
            .field("port", &self.port)
            .field("local_addr", &self.local_addr)
            .field("keystore", &self.keystore)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl MockServerHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `https://localhost:<port>/`
    pub fn base_url(&self) -> String {
        format!("https://localhost:{}/", self.port)
    }

    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Prepare for a test: drop leftover expectations and journal entries.
    pub async fn init(&self) -> HarnessResult<()> {
        if !self.is_running() {
            return Err(HarnessError::server_startup(format!(
                "Mock server on port {} is not running",
                self.port
            )));
        }
        let expectations = self.state.clear_expectations().await;
        let requests = self.state.clear_journal().await;
        log_debug!(port = self.port, expectations, requests, "Mock server initialized");
        Ok(())
    }

    /// Forget what a test recorded and configured. Emulated spreadsheets are kept.
    pub async fn reset(&self) {
        let expectations = self.state.clear_expectations().await;
        let requests = self.state.clear_journal().await;
        log_debug!(port = self.port, expectations, requests, "Mock server reset");
    }

    /// Requests received since the last `init` or `reset`.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.journal().await
    }

    /// Number of journaled requests with `method` whose path starts with `path_prefix`.
    pub async fn request_count(&self, method: &str, path_prefix: &str) -> usize {
        self.state
            .journal()
            .await
            .iter()
            .filter(|r| r.method.eq_ignore_ascii_case(method) && r.path.starts_with(path_prefix))
            .count()
    }

    pub async fn expect(&self, expectation: Expectation) {
        self.state.add_expectation(expectation).await;
    }

    /// Client settings that point at this server and trust its certificate.
    pub fn redirected_client_config(
        &self,
        configuration: SheetsConfiguration,
    ) -> RedirectedClientConfig {
        RedirectedClientConfig::new(configuration, self.port, self.keystore.clone())
    }

    /// Stop serving. Only meant for servers started directly through [`MockSheetsServer`].
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

/// Owns the single mock server of a test run.
///
/// Keep one manager in a `static` so every test shares the same server:
///
/// ```ignore
/// static SERVER: Lazy<MockServerManager> = Lazy::new(|| MockServerManager::new(config));
/// let handle = SERVER.get_or_create().await?;
/// ```
#[derive(Debug)]
pub struct MockServerManager {
    config: HarnessConfig,
    cell: OnceCell<Arc<MockServerHandle>>,
}

impl MockServerManager {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub fn from_env() -> HarnessResult<Self> {
        Ok(Self::new(HarnessConfig::from_env()?))
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The server, if one has been started.
    pub fn get(&self) -> Option<Arc<MockServerHandle>> {
        self.cell.get().cloned()
    }

    /// Start the server on first use; later calls return the same instance.
    pub async fn get_or_create(&self) -> HarnessResult<Arc<MockServerHandle>> {
        self.cell.get_or_try_init(|| self.create()).await.cloned()
    }

    async fn create(&self) -> HarnessResult<Arc<MockServerHandle>> {
        let options = self.config.load_options()?;
        let configuration = SheetsConfiguration::from_options(&options)?;
        let handle = MockSheetsServer::with_keystore_file(
            configuration.credentials,
            &self.config.keystore_path,
            &self.config.keystore_password,
        )?
        .with_startup_timeout(self.config.startup_timeout)
        .start()
        .await?;

        if !handle.is_running() {
            return Err(HarnessError::server_startup(format!(
                "Mock server on port {} reported listening but is not running",
                handle.port()
            )));
        }
        Ok(Arc::new(handle))
    }
}
