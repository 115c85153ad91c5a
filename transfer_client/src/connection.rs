use std::sync::{Arc, Mutex};

use reqwest::Response;
use tokio::task::JoinHandle;
use url::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use transfer_types::{ConnectResponse, HealthResponse, ServerStatus};

use crate::config::ClientConfig;
use crate::error::{Result, TransferError};
use crate::retry;

/// Client-side view of the logical session held with the server.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub client_id: Option<String>,
    pub connected: bool,
    pub retry_count: u32,
}

/// Outcome of a successful connect.
#[derive(Clone, Debug)]
pub struct ConnectInfo {
    pub client_id: String,
    pub health: HealthResponse,
}

struct ManagerInner {
    http: reqwest::Client,
    config: ClientConfig,
    session: Mutex<SessionState>,
    // Teardown handle for the metrics channel, registered by the stream
    // subscriber so disconnect can close the channel unconditionally.
    stream_guard: Mutex<Option<CancellationToken>>,
}

/// Owns the session identity (server-issued client id) and its lifecycle.
///
/// Cloning is cheap; all clones share the same session. The other
/// components read the session through this handle but never mutate it.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                http,
                config,
                session: Mutex::new(SessionState::default()),
                stream_guard: Mutex::new(None),
            }),
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Joins a path onto the configured endpoint root, validating the
    /// result. A misconfigured endpoint surfaces here as a parse error
    /// rather than deep inside reqwest.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.inner.config.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    /// Snapshot of the current session state.
    pub fn session(&self) -> SessionState {
        self.inner.session.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn client_id(&self) -> Option<String> {
        self.inner.session.lock().ok().and_then(|s| s.client_id.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.inner.session.lock().map(|s| s.connected).unwrap_or(false)
    }

    /// Establishes the session: a health probe, then a one-time
    /// registration call if no client id is held yet. Reconnecting with an
    /// existing client id keeps that identity; only an explicit
    /// [`disconnect`](Self::disconnect) discards it.
    pub async fn connect(&self) -> Result<ConnectInfo> {
        let health = match self.fetch_health().await {
            Ok(h) => h,
            Err(e) => {
                self.clear_session();
                return Err(TransferError::Connection(format!("health probe failed: {e}")));
            },
        };

        let held = { self.inner.session.lock()?.client_id.clone() };
        let client_id = match held {
            Some(id) => id,
            None => match self.register_client().await {
                Ok(resp) => resp.client_id,
                Err(e) => {
                    self.clear_session();
                    return Err(TransferError::Connection(format!("client registration failed: {e}")));
                },
            },
        };

        {
            let mut session = self.inner.session.lock()?;
            session.client_id = Some(client_id.clone());
            session.connected = true;
            session.retry_count = 0;
        }
        info!("connected to transfer server as client {client_id}");

        Ok(ConnectInfo { client_id, health })
    }

    /// Tears the session down. The server notify is best-effort; the local
    /// teardown (metrics channel, client id, state) happens regardless of
    /// its outcome.
    pub async fn disconnect(&self) -> Result<()> {
        let client_id = { self.inner.session.lock()?.client_id.clone() };

        if let Some(id) = &client_id {
            let body = serde_json::json!({ "client_id": id });
            match self.url("disconnect") {
                Ok(url) => {
                    let notify = self
                        .inner
                        .http
                        .post(url)
                        .json(&body)
                        .send()
                        .await
                        .and_then(|r| r.error_for_status());
                    if let Err(e) = notify {
                        warn!("server disconnect notify failed (ignored): {e}");
                    }
                },
                Err(e) => warn!("server disconnect notify skipped: {e}"),
            }
        }

        self.close_stream_channel();
        self.clear_session();
        debug!("session torn down");
        Ok(())
    }

    /// Spawns the connection supervisor: repeated `connect()` attempts at a
    /// fixed interval until one succeeds. This is the only place unbounded
    /// retries are allowed, since nothing works without a connection.
    ///
    /// Call this from the process entry point; constructing a manager has
    /// no connection side effects on its own.
    pub fn start_supervisor(&self) -> ConnectionSupervisor {
        let manager = self.clone();
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let interval = self.inner.config.connect_retry_interval;

        let handle = tokio::spawn(async move {
            let mut attempts = 0u32;
            loop {
                if loop_token.is_cancelled() {
                    break;
                }
                attempts += 1;
                match manager.connect().await {
                    Ok(info) => {
                        info!("supervisor connected as {} after {attempts} attempt(s)", info.client_id);
                        break;
                    },
                    Err(e) => {
                        if let Ok(mut session) = manager.inner.session.lock() {
                            session.retry_count = attempts;
                        }
                        warn!("connect attempt {attempts} failed: {e}; retrying in {interval:?}");
                    },
                }
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {},
                }
            }
        });

        ConnectionSupervisor { token, handle }
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.fetch_health().await
    }

    pub async fn server_status(&self) -> Result<ServerStatus> {
        let url = self.url("status")?;
        let response = self.send_with_retry(|http| http.get(url.clone())).await?;
        Ok(response.json().await?)
    }

    /// Issues a request through the retry wrapper, reconnecting on
    /// unauthorized responses. A success resets the session retry counter.
    pub(crate) async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let result = retry::execute_with_retry(
            || build(&self.inner.http).send(),
            &self.inner.config.retry,
            || async { self.connect().await.map(|_| ()) },
        )
        .await;

        if result.is_ok() {
            if let Ok(mut session) = self.inner.session.lock() {
                session.retry_count = 0;
            }
        }
        result
    }

    /// Issues a single request with no retries. Used by the download poll
    /// loop, where a failure is terminal for the session rather than
    /// retried.
    pub(crate) async fn send_once<F>(&self, build: F) -> Result<Response>
    where
        F: FnOnce(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let response = build(&self.inner.http).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(TransferError::Request { status })
        }
    }

    /// Registers the metrics channel's teardown token, closing any channel
    /// registered before it (single-channel invariant).
    pub(crate) fn register_stream_guard(&self, token: CancellationToken) {
        if let Ok(mut guard) = self.inner.stream_guard.lock() {
            if let Some(previous) = guard.replace(token) {
                previous.cancel();
            }
        }
    }

    pub(crate) fn close_stream_channel(&self) {
        if let Ok(mut guard) = self.inner.stream_guard.lock() {
            if let Some(token) = guard.take() {
                token.cancel();
            }
        }
    }

    fn clear_session(&self) {
        if let Ok(mut session) = self.inner.session.lock() {
            *session = SessionState::default();
        }
    }

    async fn fetch_health(&self) -> Result<HealthResponse> {
        let url = self.url("health")?;
        let response = self.send_once(|http| http.get(url)).await?;
        Ok(response.json().await?)
    }

    async fn register_client(&self) -> Result<ConnectResponse> {
        let url = self.url("connect")?;
        let response = self.send_once(|http| http.post(url)).await?;
        Ok(response.json().await?)
    }
}

/// Teardown handle for the auto-connect loop. The loop exits on its own
/// once connected; `stop` cancels it early.
pub struct ConnectionSupervisor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ConnectionSupervisor {
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Waits for the loop to finish (connected or stopped).
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn manager(endpoint: &str) -> ConnectionManager {
        ConnectionManager::new(ClientConfig::with_endpoint(endpoint)).unwrap()
    }

    #[test]
    fn url_joins_endpoint_and_path() {
        let m = manager("http://localhost:5000/api");
        assert_eq!(m.url("health").unwrap().as_str(), "http://localhost:5000/api/health");
        assert_eq!(m.url("/files/list").unwrap().as_str(), "http://localhost:5000/api/files/list");
    }

    #[test]
    fn url_tolerates_trailing_slash() {
        let m = manager("http://localhost:5000/api/");
        assert_eq!(m.url("connect").unwrap().as_str(), "http://localhost:5000/api/connect");
    }

    #[test]
    fn url_rejects_an_unparsable_endpoint() {
        let m = manager("not an endpoint");
        let err = m.url("health").unwrap_err();
        assert!(matches!(err, TransferError::ParseError(_)));
    }

    #[test]
    fn fresh_manager_is_disconnected() {
        let m = manager("http://localhost:5000/api");
        let session = m.session();
        assert!(!session.connected);
        assert!(session.client_id.is_none());
        assert_eq!(session.retry_count, 0);
    }
}
