use std::sync::Arc;

use transfer_types::{ClientMetrics, GlobalMetrics, MetricsEvent, MetricsHistory};

use crate::config::ClientConfig;
use crate::connection::{ConnectInfo, ConnectionManager, ConnectionSupervisor};
use crate::download::{DownloadState, DownloadTracker, ProgressCallback};
use crate::error::Result;
use crate::metrics::{MetricsCallback, MetricsStream, MetricsSubscription};

/// A tracked download: the session state plus the server's byte stream.
///
/// The caller consumes `transfer` through its own transport (the tracker
/// never reads the bytes); progress arrives through polling.
pub struct TrackedDownload {
    pub state: DownloadState,
    pub transfer: reqwest::Response,
}

/// Top-level entry point composing the connection manager, the download
/// session tracker, and the metrics stream subscriber.
///
/// Cloning is cheap; all clones share the same session, download set, and
/// metrics channel.
#[derive(Clone)]
pub struct TransferClient {
    manager: ConnectionManager,
    downloads: DownloadTracker,
    metrics: MetricsStream,
}

impl TransferClient {
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let manager = ConnectionManager::new(config)?;
        Ok(Self {
            downloads: DownloadTracker::new(manager.clone()),
            metrics: MetricsStream::new(manager.clone()),
            manager,
        })
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn downloads(&self) -> &DownloadTracker {
        &self.downloads
    }

    pub fn metrics(&self) -> &MetricsStream {
        &self.metrics
    }

    pub async fn connect(&self) -> Result<ConnectInfo> {
        self.manager.connect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.manager.disconnect().await
    }

    /// Spawns the auto-connect loop. Explicitly invoked by the process
    /// entry point; nothing connects as a side effect of construction.
    pub fn start_connection_supervisor(&self) -> ConnectionSupervisor {
        self.manager.start_supervisor()
    }

    /// Opens a download session for `path` and begins progress polling.
    /// The caller fetches the bytes from
    /// [`DownloadTracker::stream_url`] with its own transport.
    pub async fn start_download(&self, path: &str) -> Result<DownloadState> {
        self.downloads.start(path, None).await
    }

    /// Opens a download session, triggers the byte transfer, and reports
    /// progress through `on_progress` until the session completes.
    pub async fn download_file(
        &self,
        path: &str,
        on_progress: impl Fn(DownloadState) + Send + Sync + 'static,
    ) -> Result<TrackedDownload> {
        let callback: ProgressCallback = Arc::new(on_progress);
        let state = self.downloads.start(path, Some(callback)).await?;
        let url = self.downloads.stream_url(&state.session_id)?;
        let transfer = self.manager.send_once(|http| http.get(url)).await?;
        Ok(TrackedDownload { state, transfer })
    }

    pub fn download_progress(&self, session_id: &str) -> Option<DownloadState> {
        self.downloads.progress(session_id)
    }

    pub fn cancel_download(&self, session_id: &str) -> Result<()> {
        self.downloads.cancel(session_id)
    }

    pub async fn subscribe_to_metrics(
        &self,
        callback: impl Fn(MetricsEvent) + Send + Sync + 'static,
    ) -> Result<MetricsSubscription> {
        let callback: MetricsCallback = Arc::new(callback);
        self.metrics.subscribe(callback).await
    }

    pub async fn global_metrics(&self) -> Result<GlobalMetrics> {
        self.metrics.global().await
    }

    pub async fn client_metrics(&self, client_id: &str) -> Result<ClientMetrics> {
        self.metrics.for_client(client_id).await
    }

    pub async fn metrics_history(&self, seconds: u64) -> Result<MetricsHistory> {
        self.metrics.history(seconds).await
    }
}
