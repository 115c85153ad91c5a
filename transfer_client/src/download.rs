use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use transfer_types::{DownloadSessionInfo, TransferProgress};

use crate::connection::ConnectionManager;
use crate::error::{Result, TransferError};

/// Lifecycle of a tracked download session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadStatus {
    Starting,
    Downloading,
    Completed,
    Error,
    Cancelled,
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl Display for DownloadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Read-only snapshot of one download session's state.
#[derive(Clone, Debug)]
pub struct DownloadState {
    pub session_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub client_id: String,
    pub progress_percent: f64,
    /// Bytes per second, as computed server-side.
    pub speed_bps: f64,
    /// None until the server has enough samples to compute one.
    pub eta_seconds: Option<f64>,
    pub status: DownloadStatus,
    pub error: Option<String>,
    pub started_at: Instant,
}

impl DownloadState {
    fn new(info: &DownloadSessionInfo) -> Self {
        Self {
            session_id: info.session_id.clone(),
            file_name: info.file_name.clone(),
            file_size: info.file_size,
            client_id: info.client_id.clone(),
            progress_percent: 0.0,
            speed_bps: 0.0,
            eta_seconds: None,
            status: DownloadStatus::Starting,
            error: None,
            started_at: Instant::now(),
        }
    }
}

/// Folds a server progress report into the session state.
fn merge_progress(state: &mut DownloadState, progress: &TransferProgress) {
    if state.status.is_terminal() {
        return;
    }
    state.progress_percent = progress.progress_percent.clamp(0.0, 100.0);
    state.speed_bps = progress.speed_bps.max(0.0);
    state.eta_seconds = if progress.is_complete {
        Some(0.0)
    } else if progress.speed_bps > 0.0 {
        Some(progress.eta_seconds.max(0.0))
    } else {
        None
    };
    if progress.is_complete {
        state.progress_percent = 100.0;
        state.status = DownloadStatus::Completed;
    } else {
        state.status = DownloadStatus::Downloading;
    }
}

pub type ProgressCallback = Arc<dyn Fn(DownloadState) + Send + Sync>;

struct DownloadEntry {
    state: Arc<Mutex<DownloadState>>,
    poll_token: CancellationToken,
}

/// Tracks server-side download sessions: opens them, polls their progress,
/// and exposes read-only snapshots keyed by session id.
///
/// The actual bytes are transferred by the host over the session-scoped
/// URL (see [`stream_url`](Self::stream_url)); the tracker only observes
/// progress through polling.
#[derive(Clone)]
pub struct DownloadTracker {
    manager: ConnectionManager,
    active: Arc<Mutex<HashMap<String, DownloadEntry>>>,
}

impl DownloadTracker {
    pub(crate) fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Opens a download session for `path` and spawns its polling loop.
    /// Exactly one loop runs per session; it self-terminates on
    /// completion, error, or cancellation.
    pub async fn start(&self, path: &str, on_progress: Option<ProgressCallback>) -> Result<DownloadState> {
        let client_id = self.manager.client_id().ok_or(TransferError::NotConnected)?;

        let body = serde_json::json!({ "path": path, "client_id": client_id });
        let url = self.manager.url("transfer/start-download")?;
        let response = self
            .manager
            .send_with_retry(|http| http.post(url.clone()).json(&body))
            .await
            .map_err(|e| TransferError::Session(format!("failed to start download for {path}: {e}")))?;
        let info: DownloadSessionInfo = response.json().await?;

        let snapshot = DownloadState::new(&info);
        let state = Arc::new(Mutex::new(snapshot.clone()));
        let poll_token = CancellationToken::new();

        {
            let mut active = self.active.lock()?;
            // Session ids are server-issued and unique; a stale entry under
            // the same id would mean a second loop, so close it out first.
            if let Some(previous) = active.insert(
                info.session_id.clone(),
                DownloadEntry {
                    state: state.clone(),
                    poll_token: poll_token.clone(),
                },
            ) {
                previous.poll_token.cancel();
            }
        }

        let tracker = self.clone();
        let session_id = info.session_id.clone();
        tokio::spawn(async move {
            tracker.poll_loop(session_id, state, poll_token, on_progress).await;
        });

        debug!("download session {} started for {path} ({} bytes)", info.session_id, info.file_size);
        Ok(snapshot)
    }

    /// Session-scoped URL the host's native transport downloads the bytes
    /// from.
    pub fn stream_url(&self, session_id: &str) -> Result<String> {
        Ok(self
            .manager
            .url(&format!("transfer/stream-download/{session_id}"))?
            .into())
    }

    /// Progress snapshot for one session.
    pub fn progress(&self, session_id: &str) -> Option<DownloadState> {
        let active = self.active.lock().ok()?;
        let entry = active.get(session_id)?;
        entry.state.lock().ok().map(|s| s.clone())
    }

    /// Snapshots of every tracked session.
    pub fn active_sessions(&self) -> Vec<DownloadState> {
        let Ok(active) = self.active.lock() else {
            return Vec::new();
        };
        active
            .values()
            .filter_map(|entry| entry.state.lock().ok().map(|s| s.clone()))
            .collect()
    }

    /// Requests cancellation of a session. The server notify is
    /// fire-and-forget; the poll loop stops and the session is marked
    /// cancelled immediately. The caller dismisses the entry afterwards.
    pub fn cancel(&self, session_id: &str) -> Result<()> {
        let entry_state = {
            let active = self.active.lock()?;
            let entry = active
                .get(session_id)
                .ok_or_else(|| TransferError::Session(format!("unknown download session {session_id}")))?;
            entry.poll_token.cancel();
            entry.state.clone()
        };

        if let Ok(mut state) = entry_state.lock() {
            state.status = DownloadStatus::Cancelled;
        }

        let http = self.manager.http().clone();
        let url = self.manager.url(&format!("transfer/cancel-download/{session_id}"))?;
        let sid = session_id.to_string();
        tokio::spawn(async move {
            match http.post(url).send().await {
                Ok(resp) if resp.status().is_success() => debug!("download session {sid} cancelled"),
                Ok(resp) => warn!("cancel notify for {sid} returned {}", resp.status()),
                Err(e) => warn!("cancel notify for {sid} failed: {e}"),
            }
        });

        Ok(())
    }

    /// Drops a session from the active set. Intended for sessions that
    /// have reached a terminal status.
    pub fn dismiss(&self, session_id: &str) -> bool {
        let Ok(mut active) = self.active.lock() else {
            return false;
        };
        match active.remove(session_id) {
            Some(entry) => {
                entry.poll_token.cancel();
                true
            },
            None => false,
        }
    }

    async fn poll_loop(
        &self,
        session_id: String,
        state: Arc<Mutex<DownloadState>>,
        token: CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) {
        let interval = self.manager.config().poll_interval;

        loop {
            if token.is_cancelled() {
                break;
            }

            match self.fetch_progress(&session_id).await {
                Ok(progress) => {
                    if token.is_cancelled() {
                        break;
                    }
                    let snapshot = {
                        let Ok(mut state) = state.lock() else {
                            break;
                        };
                        merge_progress(&mut state, &progress);
                        state.clone()
                    };
                    if let Some(cb) = &on_progress {
                        cb(snapshot.clone());
                    }
                    if snapshot.status == DownloadStatus::Completed {
                        debug!("download session {session_id} completed");
                        break;
                    }
                },
                Err(e) => {
                    // Poll failures are terminal for the session; they are
                    // recorded on the state rather than propagated.
                    warn!("progress poll for session {session_id} failed: {e}");
                    let snapshot = {
                        let Ok(mut state) = state.lock() else {
                            break;
                        };
                        if !state.status.is_terminal() {
                            state.status = DownloadStatus::Error;
                            state.error = Some(e.to_string());
                        }
                        state.clone()
                    };
                    if let Some(cb) = &on_progress {
                        cb(snapshot);
                    }
                    break;
                },
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {},
            }
        }
    }

    async fn fetch_progress(&self, session_id: &str) -> Result<TransferProgress> {
        let url = self.manager.url(&format!("transfer/download-progress/{session_id}"))?;
        let response = self.manager.send_once(|http| http.get(url)).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DownloadSessionInfo {
        DownloadSessionInfo {
            session_id: "s1".to_string(),
            file_name: "a.bin".to_string(),
            file_size: 1024,
            client_id: "c1".to_string(),
        }
    }

    fn report(percent: f64, speed: f64, complete: bool) -> TransferProgress {
        TransferProgress {
            session_id: "s1".to_string(),
            bytes_transferred: (percent * 10.24) as u64,
            total_size: 1024,
            progress_percent: percent,
            speed_bps: speed,
            speed_mbps: speed / (1024.0 * 1024.0),
            eta_seconds: if speed > 0.0 { 2.0 } else { 0.0 },
            elapsed_seconds: 1.0,
            is_complete: complete,
            is_processing: !complete,
            error: None,
        }
    }

    #[test]
    fn status_display_matches_wire_words() {
        assert_eq!(DownloadStatus::Starting.to_string(), "starting");
        assert_eq!(DownloadStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn merge_moves_starting_to_downloading() {
        let mut state = DownloadState::new(&info());
        merge_progress(&mut state, &report(25.0, 512.0, false));
        assert_eq!(state.status, DownloadStatus::Downloading);
        assert_eq!(state.progress_percent, 25.0);
        assert_eq!(state.eta_seconds, Some(2.0));
    }

    #[test]
    fn merge_leaves_eta_unset_until_speed_is_known() {
        let mut state = DownloadState::new(&info());
        merge_progress(&mut state, &report(0.0, 0.0, false));
        assert_eq!(state.eta_seconds, None);
    }

    #[test]
    fn merge_completion_pins_percent_to_100() {
        let mut state = DownloadState::new(&info());
        merge_progress(&mut state, &report(99.2, 512.0, true));
        assert_eq!(state.status, DownloadStatus::Completed);
        assert_eq!(state.progress_percent, 100.0);
        assert_eq!(state.eta_seconds, Some(0.0));
    }

    #[test]
    fn merge_never_resurrects_a_terminal_session() {
        let mut state = DownloadState::new(&info());
        state.status = DownloadStatus::Cancelled;
        merge_progress(&mut state, &report(80.0, 512.0, false));
        assert_eq!(state.status, DownloadStatus::Cancelled);
        assert_eq!(state.progress_percent, 0.0);
    }
}
