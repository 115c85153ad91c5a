use serde::{Deserialize, Serialize};

/// Response of starting a tracked download session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSessionInfo {
    pub session_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub client_id: String,
}

/// Progress snapshot for a download session, as reported by the server.
///
/// Speed and ETA are computed server-side; the client only displays them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProgress {
    pub session_id: String,
    pub bytes_transferred: u64,
    pub total_size: u64,
    pub progress_percent: f64,
    pub speed_bps: f64,
    #[serde(default)]
    pub speed_mbps: f64,
    pub eta_seconds: f64,
    #[serde(default)]
    pub elapsed_seconds: f64,
    pub is_complete: bool,
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of cancelling a download session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
}
