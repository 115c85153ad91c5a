use serde::{Deserialize, Serialize};

/// Per-sample congestion metrics reported by the server for one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub timestamp: f64,
    pub cwnd: f64,
    pub ssthresh: f64,
    pub rtt: f64,
    pub bandwidth: f64,
    pub packet_loss: f64,
    pub algorithm: String,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Aggregated server-wide metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalMetrics {
    #[serde(default)]
    pub total_bytes_transferred: f64,
    #[serde(default)]
    pub active_connections: u64,
    #[serde(default)]
    pub average_rtt: f64,
    #[serde(default)]
    pub total_packet_loss: f64,
    #[serde(default)]
    pub total_bandwidth: f64,
    #[serde(default)]
    pub timestamp: f64,
}

/// One decoded event from the server-push metrics channel.
///
/// The channel carries aggregated snapshots; the server may also push a
/// final `{"error": ...}` frame right before closing the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEvent {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub snapshot: GlobalMetrics,
}

/// Metrics recorded for a single client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMetrics {
    pub client_id: String,
    pub metrics: Vec<NetworkMetrics>,
}

/// Recent metrics across all clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsHistory {
    pub metrics: Vec<NetworkMetrics>,
    pub timespan: u64,
}
