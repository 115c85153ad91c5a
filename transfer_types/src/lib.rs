//! Wire types for the transfer server's REST and SSE endpoints.
//!
//! Field names match the server's JSON exactly; unknown fields are
//! ignored so the server can grow its payloads without breaking clients.

mod connection;
mod files;
mod metrics;
mod transfer;

pub use connection::{ConnectResponse, DisconnectResponse, HealthResponse, ServerStatus};
pub use files::{FileEntry, FileListing};
pub use metrics::{ClientMetrics, GlobalMetrics, MetricsEvent, MetricsHistory, NetworkMetrics};
pub use transfer::{CancelResponse, DownloadSessionInfo, TransferProgress};
