//! Resilient connectivity and transfer-session layer for the file
//! transfer server.
//!
//! This crate provides:
//! - [`ConnectionManager`]: session identity and lifecycle (connect,
//!   disconnect, health), plus an auto-connect supervisor.
//! - A retry wrapper with linear backoff and re-authentication awareness,
//!   applied to every wrapped request.
//! - [`DownloadTracker`]: server-side download sessions with polled
//!   progress, speed, and ETA.
//! - [`MetricsStream`]: a self-healing server-push metrics subscription.
//! - [`TransferClient`]: the top-level handle composing the above.
//!
//! UI concerns (rendering file lists, charts, progress bars) live with the
//! consumer; this crate only exposes snapshots and callbacks.

pub mod client;
pub mod config;
pub mod connection;
pub mod download;
pub mod error;
mod files;
pub mod metrics;
mod retry;

pub use client::{TrackedDownload, TransferClient};
pub use config::{ClientConfig, RetryConfig, DEFAULT_ENDPOINT, ENDPOINT_ENV_VAR};
pub use connection::{ConnectInfo, ConnectionManager, ConnectionSupervisor, SessionState};
pub use download::{DownloadState, DownloadStatus, DownloadTracker, ProgressCallback};
pub use error::{Result, TransferError};
pub use metrics::{MetricsCallback, MetricsStream, MetricsSubscription};
