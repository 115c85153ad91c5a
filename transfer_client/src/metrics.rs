use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use reqwest::Response;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use transfer_types::{ClientMetrics, GlobalMetrics, MetricsEvent, MetricsHistory};

use crate::connection::ConnectionManager;
use crate::error::{Result, TransferError};

pub type MetricsCallback = Arc<dyn Fn(MetricsEvent) + Send + Sync>;

/// Subscriber for the server-push metrics channel, plus the one-shot
/// metrics queries.
///
/// A subscriber holds at most one open channel. After a channel failure a
/// supervisor task re-opens it at a fixed interval until `unsubscribe` is
/// called; the failure itself is never surfaced.
#[derive(Clone)]
pub struct MetricsStream {
    manager: ConnectionManager,
    // Teardown token of the currently open channel, if any.
    channel: Arc<Mutex<Option<CancellationToken>>>,
}

impl MetricsStream {
    pub(crate) fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            channel: Arc::new(Mutex::new(None)),
        }
    }

    /// Opens the metrics channel scoped to the current client id and
    /// dispatches each decoded event to `callback`.
    ///
    /// Fails with [`TransferError::NotConnected`] without an established
    /// client id, or with [`TransferError::Stream`] if the initial open
    /// fails. Once open, channel failures self-heal.
    pub async fn subscribe(&self, callback: MetricsCallback) -> Result<MetricsSubscription> {
        let client_id = self.manager.client_id().ok_or(TransferError::NotConnected)?;

        // Single-channel invariant: close whatever we already hold.
        self.close_channel();

        let token = CancellationToken::new();
        {
            *self.channel.lock()? = Some(token.clone());
        }
        // Disconnect closes the channel through the manager.
        self.manager.register_stream_guard(token.clone());

        let first = match self.open_channel(&client_id).await {
            Ok(r) => r,
            Err(e) => {
                // Failed subscribe leaves no guard behind.
                self.close_channel();
                self.manager.close_stream_channel();
                return Err(e);
            },
        };
        debug!("metrics channel open for client {client_id}");

        let stream = self.clone();
        let loop_token = token.clone();
        tokio::spawn(async move {
            stream.run_channel(first, client_id, callback, loop_token).await;
        });

        Ok(MetricsSubscription { token })
    }

    pub async fn global(&self) -> Result<GlobalMetrics> {
        let url = self.manager.url("metrics/global")?;
        let response = self.manager.send_with_retry(|http| http.get(url.clone())).await?;
        Ok(response.json().await?)
    }

    pub async fn for_client(&self, client_id: &str) -> Result<ClientMetrics> {
        let url = self.manager.url(&format!("metrics/client/{client_id}"))?;
        let response = self.manager.send_with_retry(|http| http.get(url.clone())).await?;
        Ok(response.json().await?)
    }

    pub async fn history(&self, seconds: u64) -> Result<MetricsHistory> {
        let url = self.manager.url("metrics/history")?;
        let response = self
            .manager
            .send_with_retry(|http| http.get(url.clone()).query(&[("seconds", seconds.to_string())]))
            .await?;
        Ok(response.json().await?)
    }

    fn close_channel(&self) {
        if let Ok(mut channel) = self.channel.lock() {
            if let Some(token) = channel.take() {
                token.cancel();
            }
        }
    }

    async fn open_channel(&self, client_id: &str) -> Result<Response> {
        let url = self.manager.url("metrics/stream")?;
        let response = self
            .manager
            .http()
            .get(url)
            .query(&[("client_id", client_id)])
            .send()
            .await
            .map_err(|e| TransferError::Stream(format!("channel open failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Stream(format!("channel open failed with status {status}")));
        }
        Ok(response)
    }

    /// Channel supervisor: reads events until the channel fails, then
    /// re-opens it after a fixed delay. The stop token is checked before
    /// every resubscription attempt, so teardown is deterministic.
    async fn run_channel(
        self,
        first: Response,
        client_id: String,
        callback: MetricsCallback,
        token: CancellationToken,
    ) {
        let retry_interval = self.manager.config().stream_retry_interval;
        let mut open = Some(first);

        loop {
            if token.is_cancelled() {
                break;
            }

            let response = match open.take() {
                Some(r) => r,
                None => match self.open_channel(&client_id).await {
                    Ok(r) => {
                        debug!("metrics channel reopened");
                        r
                    },
                    Err(e) => {
                        warn!("metrics resubscribe failed: {e}");
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(retry_interval) => {},
                        }
                        continue;
                    },
                },
            };

            read_events(response, &callback, &token).await;

            if token.is_cancelled() {
                break;
            }
            warn!("metrics channel lost, resubscribing in {retry_interval:?}");
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(retry_interval) => {},
            }
        }
        debug!("metrics channel closed");
    }
}

/// Reads SSE frames off the channel until it errors, ends, or is cancelled.
/// Malformed events are logged and dropped; they never terminate the
/// channel.
async fn read_events(response: Response, callback: &MetricsCallback, token: &CancellationToken) {
    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();

    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => return,
            next = stream.next() => match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    warn!("metrics channel read error: {e}");
                    return;
                },
                // Server closed the channel.
                None => return,
            },
        };

        buf.extend_from_slice(&chunk);
        while let Some(frame) = next_frame(&mut buf) {
            let Some(data) = event_data(&frame) else {
                continue;
            };
            match serde_json::from_str::<MetricsEvent>(&data) {
                Ok(event) => callback(event),
                Err(e) => warn!("dropping malformed metrics event: {e}"),
            }
        }
    }
}

/// Splits one complete SSE frame (terminated by a blank line) off the
/// front of the buffer.
fn next_frame(buf: &mut Vec<u8>) -> Option<String> {
    let end = buf.windows(2).position(|w| w == b"\n\n")?;
    let frame: Vec<u8> = buf.drain(..end + 2).collect();
    Some(String::from_utf8_lossy(&frame).into_owned())
}

/// Joins the `data:` lines of an SSE frame into the event payload.
fn event_data(frame: &str) -> Option<String> {
    let mut lines = Vec::new();
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Handle returned by `subscribe`; closes the channel and stops the
/// resubscribe supervisor.
#[derive(Debug)]
pub struct MetricsSubscription {
    token: CancellationToken,
}

impl MetricsSubscription {
    pub fn unsubscribe(self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}
