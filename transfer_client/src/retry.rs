use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Result, TransferError};

fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Delay before the n-th retry (1-based).
///
/// The schedule is linear (1x, 2x, 3x the base delay), not exponential.
/// Keep it that way: the spacing is observable behavior.
pub(crate) fn backoff_delay(config: &RetryConfig, retry: u32) -> Duration {
    config.base_delay * retry
}

/// Executes a request-generating closure with bounded retries.
///
/// Transport failures (no response received) back off linearly and consume
/// one retry slot each; once `max_retries` slots are spent the last error is
/// surfaced. An unauthorized response invokes `reauthenticate` to refresh the
/// session identity and retries, also consuming a slot. Any other non-success
/// response fails immediately with [`TransferError::Request`].
///
/// A single call may therefore trigger a full reconnect sequence as a side
/// effect; callers must tolerate that latency.
pub(crate) async fn execute_with_retry<F, Fut, R, RFut>(
    create_request: F,
    config: &RetryConfig,
    reauthenticate: R,
) -> Result<Response>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<Response, reqwest::Error>>,
    R: Fn() -> RFut,
    RFut: Future<Output = Result<()>>,
{
    // Retry slots consumed so far.
    let mut spent = 0u32;

    loop {
        match create_request().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                if is_auth_failure(status) && spent < config.max_retries {
                    spent += 1;
                    warn!("request unauthorized ({status}), refreshing session before retry {spent}");
                    reauthenticate().await?;
                    continue;
                }
                return Err(TransferError::Request { status });
            },
            Err(e) => {
                if spent >= config.max_retries {
                    warn!("request failed after {} attempts: {e}", spent + 1);
                    return Err(e.into());
                }
                spent += 1;
                let delay = backoff_delay(config, spent);
                debug!("transport failure ({e}), retry {spent}/{} in {delay:?}", config.max_retries);
                tokio::time::sleep(delay).await;
            },
        }
    }
}
