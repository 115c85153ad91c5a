use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Endpoint root used when no environment override is present.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/api";

pub const ENDPOINT_ENV_VAR: &str = "TRANSFER_CLIENT_ENDPOINT";
pub const RETRY_MAX_ATTEMPTS_ENV_VAR: &str = "TRANSFER_CLIENT_RETRY_MAX_ATTEMPTS";
pub const RETRY_BASE_DELAY_MS_ENV_VAR: &str = "TRANSFER_CLIENT_RETRY_BASE_DELAY_MS";

/// Retry behavior for wrapped requests. Immutable once a request is issued.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Retry at most this many times before permanently failing, so a
    /// request is attempted `max_retries + 1` times in total.
    pub max_retries: u32,
    /// Delay before the first retry; the n-th retry waits `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: env_parse(RETRY_MAX_ATTEMPTS_ENV_VAR, 3),
            base_delay: Duration::from_millis(env_parse(RETRY_BASE_DELAY_MS_ENV_VAR, 1000)),
        }
    }
}

/// Client configuration. Defaults come from environment variables where
/// noted, otherwise from the hard-coded local server values.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Endpoint root, e.g. `http://localhost:5000/api`.
    pub endpoint: String,
    pub retry: RetryConfig,
    /// Spacing of the connection supervisor's unbounded connect attempts.
    pub connect_retry_interval: Duration,
    /// Spacing of download-session progress polls.
    pub poll_interval: Duration,
    /// Delay before the metrics channel is re-opened after a failure.
    pub stream_retry_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: std::env::var(ENDPOINT_ENV_VAR).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            retry: RetryConfig::default(),
            connect_retry_interval: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
            stream_retry_interval: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

/// Parse an environment value, reverting to the default (with a warning)
/// when the variable is set but unparsable.
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!("ignoring unparsable value {raw:?} for {name}");
            default
        },
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn default_endpoint_is_local() {
        std::env::remove_var(ENDPOINT_ENV_VAR);
        assert_eq!(ClientConfig::default().endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    #[serial]
    fn endpoint_env_var_overrides_default() {
        std::env::set_var(ENDPOINT_ENV_VAR, "http://10.0.0.2:5000/api");
        assert_eq!(ClientConfig::default().endpoint, "http://10.0.0.2:5000/api");
        std::env::remove_var(ENDPOINT_ENV_VAR);
    }

    #[test]
    #[serial]
    fn unparsable_env_value_reverts_to_default() {
        std::env::set_var(RETRY_MAX_ATTEMPTS_ENV_VAR, "many");
        assert_eq!(RetryConfig::default().max_retries, 3);
        std::env::remove_var(RETRY_MAX_ATTEMPTS_ENV_VAR);
    }
}
