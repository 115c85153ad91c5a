use serde::{Deserialize, Serialize};

/// Response of the health probe endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Response of client registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub client_id: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub algorithm: Option<String>,
}

/// Response of client teardown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub success: bool,
    pub client_id: String,
}

/// Server-wide status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub server_time: String,
    pub uptime: f64,
    pub active_clients: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_response_parses_server_payload() {
        let json = r#"{
            "client_id": "abc123",
            "status": "connected",
            "timestamp": "2025-01-01T00:00:00",
            "algorithm": "reno"
        }"#;
        let resp: ConnectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.client_id, "abc123");
        assert_eq!(resp.algorithm.as_deref(), Some("reno"));
    }

    #[test]
    fn health_response_tolerates_extra_fields() {
        let json = r#"{
            "status": "healthy",
            "timestamp": "2025-01-01T00:00:00",
            "version": "1.0.0",
            "components": {"connection_manager": true},
            "endpoints": {"files": "/api/files"}
        }"#;
        let resp: HealthResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_healthy());
    }
}
