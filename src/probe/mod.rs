//! HTTP prober: one bounded GET per endpoint, normalized into a `CheckRecord`

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::history::CheckRecord;

/// Default hard timeout for a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Issues health-check requests against a base URL
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Prober {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `base_url + endpoint`. Every failure mode is encoded in the
    /// returned record.
    pub async fn check(&self, endpoint: &str) -> CheckRecord {
        let url = format!("{}{}", self.base_url, endpoint);
        let timestamp = Utc::now();
        let start = Instant::now();

        let result = self.client.get(&url).timeout(self.timeout).send().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let record = match result {
            Ok(response) => {
                let status = response.status();
                let success = status.is_success();
                CheckRecord {
                    timestamp,
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                    elapsed_ms,
                    success,
                    error: (!success).then(|| {
                        format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        )
                    }),
                }
            }
            Err(e) => CheckRecord {
                timestamp,
                endpoint: endpoint.to_string(),
                status: 0,
                elapsed_ms,
                success: false,
                error: Some(self.describe_error(&e)),
            },
        };

        if record.success {
            tracing::debug!(
                endpoint = %record.endpoint,
                status = record.status,
                elapsed_ms = record.elapsed_ms,
                "Probe succeeded"
            );
        } else {
            tracing::warn!(
                endpoint = %record.endpoint,
                status = record.status,
                elapsed_ms = record.elapsed_ms,
                error = record.error.as_deref().unwrap_or_default(),
                "Probe failed"
            );
        }

        record
    }

    fn describe_error(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            format!("Timeout after {}ms", self.timeout.as_millis())
        } else if error.is_connect() {
            format!("Connection failed: {}", error)
        } else {
            format!("Request failed: {}", error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_success_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = Prober::new(server.uri());
        let record = prober.check("/api/stats").await;

        assert!(record.success);
        assert_eq!(record.status, 200);
        assert_eq!(record.endpoint, "/api/stats");
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn test_non_2xx_is_failure_with_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let record = Prober::new(server.uri()).check("/api/bounties").await;

        assert!(!record.success);
        assert_eq!(record.status, 500);
        assert_eq!(record.error.as_deref(), Some("HTTP 500: Internal Server Error"));
    }

    #[tokio::test]
    async fn test_timeout_is_failure_with_status_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let prober = Prober::new(server.uri()).with_timeout(Duration::from_millis(50));
        let record = prober.check("/slow").await;

        assert!(!record.success);
        assert_eq!(record.status, 0);
        assert_eq!(record.error.as_deref(), Some("Timeout after 50ms"));
        assert!(record.elapsed_ms >= 50);
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        // nothing listens on port 9 locally
        let record = Prober::new("http://127.0.0.1:9").check("/api/stats").await;

        assert!(!record.success);
        assert_eq!(record.status, 0);
        assert!(record.error.is_some());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let prober = Prober::new("http://localhost:3000/");
        assert_eq!(prober.base_url(), "http://localhost:3000");
    }
}
