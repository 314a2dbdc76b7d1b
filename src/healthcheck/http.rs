use super::HealthChecker;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// Global shared HTTP client for readiness checks and step requests.
///
/// Installs are served behind a reverse proxy with a self-signed
/// certificate on `https://localhost`, so certificate validation is off.
/// Individual requests set their own timeout.
static SHARED_HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get or create the shared HTTP client.
pub fn shared_client() -> Result<&'static Client> {
    if let Some(client) = SHARED_HTTP_CLIENT.get() {
        return Ok(client);
    }
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
    Ok(SHARED_HTTP_CLIENT.get_or_init(|| client))
}

/// Validate that a URL is well-formed and uses HTTP/HTTPS scheme.
pub fn validate_url(url: &str) -> Result<()> {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(Error::Config(format!(
                    "Invalid URL '{}': scheme must be http or https, got '{}'",
                    url, scheme
                )));
            }
            Ok(())
        }
        Err(e) => Err(Error::Config(format!("Invalid URL '{}': {}", url, e))),
    }
}

/// HTTP-based readiness checker: ready when `GET url` returns 2xx.
pub struct HttpChecker {
    url: String,
    client: Client,
    timeout: Duration,
}

impl HttpChecker {
    /// # Errors
    ///
    /// Returns error if URL is malformed or uses unsupported scheme.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        validate_url(&url)?;

        Ok(Self {
            url,
            client: shared_client()?.clone(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthChecker for HttpChecker {
    async fn check(&self) -> Result<bool> {
        // Per-request timeout overrides the shared client's long default.
        match self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::trace!("GET {} failed: {}", self.url, e);
                Ok(false)
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_checker_unreachable_port() {
        let checker = HttpChecker::new(
            "http://localhost:59999/health".to_string(),
            Duration::from_secs(1),
        )
        .expect("Should create HTTP checker");

        let result = checker.check().await.unwrap();
        assert!(!result);
    }

    #[test]
    fn test_shared_client_is_reused() {
        let a = shared_client().unwrap() as *const Client;
        let b = shared_client().unwrap() as *const Client;
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(HttpChecker::new("not-a-url".to_string(), Duration::from_secs(1)).is_err());
        assert!(
            HttpChecker::new("ftp://localhost/health".to_string(), Duration::from_secs(1)).is_err()
        );
        assert!(
            HttpChecker::new("http://localhost/health".to_string(), Duration::from_secs(1)).is_ok()
        );
        assert!(HttpChecker::new(
            "https://localhost/history/history/ping".to_string(),
            Duration::from_secs(1)
        )
        .is_ok());
    }
}
