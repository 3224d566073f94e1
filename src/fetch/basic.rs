use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Plain `reqwest` client with the timeouts every outbound call uses.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> reqwest::Result<Self> {
        Self::builder().build().map(Self)
    }

    /// Client that accepts any server certificate. Only meant for test
    /// servers with self-signed certificates.
    pub fn insecure() -> reqwest::Result<Self> {
        warn!(
            "Certificate validation is disabled for this destination. \
             This should only be done for testing with a self-signed certificate as it is insecure."
        );
        Self::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map(Self)
    }

    fn builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
