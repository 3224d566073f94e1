use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::error::IngressError;
use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::parser::parse_etd;
use crate::services::etd_api::EtdSource;
use crate::station::FetchBatch;

pub const BART_API_URL: &str = "https://api.bart.gov/api/etd.aspx";

/// Client for the BART real-time ETD endpoint.
///
/// The registration key is attached by [`UrlParam`] so it never appears in
/// the URL this client logs.
pub struct BartClient<C = BasicClient> {
    http: UrlParam<C>,
    url: Url,
    dest: String,
}

impl BartClient {
    pub fn new(api_key: &str, orig: &str, dest: &str) -> Result<Self, IngressError> {
        let http = BasicClient::new()
            .map_err(|e| IngressError::Config(format!("failed to build HTTP client: {e}")))?;
        Self::with_client(http, BART_API_URL, api_key, orig, dest)
    }
}

impl<C: HttpClient> BartClient<C> {
    pub fn with_client(
        inner: C,
        base_url: &str,
        api_key: &str,
        orig: &str,
        dest: &str,
    ) -> Result<Self, IngressError> {
        let url = Url::parse_with_params(base_url, &[("cmd", "etd"), ("orig", orig), ("json", "y")])
            .map_err(|e| IngressError::Config(format!("invalid BART API URL '{base_url}': {e}")))?;

        Ok(Self {
            http: UrlParam::new(inner, "key", api_key),
            url,
            dest: dest.to_string(),
        })
    }
}

#[async_trait]
impl<C: HttpClient> EtdSource for BartClient<C> {
    #[tracing::instrument(skip(self), fields(url = %self.url, dest = %self.dest))]
    async fn fetch_estimates(&self) -> Result<FetchBatch, IngressError> {
        let bytes = fetch_bytes(&self.http, self.url.as_str()).await?;
        debug!(bytes = bytes.len(), "ETD response received, parsing");

        let batch = parse_etd(&bytes, &self.dest)?;
        debug!(streams = batch.len(), "ETD response parsed");
        Ok(batch)
    }
}
