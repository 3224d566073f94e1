//! HTTP plumbing shared by the BART source and the OMF sinks.

mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use crate::error::IngressError;

/// GETs `url` through `client` and returns the body of a successful response.
///
/// # Errors
///
/// [`IngressError::Fetch`] on transport failure or a non-success status.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Vec<u8>, IngressError> {
    let url = url
        .parse()
        .map_err(|e| IngressError::Config(format!("invalid URL '{url}': {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| IngressError::Fetch(format!("request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(IngressError::Fetch(format!(
            "API returned status {status}: {body}"
        )));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| IngressError::Fetch(format!("failed to read body: {e}")))?;
    Ok(bytes.to_vec())
}
