use crate::error::IngressError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that sets one fixed header on every request.
///
/// Header name and value are validated once, at construction, so a bad
/// credential surfaces as a configuration error instead of a failed send.
pub struct HeaderAuth<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> HeaderAuth<C> {
    pub fn new(inner: C, header_name: &str, value: &str) -> Result<Self, IngressError> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|e| IngressError::Config(format!("invalid header name '{header_name}': {e}")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| IngressError::Config(format!("invalid value for header '{header_name}': {e}")))?;
        value.set_sensitive(header_name == AUTHORIZATION);
        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// `Authorization: Basic base64(username:password)`.
    pub fn basic(inner: C, username: &str, password: &str) -> Result<Self, IngressError> {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        Self::new(inner, AUTHORIZATION.as_str(), &format!("Basic {encoded}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for HeaderAuth<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl HttpClient for Echo {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let auth = req
                .headers()
                .get(AUTHORIZATION)
                .map(|v| v.to_str().unwrap().to_string())
                .unwrap_or_default();
            Ok(http::Response::builder().status(200).body(auth).unwrap().into())
        }
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let client = HeaderAuth::basic(Echo, "user", "pass").unwrap();
        let req = reqwest::Request::new(reqwest::Method::GET, "http://localhost/".parse().unwrap());
        let resp = client.execute(req).await.unwrap();
        assert_eq!(resp.text().await.unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_invalid_header_value_is_config_error() {
        let result = HeaderAuth::new(Echo, "X-Test", "bad\nvalue");
        assert!(matches!(result, Err(IngressError::Config(_))));
    }
}
