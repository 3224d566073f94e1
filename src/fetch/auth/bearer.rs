use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Tokens are renewed this long before the identity server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct Discovery {
    token_endpoint: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    access_token: String,
    renew_at: Instant,
}

/// An [`HttpClient`] wrapper that authenticates with an OAuth2
/// client-credentials bearer token.
///
/// The token endpoint is discovered from
/// `{resource}/identity/.well-known/openid-configuration` on first use; the
/// token is cached and only exchanged again once it is close to expiring.
pub struct ClientCredentials<C> {
    inner: C,
    resource: Url,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl<C: HttpClient> ClientCredentials<C> {
    pub fn new(inner: C, resource: Url, client_id: &str, client_secret: &str) -> Self {
        Self {
            inner,
            resource,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> reqwest::Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.renew_at {
                return Ok(token.access_token.clone());
            }
        }

        let token_endpoint = self.discover_token_endpoint().await?;
        let token = self.exchange(&token_endpoint).await?;
        debug!(expires_in = token.expires_in, "Obtained bearer token");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            renew_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn discover_token_endpoint(&self) -> reqwest::Result<Url> {
        let mut url = self.resource.clone();
        url.set_path(&format!(
            "{}/identity/.well-known/openid-configuration",
            self.resource.path().trim_end_matches('/')
        ));

        let discovery: Discovery = self
            .inner
            .execute(Request::new(Method::GET, url))
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Url::parse(&discovery.token_endpoint).unwrap_or_else(|e| {
            let mut fallback = self.resource.clone();
            fallback.set_path("/identity/connect/token");
            warn!(
                token_endpoint = %discovery.token_endpoint,
                fallback = %fallback,
                error = %e,
                "Discovery returned an unusable token endpoint, using the default location"
            );
            fallback
        }))
    }

    async fn exchange(&self, token_endpoint: &Url) -> reqwest::Result<TokenResponse> {
        // application/x-www-form-urlencoded is the query string encoding.
        let mut form = token_endpoint.clone();
        form.set_query(None);
        form.query_pairs_mut()
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret);
        let body = form.query().unwrap_or_default().to_string();

        let mut req = Request::new(Method::POST, token_endpoint.clone());
        req.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        *req.body_mut() = Some(body.into());

        self.inner
            .execute(req)
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ClientCredentials<C> {
    async fn execute(&self, mut req: Request) -> reqwest::Result<reqwest::Response> {
        let token = self.access_token().await?;
        if let Ok(mut value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            value.set_sensitive(true);
            req.headers_mut().insert(AUTHORIZATION, value);
        }
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays the identity server and records the authorization of OMF posts.
    #[derive(Default)]
    struct FakeIdentity {
        token_requests: AtomicUsize,
        relative_token_endpoint: bool,
        last_auth: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl HttpClient for FakeIdentity {
        async fn execute(&self, req: Request) -> reqwest::Result<reqwest::Response> {
            let path = req.url().path().to_string();
            let body = if path.ends_with("openid-configuration") {
                if self.relative_token_endpoint {
                    r#"{"token_endpoint":"/connect/token"}"#.to_string()
                } else {
                    r#"{"token_endpoint":"https://cloud.example.com/identity/connect/token"}"#
                        .to_string()
                }
            } else if path == "/identity/connect/token" {
                let n = self.token_requests.fetch_add(1, Ordering::SeqCst);
                format!(r#"{{"access_token":"token-{n}","expires_in":3600}}"#)
            } else {
                let auth = req
                    .headers()
                    .get(AUTHORIZATION)
                    .map(|v| v.to_str().unwrap().to_string());
                *self.last_auth.lock().unwrap() = auth;
                String::new()
            };
            Ok(http::Response::builder().status(200).body(body).unwrap().into())
        }
    }

    fn omf_request() -> Request {
        Request::new(
            Method::POST,
            "https://cloud.example.com/api/v1/tenants/t/namespaces/n/omf"
                .parse()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_token_is_attached_and_cached() {
        let identity = Arc::new(FakeIdentity::default());
        let client = ClientCredentials::new(
            identity.clone(),
            "https://cloud.example.com".parse().unwrap(),
            "id",
            "secret",
        );

        client.execute(omf_request()).await.unwrap();
        client.execute(omf_request()).await.unwrap();

        assert_eq!(identity.token_requests.load(Ordering::SeqCst), 1);
        assert_eq!(
            identity.last_auth.lock().unwrap().as_deref(),
            Some("Bearer token-0")
        );
    }

    #[tokio::test]
    async fn test_unusable_token_endpoint_falls_back_to_default() {
        let identity = Arc::new(FakeIdentity {
            relative_token_endpoint: true,
            ..Default::default()
        });
        let client = ClientCredentials::new(
            identity.clone(),
            "https://cloud.example.com".parse().unwrap(),
            "id",
            "secret",
        );

        client.execute(omf_request()).await.unwrap();

        assert_eq!(identity.token_requests.load(Ordering::SeqCst), 1);
        assert_eq!(
            identity.last_auth.lock().unwrap().as_deref(),
            Some("Bearer token-0")
        );
    }
}
