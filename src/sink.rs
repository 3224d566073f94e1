//! OMF destinations: managed cloud, local edge and PI Web API.

use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Method, Request, Url};
use std::fmt;
use tracing::{debug, info};

use crate::error::{IngressError, SendError};
use crate::fetch::auth::{ClientCredentials, HeaderAuth};
use crate::fetch::{BasicClient, HttpClient};
use crate::omf::SerializedOmfMessage;

pub const DEFAULT_EDS_PORT: u16 = 5590;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// CONNECT data services, bearer token from client credentials.
    ManagedCloud,
    /// Edge Data Store on this host, no authentication.
    LocalEdge,
    /// PI Web API, HTTP Basic authentication.
    WebApi,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::ManagedCloud => "managed-cloud",
            SinkKind::LocalEdge => "local-edge",
            SinkKind::WebApi => "web-api",
        };
        f.write_str(name)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum SinkAuth {
    None,
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl fmt::Debug for SinkAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkAuth::None => f.write_str("None"),
            SinkAuth::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            SinkAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Everything needed to open one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Full OMF endpoint, e.g. `http://localhost:5590/api/v1/tenants/default/namespaces/default/omf`.
    pub base_address: String,
    pub auth: SinkAuth,
    pub validate_certificate: bool,
}

impl SinkConfig {
    pub fn managed_cloud(
        endpoint: &str,
        tenant_id: &str,
        namespace_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self {
            kind: SinkKind::ManagedCloud,
            base_address: format!(
                "{}/api/v1/tenants/{tenant_id}/namespaces/{namespace_id}/omf",
                endpoint.trim_end_matches('/')
            ),
            auth: SinkAuth::ClientCredentials {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            },
            validate_certificate: true,
        }
    }

    pub fn local_edge(port: u16) -> Self {
        Self {
            kind: SinkKind::LocalEdge,
            base_address: format!(
                "http://localhost:{port}/api/v1/tenants/default/namespaces/default/omf"
            ),
            auth: SinkAuth::None,
            validate_certificate: true,
        }
    }

    pub fn web_api(endpoint: &str, username: &str, password: &str, validate_certificate: bool) -> Self {
        Self {
            kind: SinkKind::WebApi,
            base_address: format!("{}/omf", endpoint.trim_end_matches('/')),
            auth: SinkAuth::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
            validate_certificate,
        }
    }
}

/// One live OMF destination.
///
/// The client is dropped on [`close`](OmfSink::close), which also drops any
/// cached bearer token.
pub struct OmfSink {
    kind: SinkKind,
    address: Url,
    extra_headers: Vec<(HeaderName, HeaderValue)>,
    client: Option<Box<dyn HttpClient>>,
}

impl fmt::Debug for OmfSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OmfSink")
            .field("kind", &self.kind)
            .field("address", &self.address.as_str())
            .field("open", &self.client.is_some())
            .finish()
    }
}

impl OmfSink {
    /// Opens a destination with the real HTTP stack for its kind.
    ///
    /// # Errors
    ///
    /// [`IngressError::Config`] if the base address is not an absolute URL or
    /// the credentials cannot be encoded as a header.
    pub fn connect(config: &SinkConfig) -> Result<Self, IngressError> {
        let address = parse_address(&config.base_address)?;

        let base = if config.validate_certificate {
            BasicClient::new()
        } else {
            BasicClient::insecure()
        }
        .map_err(|e| IngressError::Config(format!("failed to build HTTP client: {e}")))?;

        let client: Box<dyn HttpClient> = match &config.auth {
            SinkAuth::None => Box::new(base),
            SinkAuth::Basic { username, password } => {
                Box::new(HeaderAuth::basic(base, username, password)?)
            }
            SinkAuth::ClientCredentials {
                client_id,
                client_secret,
            } => {
                let mut resource = address.clone();
                resource.set_path("/");
                resource.set_query(None);
                Box::new(ClientCredentials::new(base, resource, client_id, client_secret))
            }
        };

        Self::with_client(config.kind, &config.base_address, client)
    }

    /// Opens a destination over a caller-supplied client.
    pub fn with_client(
        kind: SinkKind,
        base_address: &str,
        client: Box<dyn HttpClient>,
    ) -> Result<Self, IngressError> {
        let address = parse_address(base_address)?;

        let mut extra_headers = Vec::new();
        if kind == SinkKind::WebApi {
            // PI Web API rejects OMF posts without this header.
            extra_headers.push((
                HeaderName::from_static("x-requested-with"),
                HeaderValue::from_static("XMLHttpRequest"),
            ));
        }

        info!(%kind, address = %address, "OMF destination configured");
        Ok(Self {
            kind,
            address,
            extra_headers,
            client: Some(client),
        })
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn address(&self) -> &str {
        self.address.as_str()
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// POSTs `message` and returns the response body on success.
    ///
    /// # Errors
    ///
    /// [`SendError`] carrying this sink's address, plus the status and body
    /// when the endpoint answered with a non-success code.
    pub async fn send(&self, message: &SerializedOmfMessage) -> Result<String, SendError> {
        let client = self.client.as_ref().ok_or_else(|| self.error(None, "sink is closed"))?;

        let mut req = Request::new(Method::POST, self.address.clone());
        let headers = req.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &message.headers {
            let value = HeaderValue::from_str(value)
                .map_err(|e| self.error(None, &format!("invalid header '{name}': {e}")))?;
            headers.insert(HeaderName::from_static(*name), value);
        }
        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        *req.body_mut() = Some(message.body.clone().into());

        let response = client
            .execute(req)
            .await
            .map_err(|e| self.error(None, &e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(self.error(Some(status), &body));
        }

        debug!(
            kind = %self.kind,
            status = status.as_u16(),
            messagetype = message.message_type.as_str(),
            action = message.action.as_str(),
            "OMF message accepted"
        );
        Ok(body)
    }

    /// Releases the HTTP client. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!(kind = %self.kind, address = %self.address, "OMF destination closed");
        }
    }

    fn error(&self, status: Option<reqwest::StatusCode>, body: &str) -> SendError {
        SendError {
            address: self.address.to_string(),
            status,
            body: body.to_string(),
        }
    }
}

fn parse_address(base_address: &str) -> Result<Url, IngressError> {
    let url = Url::parse(base_address)
        .map_err(|e| IngressError::Config(format!("invalid OMF endpoint '{base_address}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(IngressError::Config(format!(
            "OMF endpoint '{base_address}' has unsupported scheme '{other}'"
        ))),
    }
}
