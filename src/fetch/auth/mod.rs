//! [`HttpClient`](crate::fetch::HttpClient) decorators that attach credentials.

mod bearer;
mod header;
mod url_param;

pub use bearer::ClientCredentials;
pub use header::HeaderAuth;
pub use url_param::UrlParam;
