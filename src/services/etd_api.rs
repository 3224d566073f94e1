//! Trait for sources of real-time departure estimates.

use async_trait::async_trait;

use crate::error::IngressError;
use crate::station::FetchBatch;

/// Abstraction over a departure-estimate provider (e.g., the BART ETD API).
///
/// One call is one request: implementors do not retry, the scheduler simply
/// tries again on its next tick.
#[async_trait]
pub trait EtdSource: Send + Sync {
    /// Returns the current nearest estimates keyed by stream id.
    async fn fetch_estimates(&self) -> Result<FetchBatch, IngressError>;
}
