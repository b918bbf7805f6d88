//! Bibliographic search clients.
//!
//! Each catalog gets its own client that normalizes results into [`Paper`]
//! records. All clients retry transient failures with exponential backoff and
//! pace their requests so a multi-query run stays inside API rate limits.

pub mod openalex;
pub mod pubmed;
pub mod scholar;

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

/// Shared filter set accepted by every search client. Clients ignore filters
/// their catalog cannot express.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub min_citations: Option<u32>,
    pub open_access: bool,
    /// Maximum results per query. Clients clamp this to their API's page cap.
    pub limit: usize,
}

impl SearchFilters {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// Retry an async operation up to `max_retries` times with exponential
/// backoff, starting at 2s and capped at 10s.
pub(crate) async fn with_retry<T, F, Fut>(max_retries: u32, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = Duration::from_secs(2);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_retries.max(1) {
                    return Err(err);
                }
                warn!(
                    source = label,
                    attempt,
                    error = %err,
                    "request failed, retrying after {:?}", delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(10));
            }
        }
    }
}

/// Inter-request pause, so batch searches stay polite to free APIs.
pub(crate) async fn pace(delay_ms: u64) {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}
