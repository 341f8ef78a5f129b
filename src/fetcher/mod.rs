pub mod http_fetcher;

use async_trait::async_trait;

use crate::app::FetchError;
use crate::domain::Source;

pub use http_fetcher::HttpFetcher;

/// Retrieves the raw body of one source. Implementations must not retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &Source) -> Result<Vec<u8>, FetchError>;
}
