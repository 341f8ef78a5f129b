//! Turning fetched bytes into [`ParsedItem`]s.
//!
//! Parsing is all-or-nothing per source: a body that can't be parsed yields a
//! [`ParseError`], never a truncated list.

pub mod rss;
pub mod scraper;

pub use rss::RssParser;
pub use scraper::ScraperRegistry;

use crate::app::ParseError;
use crate::domain::ParsedItem;

/// Parse capability shared by RSS sources and scraper extensions.
pub trait FeedParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<Vec<ParsedItem>, ParseError>;
}
