use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::parser::FeedParser;

/// Scraper extensions, looked up by the `scraper_module` identifier of a source.
///
/// Registration happens before the source registry is loaded; an identifier
/// that isn't registered makes the load fail.
#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn FeedParser>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, scraper: Arc<dyn FeedParser>) -> &mut Self {
        self.scrapers.insert(id.into(), scraper);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn FeedParser>> {
        self.scrapers.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.scrapers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for ScraperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
