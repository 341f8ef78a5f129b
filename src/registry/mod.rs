//! The configured set of sources.
//!
//! Sources are validated once and paired with the parser that handles them,
//! so an unknown type or scraper identifier fails at load time rather than in
//! the middle of a refresh cycle.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use url::Url;

use crate::config::{ConfigError, SourceEntry};
use crate::domain::{Source, SourceKind};
use crate::parser::{FeedParser, RssParser, ScraperRegistry};

/// A source together with its resolved parser.
#[derive(Clone)]
pub struct RegisteredSource {
    pub source: Source,
    pub parser: Arc<dyn FeedParser>,
}

impl fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct SourceRegistry {
    sources: RwLock<Arc<Vec<RegisteredSource>>>,
    scrapers: ScraperRegistry,
}

impl SourceRegistry {
    pub fn load(entries: &[SourceEntry], scrapers: ScraperRegistry) -> Result<Self, ConfigError> {
        let sources = Self::build(entries, &scrapers)?;
        Ok(Self {
            sources: RwLock::new(Arc::new(sources)),
            scrapers,
        })
    }

    /// Sources in configuration order.
    pub fn list(&self) -> Vec<Source> {
        self.snapshot().iter().map(|r| r.source.clone()).collect()
    }

    /// The current set. Later reloads don't affect a snapshot already taken.
    pub fn snapshot(&self) -> Arc<Vec<RegisteredSource>> {
        self.sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole set. On error the previous set stays in place.
    pub fn reload(&self, entries: &[SourceEntry]) -> Result<(), ConfigError> {
        let sources = Arc::new(Self::build(entries, &self.scrapers)?);
        *self
            .sources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = sources;
        tracing::info!(sources = self.len(), "Source registry reloaded");
        Ok(())
    }

    fn build(
        entries: &[SourceEntry],
        scrapers: &ScraperRegistry,
    ) -> Result<Vec<RegisteredSource>, ConfigError> {
        let rss: Arc<dyn FeedParser> = Arc::new(RssParser::new());
        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let name = required(&entry.name, index, "name")?;
            let tag = required(&entry.tag, index, "tag")?;
            let kind_str = required(&entry.kind, index, "type")?;
            let url = required(&entry.url, index, "url")?;

            let kind: SourceKind = kind_str.parse().map_err(|kind| ConfigError::UnknownType {
                name: name.clone(),
                kind,
            })?;

            Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
                name: name.clone(),
                reason: e.to_string(),
            })?;

            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateSource { name });
            }

            let scraper_module = optional(&entry.scraper_module);
            let parser = match kind {
                SourceKind::Rss => rss.clone(),
                SourceKind::Scraper => {
                    let module = scraper_module
                        .as_deref()
                        .ok_or_else(|| ConfigError::MissingScraperModule { name: name.clone() })?;
                    scrapers
                        .get(module)
                        .ok_or_else(|| ConfigError::UnknownScraper {
                            name: name.clone(),
                            module: module.to_string(),
                        })?
                }
            };

            sources.push(RegisteredSource {
                source: Source {
                    name,
                    tag,
                    kind,
                    url,
                    scraper_module,
                    filter_keyword: optional(&entry.filter_keyword),
                },
                parser,
            });
        }

        Ok(sources)
    }
}

fn required(
    value: &Option<String>,
    index: usize,
    field: &'static str,
) -> Result<String, ConfigError> {
    optional(value).ok_or(ConfigError::MissingField { index, field })
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ParseError;
    use crate::domain::ParsedItem;

    struct NoopScraper;

    impl FeedParser for NoopScraper {
        fn parse(&self, _raw: &[u8]) -> Result<Vec<ParsedItem>, ParseError> {
            Ok(Vec::new())
        }
    }

    fn scraper_entry(name: &str, module: Option<&str>) -> SourceEntry {
        SourceEntry {
            name: Some(name.into()),
            tag: Some("KR".into()),
            kind: Some("scraper".into()),
            url: Some("https://example.com/board".into()),
            scraper_module: module.map(String::from),
            filter_keyword: None,
        }
    }

    #[test]
    fn test_load_preserves_order() {
        let entries = vec![
            SourceEntry::rss("B", "EN", "https://b.example.com/feed"),
            SourceEntry::rss("A", "KR", "https://a.example.com/feed"),
        ];
        let registry = SourceRegistry::load(&entries, ScraperRegistry::new()).unwrap();

        let names: Vec<_> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_missing_field_is_config_error() {
        let mut entry = SourceEntry::rss("A", "KR", "https://a.example.com/feed");
        entry.tag = None;
        let err = SourceRegistry::load(&[entry], ScraperRegistry::new()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                index: 0,
                field: "tag"
            }
        ));

        let mut blank = SourceEntry::rss("A", "KR", "https://a.example.com/feed");
        blank.url = Some("   ".into());
        let err = SourceRegistry::load(&[blank], ScraperRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "url", .. }));
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let mut entry = SourceEntry::rss("A", "KR", "https://a.example.com/feed");
        entry.kind = Some("atom".into());
        let err = SourceRegistry::load(&[entry], ScraperRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType { ref kind, .. } if kind == "atom"));
    }

    #[test]
    fn test_invalid_url_and_duplicates_rejected() {
        let bad_url = SourceEntry::rss("A", "KR", "not a url");
        assert!(matches!(
            SourceRegistry::load(&[bad_url], ScraperRegistry::new()),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let dup = vec![
            SourceEntry::rss("A", "KR", "https://a.example.com/feed"),
            SourceEntry::rss("A", "EN", "https://b.example.com/feed"),
        ];
        assert!(matches!(
            SourceRegistry::load(&dup, ScraperRegistry::new()),
            Err(ConfigError::DuplicateSource { .. })
        ));
    }

    #[test]
    fn test_scraper_module_resolved_at_load() {
        let mut scrapers = ScraperRegistry::new();
        scrapers.register("krcert", Arc::new(NoopScraper));

        let registry =
            SourceRegistry::load(&[scraper_entry("KrCERT", Some("krcert"))], scrapers.clone())
                .unwrap();
        assert_eq!(registry.list()[0].kind, SourceKind::Scraper);

        let err = SourceRegistry::load(&[scraper_entry("X", Some("nope"))], scrapers.clone())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScraper { ref module, .. } if module == "nope"));

        let err = SourceRegistry::load(&[scraper_entry("Y", None)], scrapers).unwrap_err();
        assert!(matches!(err, ConfigError::MissingScraperModule { .. }));
    }

    #[test]
    fn test_reload_is_all_or_nothing() {
        let registry = SourceRegistry::load(
            &[SourceEntry::rss("A", "KR", "https://a.example.com/feed")],
            ScraperRegistry::new(),
        )
        .unwrap();
        let before = registry.snapshot();

        let mut broken = SourceEntry::rss("C", "EN", "https://c.example.com/feed");
        broken.name = None;
        let result = registry.reload(&[
            SourceEntry::rss("B", "EN", "https://b.example.com/feed"),
            broken,
        ]);
        assert!(result.is_err());
        assert_eq!(registry.list()[0].name, "A");

        registry
            .reload(&[
                SourceEntry::rss("B", "EN", "https://b.example.com/feed"),
                SourceEntry::rss("C", "EN", "https://c.example.com/feed"),
            ])
            .unwrap();
        assert_eq!(registry.len(), 2);
        // Earlier snapshots are unaffected
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn test_blank_keyword_is_ignored() {
        let mut entry = SourceEntry::rss("A", "KR", "https://a.example.com/feed");
        entry.filter_keyword = Some("  ".into());
        let registry = SourceRegistry::load(&[entry], ScraperRegistry::new()).unwrap();
        assert_eq!(registry.list()[0].filter_keyword, None);
    }
}
