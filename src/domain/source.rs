use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Scraper,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" => Ok(SourceKind::Rss),
            "scraper" => Ok(SourceKind::Scraper),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Rss => f.write_str("rss"),
            SourceKind::Scraper => f.write_str("scraper"),
        }
    }
}

/// A configured feed. Validated by the registry; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scraper_module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_keyword: Option<String>,
}

impl Source {
    pub fn rss(name: &str, tag: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            tag: tag.to_string(),
            kind: SourceKind::Rss,
            url: url.to_string(),
            scraper_module: None,
            filter_keyword: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str_is_case_insensitive() {
        assert_eq!("RSS".parse::<SourceKind>(), Ok(SourceKind::Rss));
        assert_eq!(" scraper ".parse::<SourceKind>(), Ok(SourceKind::Scraper));
        assert_eq!("atom".parse::<SourceKind>(), Err("atom".to_string()));
    }

    #[test]
    fn test_source_serializes_type_field() {
        let source = Source::rss("KISA", "KR", "https://example.com/rss");
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "rss");
        assert!(json.get("scraper_module").is_none());
    }
}
