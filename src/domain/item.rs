use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Source;

/// An entry as produced by a parser, before it is attributed to a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
}

impl ParsedItem {
    /// Case-insensitive keyword match against title and summary.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&keyword)
            || self.summary.to_lowercase().contains(&keyword)
    }

    pub fn into_item(self, source: &Source, fetched_at: DateTime<Utc>) -> Item {
        Item {
            source_name: source.name.clone(),
            title: self.title,
            link: self.link,
            published_at: self.published_at,
            summary: self.summary,
            tag: source.tag.clone(),
            fetched_at,
        }
    }
}

/// A stored advisory/news entry. `link` is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub source_name: String,
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub tag: String,
    pub fetched_at: DateTime<Utc>,
}

impl Item {
    /// True when every content field matches; `fetched_at` is ignored.
    pub fn same_content(&self, other: &Item) -> bool {
        self.link == other.link
            && self.title == other.title
            && self.summary == other.summary
            && self.published_at == other.published_at
            && self.source_name == other.source_name
            && self.tag == other.tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parsed(title: &str, summary: &str) -> ParsedItem {
        ParsedItem {
            title: title.into(),
            link: "https://example.com/a".into(),
            published_at: None,
            summary: summary.into(),
        }
    }

    #[test]
    fn test_into_item_inherits_source_fields() {
        let source = Source::rss("KISA", "KR", "https://example.com/rss");
        let fetched_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let item = parsed("Title", "Body").into_item(&source, fetched_at);

        assert_eq!(item.source_name, "KISA");
        assert_eq!(item.tag, "KR");
        assert_eq!(item.fetched_at, fetched_at);
        assert_eq!(item.link, "https://example.com/a");
    }

    #[test]
    fn test_keyword_matches_title_or_summary() {
        let item = parsed("Critical Ransomware campaign", "details");
        assert!(item.matches_keyword("ransomware"));
        assert!(item.matches_keyword("DETAILS"));
        assert!(!item.matches_keyword("phishing"));
        assert!(item.matches_keyword("  "));
    }

    #[test]
    fn test_same_content_ignores_fetched_at() {
        let source = Source::rss("A", "EN", "https://example.com/rss");
        let a = parsed("T", "S").into_item(&source, Utc::now());
        let mut b = a.clone();
        b.fetched_at = a.fetched_at + chrono::Duration::hours(1);
        assert!(a.same_content(&b));

        b.title = "Other".into();
        assert!(!a.same_content(&b));
    }
}
