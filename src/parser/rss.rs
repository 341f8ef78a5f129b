use std::sync::LazyLock;

use chrono::Utc;
use feed_rs::parser;
use html_escape::decode_html_entities;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::app::ParseError;
use crate::domain::ParsedItem;
use crate::parser::FeedParser;

pub const SUMMARY_MAX_CHARS: usize = 300;
pub const UNTITLED: &str = "(untitled)";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// RSS 0.9x/1.0/2.0, Atom and JSON Feed parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct RssParser;

impl RssParser {
    pub fn new() -> Self {
        Self
    }
}

impl FeedParser for RssParser {
    fn parse(&self, raw: &[u8]) -> Result<Vec<ParsedItem>, ParseError> {
        if !is_json(raw) {
            check_well_formed(raw)?;
        }
        let feed = parser::parse(raw).map_err(|e| ParseError::MalformedFeed(e.to_string()))?;

        let items = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let link = entry
                    .links
                    .first()
                    .map(|l| l.href.trim().to_string())
                    .filter(|href| !href.is_empty())
                    .or_else(|| {
                        // Some feeds only carry a permalink guid
                        let id = entry.id.trim();
                        (id.starts_with("http://") || id.starts_with("https://"))
                            .then(|| id.to_string())
                    })?;

                let title = entry
                    .title
                    .map(|t| collapse_whitespace(&decode_html_entities(&t.content)))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| UNTITLED.to_string());

                let raw_summary = entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body))
                    .unwrap_or_default();

                Some(ParsedItem {
                    title,
                    link,
                    published_at: entry
                        .published
                        .or(entry.updated)
                        .map(|dt| dt.with_timezone(&Utc)),
                    summary: clean_summary(&raw_summary, SUMMARY_MAX_CHARS),
                })
            })
            .collect();

        Ok(items)
    }
}

/// Strip markup, decode entities, collapse whitespace and cap the length.
pub fn clean_summary(html: &str, max_chars: usize) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    let text = collapse_whitespace(&decode_html_entities(&without_tags));

    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}…", truncated.trim_end())
    } else {
        text
    }
}

/// Reject XML that isn't well-formed.
///
/// feed-rs stops at the first broken element and returns the entries it has
/// seen so far, so a source must pass this check before it is parsed.
fn check_well_formed(raw: &[u8]) -> Result<(), ParseError> {
    let mut reader = Reader::from_reader(raw);
    reader.config_mut().check_end_names = true;

    let mut buf = Vec::new();
    let mut open = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => open += 1,
            Ok(Event::End(_)) => open = open.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::MalformedFeed(format!(
                    "invalid XML near byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
        buf.clear();
    }

    if open > 0 {
        return Err(ParseError::MalformedFeed(format!(
            "document ended with {open} unclosed element(s)"
        )));
    }
    Ok(())
}

fn is_json(raw: &[u8]) -> bool {
    raw.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
