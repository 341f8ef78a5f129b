use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rusqlite_migration::{Migrations, M};

use crate::app::StorageError;
use crate::domain::Item;
use crate::store::{clamp_limit, Store, UpsertOutcome};

const ITEM_COLUMNS: &str = "link, source_name, title, summary, published_at, tag, fetched_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        // WAL + FULL sync: a committed upsert survives a crash
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations.to_latest(&mut conn)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        // Fixed width so that text ordering matches time ordering; full
        // precision so that a re-fetched timestamp compares equal
        dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            link: row.get(0)?,
            source_name: row.get(1)?,
            title: row.get(2)?,
            summary: row.get(3)?,
            published_at: row
                .get::<_, Option<String>>(4)?
                .and_then(|s| Self::parse_datetime(&s)),
            tag: row.get(5)?,
            fetched_at: row
                .get::<_, String>(6)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }
}

impl Store for SqliteStore {
    fn upsert(&self, item: &Item) -> Result<UpsertOutcome, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE link = ?1"),
                params![item.link],
                Self::row_to_item,
            )
            .optional()?;

        let published_at = item.published_at.as_ref().map(Self::format_datetime);
        let fetched_at = Self::format_datetime(&item.fetched_at);

        let outcome = match existing {
            None => {
                tx.execute(
                    "INSERT INTO items (link, source_name, title, summary, published_at, tag, fetched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        item.link,
                        item.source_name,
                        item.title,
                        item.summary,
                        published_at,
                        item.tag,
                        fetched_at
                    ],
                )?;
                UpsertOutcome::Inserted
            }
            Some(stored) => {
                // An empty summary never erases one we already have
                let summary = if item.summary.is_empty() {
                    stored.summary.clone()
                } else {
                    item.summary.clone()
                };
                let incoming = Item {
                    summary,
                    ..item.clone()
                };

                if stored.same_content(&incoming) {
                    tx.execute(
                        "UPDATE items SET fetched_at = ?1 WHERE link = ?2",
                        params![fetched_at, item.link],
                    )?;
                    UpsertOutcome::UpdatedNoChange
                } else {
                    tx.execute(
                        "UPDATE items
                         SET source_name = ?1, title = ?2, summary = ?3, published_at = ?4,
                             tag = ?5, fetched_at = ?6
                         WHERE link = ?7",
                        params![
                            incoming.source_name,
                            incoming.title,
                            incoming.summary,
                            published_at,
                            incoming.tag,
                            fetched_at,
                            incoming.link
                        ],
                    )?;
                    UpsertOutcome::Updated
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn exists(&self, link: &str) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE link = ?1",
            params![link],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get(&self, link: &str) -> Result<Option<Item>, StorageError> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE link = ?1"),
                params![link],
                Self::row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    fn list(&self, limit: usize, offset: usize) -> Result<Vec<Item>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             ORDER BY published_at IS NULL, published_at DESC, fetched_at DESC, link
             LIMIT ?1 OFFSET ?2"
        ))?;

        let items = stmt
            .query_map(
                params![
                    clamp_limit(limit) as i64,
                    i64::try_from(offset).unwrap_or(i64::MAX)
                ],
                Self::row_to_item,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn count(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MAX_LIST_LIMIT;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn item(link: &str, title: &str) -> Item {
        Item {
            source_name: "KISA".into(),
            title: title.into(),
            link: link.into(),
            published_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
            summary: "summary".into(),
            tag: "KR".into(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_get_item() {
        let store = SqliteStore::in_memory().unwrap();
        let original = item("https://example.com/1", "Advisory");

        assert_eq!(store.upsert(&original).unwrap(), UpsertOutcome::Inserted);

        let retrieved = store.get("https://example.com/1").unwrap().unwrap();
        assert!(retrieved.same_content(&original));
        assert!(store.exists("https://example.com/1").unwrap());
        assert!(!store.exists("https://example.com/2").unwrap());
    }

    #[test]
    fn test_identical_upsert_is_no_change() {
        let store = SqliteStore::in_memory().unwrap();
        let first = item("https://example.com/1", "Advisory");

        store.upsert(&first).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        let mut again = first.clone();
        again.fetched_at = first.fetched_at + Duration::hours(1);
        assert_eq!(store.upsert(&again).unwrap(), UpsertOutcome::UpdatedNoChange);
        assert_eq!(store.count().unwrap(), 1);

        // fetched_at still moves forward
        let stored = store.get(&first.link).unwrap().unwrap();
        assert!(stored.fetched_at > first.fetched_at);
    }

    #[test]
    fn test_changed_content_is_updated() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert(&item("https://example.com/1", "Old title")).unwrap();

        let mut newer = item("https://example.com/1", "New title");
        newer.summary = "revised".into();
        assert_eq!(store.upsert(&newer).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.count().unwrap(), 1);

        let stored = store.get("https://example.com/1").unwrap().unwrap();
        assert_eq!(stored.title, "New title");
        assert_eq!(stored.summary, "revised");
    }

    #[test]
    fn test_empty_summary_keeps_stored_summary() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert(&item("https://example.com/1", "T")).unwrap();

        let mut bare = item("https://example.com/1", "T");
        bare.summary = String::new();
        assert_eq!(store.upsert(&bare).unwrap(), UpsertOutcome::UpdatedNoChange);

        let stored = store.get("https://example.com/1").unwrap().unwrap();
        assert_eq!(stored.summary, "summary");
    }

    #[test]
    fn test_same_link_from_other_source_merges() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert(&item("https://example.com/1", "T")).unwrap();

        let mut other = item("https://example.com/1", "T");
        other.source_name = "KrCERT".into();
        assert_eq!(store.upsert(&other).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(
            store.get("https://example.com/1").unwrap().unwrap().source_name,
            "KrCERT"
        );
    }

    #[test]
    fn test_list_pagination_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        for i in 0..120 {
            let mut it = item(&format!("https://example.com/{i}"), &format!("Item {i}"));
            it.published_at = Some(base + Duration::minutes(i));
            store.upsert(&it).unwrap();
        }

        let first_page = store.list(100, 0).unwrap();
        assert_eq!(first_page.len(), 100);
        assert_eq!(first_page[0].title, "Item 119");
        assert!(first_page
            .windows(2)
            .all(|w| w[0].published_at >= w[1].published_at));

        let second_page = store.list(100, 100).unwrap();
        assert_eq!(second_page.len(), 20);
        assert_eq!(second_page[19].title, "Item 0");
    }

    #[test]
    fn test_list_limit_is_clamped() {
        let store = SqliteStore::in_memory().unwrap();
        for i in 0..510 {
            store
                .upsert(&item(&format!("https://example.com/{i}"), "T"))
                .unwrap();
        }

        assert_eq!(store.list(1000, 0).unwrap().len(), MAX_LIST_LIMIT);
        assert_eq!(store.list(0, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_undated_items_sort_last() {
        let store = SqliteStore::in_memory().unwrap();
        let mut undated = item("https://example.com/undated", "Undated");
        undated.published_at = None;
        store.upsert(&undated).unwrap();
        store.upsert(&item("https://example.com/dated", "Dated")).unwrap();

        let items = store.list(10, 0).unwrap();
        assert_eq!(items[0].title, "Dated");
        assert_eq!(items[1].title, "Undated");
        assert_eq!(items[1].published_at, None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.upsert(&item("https://example.com/1", "Durable")).unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(
            reopened.get("https://example.com/1").unwrap().unwrap().title,
            "Durable"
        );
    }

    #[test]
    fn test_concurrent_upserts_same_link_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::new(dir.path().join("news.db")).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .upsert(&item("https://example.com/shared", "Same"))
                        .unwrap()
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let inserted = outcomes
            .iter()
            .filter(|o| **o == UpsertOutcome::Inserted)
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_nanosecond_timestamps_round_trip_as_no_change() {
        let store = SqliteStore::in_memory().unwrap();
        let mut a = item("https://example.com/ns", "Nanos");
        a.published_at = Some(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::nanoseconds(123_456_789),
        );

        assert_eq!(store.upsert(&a).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(&a).unwrap(), UpsertOutcome::UpdatedNoChange);
        assert_eq!(
            store.get(&a.link).unwrap().unwrap().published_at,
            a.published_at
        );
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert(&item("https://example.com/1", "One")).unwrap();

        assert!(store.list(10, usize::MAX).unwrap().is_empty());
        assert!(store.list(10, 1).unwrap().is_empty());
        assert_eq!(store.list(10, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_get_item_nonexistent() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get("nonexistent").unwrap().is_none());
        assert_eq!(store.count().unwrap(), 0);
    }
}
