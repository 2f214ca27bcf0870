use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::parse_hms;

/// Card store file name in the data directory
pub const CARDS_FILE: &str = "cards.json";

/// A prepaid card as kept in the local store.
///
/// Only the password is guaranteed; the remaining fields are filled in by
/// portal queries and go stale independently of one another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_date: Option<String>,
}

impl CardRecord {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            time_left: None,
            last_update: None,
            expire_date: None,
        }
    }

    /// Cached remaining time, if present and well formed
    pub fn time_left_duration(&self) -> Option<Duration> {
        self.time_left.as_deref().and_then(parse_hms)
    }

    /// True only when the cached remaining time parses to exactly zero
    pub fn is_exhausted(&self) -> bool {
        self.time_left_duration() == Some(Duration::ZERO)
    }
}

/// A card record together with its login (`name@domain`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub record: CardRecord,
}

impl Card {
    /// The part of the login before `@`
    pub fn local_part(&self) -> &str {
        self.id.split('@').next().unwrap_or(&self.id)
    }
}

/// Key-value persistence for cards, keyed by login.
///
/// `list` returns cards in the store's iteration order, which the card
/// selector relies on for tie-breaking.
pub trait CardStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<CardRecord>>;
    fn put(&self, id: &str, record: &CardRecord) -> Result<()>;
    /// Returns whether a record was removed
    fn delete(&self, id: &str) -> Result<bool>;
    fn list(&self) -> Result<Vec<Card>>;
}

/// Card store backed by a single pretty-printed JSON document.
pub struct JsonCardStore {
    path: PathBuf,
}

impl JsonCardStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            path: data_dir.join(CARDS_FILE),
        })
    }

    fn load(&self) -> Result<BTreeMap<String, CardRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read card store {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse card store {}", self.path.display()))
    }

    fn save(&self, cards: &BTreeMap<String, CardRecord>) -> Result<()> {
        let contents = serde_json::to_string_pretty(cards)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write card store {}", self.path.display()))?;
        Ok(())
    }
}

impl CardStore for JsonCardStore {
    fn get(&self, id: &str) -> Result<Option<CardRecord>> {
        Ok(self.load()?.remove(id))
    }

    fn put(&self, id: &str, record: &CardRecord) -> Result<()> {
        let mut cards = self.load()?;
        cards.insert(id.to_string(), record.clone());
        self.save(&cards)?;
        debug!(card = id, "Card saved");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut cards = self.load()?;
        let removed = cards.remove(id).is_some();
        if removed {
            self.save(&cards)?;
            debug!(card = id, "Card deleted");
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<Card>> {
        Ok(self
            .load()?
            .into_iter()
            .map(|(id, record)| Card { id, record })
            .collect())
    }
}

/// In-memory card store, handy for tests and dry runs
#[derive(Default)]
pub struct MemoryCardStore {
    cards: Mutex<BTreeMap<String, CardRecord>>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards<I, K>(cards: I) -> Self
    where
        I: IntoIterator<Item = (K, CardRecord)>,
        K: Into<String>,
    {
        Self {
            cards: Mutex::new(cards.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, CardRecord>>> {
        self.cards
            .lock()
            .map_err(|_| anyhow::anyhow!("card store lock poisoned"))
    }
}

impl CardStore for MemoryCardStore {
    fn get(&self, id: &str) -> Result<Option<CardRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn put(&self, id: &str, record: &CardRecord) -> Result<()> {
        self.lock()?.insert(id.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<Card>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(id, record)| Card {
                id: id.clone(),
                record: record.clone(),
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn card_with_time(time_left: Option<&str>) -> CardRecord {
        CardRecord {
            time_left: time_left.map(str::to_string),
            ..CardRecord::new("pw")
        }
    }

    #[test]
    fn test_record_serializes_without_absent_fields() {
        let json = serde_json::to_string(&CardRecord::new("secret")).expect("serialize");
        assert_eq!(json, r#"{"password":"secret"}"#);

        let parsed: CardRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, CardRecord::new("secret"));
    }

    #[test]
    fn test_is_exhausted_only_for_exact_zero() {
        assert!(card_with_time(Some("00:00:00")).is_exhausted());
        assert!(!card_with_time(Some("00:00:01")).is_exhausted());
        assert!(!card_with_time(None).is_exhausted());
        assert!(!card_with_time(Some("garbage")).is_exhausted());
    }

    #[test]
    fn test_local_part() {
        let card = Card {
            id: "pepe@nauta.com.cu".to_string(),
            record: CardRecord::new("pw"),
        };
        assert_eq!(card.local_part(), "pepe");
    }

    #[test]
    fn test_json_store_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCardStore::new(dir.path().to_path_buf()).expect("store");

        assert!(store.list().expect("list").is_empty());
        assert_eq!(store.get("a@nauta.com.cu").expect("get"), None);

        store
            .put("b@nauta.com.cu", &card_with_time(Some("01:00:00")))
            .expect("put");
        store.put("a@nauta.com.cu", &CardRecord::new("pw")).expect("put");

        let ids: Vec<String> = store.list().expect("list").into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a@nauta.com.cu", "b@nauta.com.cu"]);

        let reopened = JsonCardStore::new(dir.path().to_path_buf()).expect("store");
        assert_eq!(
            reopened.get("b@nauta.com.cu").expect("get"),
            Some(card_with_time(Some("01:00:00")))
        );

        assert!(reopened.delete("a@nauta.com.cu").expect("delete"));
        assert!(!reopened.delete("a@nauta.com.cu").expect("delete"));
        assert_eq!(reopened.list().expect("list").len(), 1);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCardStore::with_cards([("x@nauta.com.cu", CardRecord::new("pw"))]);
        assert!(store.get("x@nauta.com.cu").expect("get").is_some());
        assert!(store.delete("x@nauta.com.cu").expect("delete"));
        assert!(store.list().expect("list").is_empty());
    }
}
