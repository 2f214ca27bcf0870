use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::portal::Portal;
use crate::store::{Card, CardRecord, CardStore};

/// Shown when a value has never been fetched
pub const NOT_AVAILABLE: &str = "N/A";

/// Cached as the expiry date when the portal would not show the account.
/// Means "verify this card again", not a real date.
pub const INVALID_CREDENTIALS: &str = "**invalid credentials**";

/// Default age after which `time_left` is fetched again
pub const DEFAULT_TIME_LEFT_REFRESH: Duration = Duration::from_secs(60);

static LOOKS_LIKE_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9:]+$").expect("duration pattern is valid"));

/// Per-query cache flags. `cached_only` wins over `force_fresh`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Freshness {
    pub force_fresh: bool,
    pub cached_only: bool,
}

impl Freshness {
    pub const FRESH: Self = Self {
        force_fresh: true,
        cached_only: false,
    };

    pub const CACHED: Self = Self {
        force_fresh: false,
        cached_only: true,
    };

    /// Same flags, but never touching the network
    pub fn offline(self) -> Self {
        Self {
            cached_only: true,
            ..self
        }
    }
}

/// Whether `time_left` should be fetched for `record` at `now`
pub fn needs_time_left_fetch(
    record: &CardRecord,
    freshness: Freshness,
    refresh_after: Duration,
    now: DateTime<Utc>,
) -> bool {
    if freshness.cached_only {
        return false;
    }
    if freshness.force_fresh {
        return true;
    }
    match record.last_update {
        None => true,
        // a timestamp in the future (clock skew) counts as fresh
        Some(last) => (now - last)
            .to_std()
            .map(|age| age > refresh_after)
            .unwrap_or(false),
    }
}

/// Whether `expire_date` should be fetched. Age plays no part here.
pub fn needs_expire_date_fetch(record: &CardRecord, freshness: Freshness) -> bool {
    !freshness.cached_only && (freshness.force_fresh || record.expire_date.is_none())
}

/// One row of the card listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStatus {
    pub id: String,
    pub password: String,
    pub time_left: String,
    pub expire_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStatus {
    pub rows: Vec<CardStatus>,
    /// Set once a connectivity error switched the rest of the batch to cache
    pub offline: bool,
}

/// Cached remaining time and expiry per card, refreshed from the portal
/// according to `Freshness`.
pub struct CardCache<'a, S: CardStore + ?Sized, P: Portal + ?Sized> {
    store: &'a S,
    portal: &'a P,
    refresh_after: Duration,
}

impl<'a, S: CardStore + ?Sized, P: Portal + ?Sized> CardCache<'a, S, P> {
    pub fn new(store: &'a S, portal: &'a P) -> Self {
        Self {
            store,
            portal,
            refresh_after: DEFAULT_TIME_LEFT_REFRESH,
        }
    }

    pub fn with_refresh_after(mut self, refresh_after: Duration) -> Self {
        self.refresh_after = refresh_after;
        self
    }

    fn record(&self, id: &str) -> Result<CardRecord, SessionError> {
        self.store
            .get(id)?
            .ok_or_else(|| SessionError::UnknownCard(id.to_string()))
    }

    /// Remaining time of a card.
    ///
    /// A fetched answer is only stored when it looks like `HH:MM:SS`;
    /// anything else leaves the previous value and timestamp untouched.
    /// Connectivity errors are returned so callers can fall back to cache.
    pub async fn time_left(&self, id: &str, freshness: Freshness) -> Result<String, SessionError> {
        let mut record = self.record(id)?;

        if needs_time_left_fetch(&record, freshness, self.refresh_after, Utc::now()) {
            match self.portal.remaining_time(id, None).await {
                Ok(body) => {
                    let value = body.trim();
                    if LOOKS_LIKE_DURATION.is_match(value) {
                        record.time_left = Some(value.to_string());
                        record.last_update = Some(Utc::now());
                        self.store.put(id, &record)?;
                        debug!(card = id, time_left = value, "Remaining time updated");
                    } else {
                        debug!(card = id, "Discarding malformed remaining time answer");
                    }
                }
                Err(e) if e.is_connectivity() => return Err(e.into()),
                Err(e) => {
                    debug!(card = id, error = %e, "Remaining time query failed, keeping cached value");
                }
            }
        }

        Ok(record.time_left.unwrap_or_else(|| NOT_AVAILABLE.to_string()))
    }

    /// Expiry date of a card.
    ///
    /// Fetched only when forced or never fetched before. A portal page
    /// without an expiry row caches `INVALID_CREDENTIALS`.
    pub async fn expire_date(&self, id: &str, freshness: Freshness) -> Result<String, SessionError> {
        let mut record = self.record(id)?;

        if needs_expire_date_fetch(&record, freshness) {
            let value = match self.portal.query_account(id, &record.password).await {
                Ok(info) => info
                    .expire_date()
                    .map(str::to_string)
                    .unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
                Err(e) if e.is_connectivity() => return Err(e.into()),
                Err(e) => {
                    debug!(card = id, error = %e, "Expiry query failed");
                    INVALID_CREDENTIALS.to_string()
                }
            };
            record.expire_date = Some(value);
            self.store.put(id, &record)?;
        }

        Ok(record
            .expire_date
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()))
    }

    /// Remaining time, falling back to the cached value when the portal
    /// cannot be reached
    pub async fn time_left_or_cached(&self, id: &str, freshness: Freshness) -> Result<String, SessionError> {
        match self.time_left(id, freshness).await {
            Err(e) if e.is_connectivity() => {
                warn!(card = id, error = %e, "Portal unreachable, using cached remaining time");
                self.time_left(id, freshness.offline()).await
            }
            other => other,
        }
    }

    async fn status_of(&self, card: &Card, freshness: Freshness) -> Result<CardStatus, SessionError> {
        Ok(CardStatus {
            id: card.id.clone(),
            password: card.record.password.clone(),
            time_left: self.time_left(&card.id, freshness).await?,
            expire_date: self.expire_date(&card.id, freshness).await?,
        })
    }

    /// Status of every card in store order.
    ///
    /// The first connectivity error flips the batch to cached data for that
    /// card and all that follow; the listing itself never aborts on it.
    pub async fn batch_status(&self, freshness: Freshness) -> Result<BatchStatus, SessionError> {
        let cards = self.store.list()?;
        let mut batch = BatchStatus::default();

        for card in cards {
            let mut status = None;
            if !batch.offline {
                match self.status_of(&card, freshness).await {
                    Ok(s) => status = Some(s),
                    Err(e) if e.is_connectivity() => {
                        warn!(error = %e, "No network access, showing cached data");
                        batch.offline = true;
                    }
                    Err(e) => return Err(e),
                }
            }
            let status = match status {
                Some(s) => s,
                None => self.status_of(&card, freshness.offline()).await?,
            };
            batch.rows.push(status);
        }

        Ok(batch)
    }
}

// ============================================================================
// Tests
// ============================================================================
