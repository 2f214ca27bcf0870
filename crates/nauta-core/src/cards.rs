//! Card management: add, remove, purge and inspect stored cards.

use tracing::info;

use crate::error::SessionError;
use crate::portal::{AccountInfo, Portal};
use crate::store::{CardRecord, CardStore};

/// Expand a bare user name (`pepe`) to a stored login (`pepe@nauta.com.cu`).
///
/// Inputs that already contain `@`, or that match no stored card, are
/// returned unchanged.
pub fn expand_card_id<S: CardStore + ?Sized>(store: &S, input: &str) -> Result<String, SessionError> {
    if input.contains('@') {
        return Ok(input.to_string());
    }
    Ok(store
        .list()?
        .into_iter()
        .find(|card| card.local_part() == input)
        .map(|card| card.id)
        .unwrap_or_else(|| input.to_string()))
}

/// Verify credentials against the portal and store them.
///
/// The login is stored lower-cased. Returns the stored id.
pub async fn add_card<S, P>(
    store: &S,
    portal: &P,
    id: &str,
    password: &str,
) -> Result<String, SessionError>
where
    S: CardStore + ?Sized,
    P: Portal + ?Sized,
{
    let info = match portal.query_account(id, password).await {
        Ok(info) => info,
        Err(e) if e.is_connectivity() => return Err(e.into()),
        Err(_) => return Err(SessionError::InvalidCredentials(id.to_string())),
    };
    if info.expire_date().is_none() {
        return Err(SessionError::InvalidCredentials(id.to_string()));
    }

    let id = id.to_lowercase();
    store.put(&id, &CardRecord::new(password))?;
    info!(card = %id, "Card added");
    Ok(id)
}

/// Delete the given cards, returning the ids that were actually stored
pub fn remove_cards<S: CardStore + ?Sized>(store: &S, ids: &[String]) -> Result<Vec<String>, SessionError> {
    let mut removed = Vec::new();
    for id in ids {
        if store.delete(id)? {
            info!(card = %id, "Card removed");
            removed.push(id.clone());
        }
    }
    Ok(removed)
}

/// Cards whose cached remaining time is exactly zero
pub fn exhausted_cards<S: CardStore + ?Sized>(store: &S) -> Result<Vec<String>, SessionError> {
    Ok(store
        .list()?
        .into_iter()
        .filter(|card| card.record.is_exhausted())
        .map(|card| card.id)
        .collect())
}

/// Account summary and connection history of a stored card
pub async fn card_detail<S, P>(store: &S, portal: &P, id: &str) -> Result<AccountInfo, SessionError>
where
    S: CardStore + ?Sized,
    P: Portal + ?Sized,
{
    let record = store
        .get(id)?
        .ok_or_else(|| SessionError::UnknownCard(id.to_string()))?;
    Ok(portal.query_account(id, &record.password).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCardStore;
    use crate::testing::{Fail, FakePortal};

    fn with_time(time_left: &str) -> CardRecord {
        CardRecord {
            time_left: Some(time_left.to_string()),
            ..CardRecord::new("pw")
        }
    }

    #[test]
    fn test_expand_card_id() {
        let store = MemoryCardStore::with_cards([
            ("pepe@nauta.com.cu", CardRecord::new("pw")),
            ("ana@nauta.co.cu", CardRecord::new("pw")),
        ]);
        assert_eq!(expand_card_id(&store, "ana").unwrap(), "ana@nauta.co.cu");
        assert_eq!(expand_card_id(&store, "pepe").unwrap(), "pepe@nauta.com.cu");
        assert_eq!(expand_card_id(&store, "luis").unwrap(), "luis");
        assert_eq!(
            expand_card_id(&store, "pepe@otro.cu").unwrap(),
            "pepe@otro.cu"
        );
    }

    #[tokio::test]
    async fn test_add_card_verifies_and_lowercases() {
        let store = MemoryCardStore::new();
        let portal = FakePortal::new();

        let id = add_card(&store, &portal, "Pepe@Nauta.com.cu", "secret")
            .await
            .expect("valid card");
        assert_eq!(id, "pepe@nauta.com.cu");
        assert_eq!(store.get(&id).unwrap(), Some(CardRecord::new("secret")));
    }

    #[tokio::test]
    async fn test_add_card_rejects_unverified() {
        let store = MemoryCardStore::new();
        let portal = FakePortal::new().with_account(Ok(AccountInfo::default()));
        assert!(matches!(
            add_card(&store, &portal, "x@nauta.com.cu", "bad").await,
            Err(SessionError::InvalidCredentials(_))
        ));

        let portal = FakePortal::new().with_account(Err(Fail::Malformed));
        assert!(matches!(
            add_card(&store, &portal, "x@nauta.com.cu", "bad").await,
            Err(SessionError::InvalidCredentials(_))
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_card_offline() {
        let store = MemoryCardStore::new();
        let portal = FakePortal::new().with_account(Err(Fail::Network));
        let err = add_card(&store, &portal, "x@nauta.com.cu", "pw").await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[test]
    fn test_exhausted_cards_only_exact_zero() {
        let store = MemoryCardStore::with_cards([
            ("a@nauta.com.cu", with_time("00:00:00")),
            ("b@nauta.com.cu", with_time("00:00:05")),
            ("c@nauta.com.cu", CardRecord::new("pw")),
            ("d@nauta.com.cu", with_time("N/A")),
        ]);
        assert_eq!(exhausted_cards(&store).unwrap(), vec!["a@nauta.com.cu"]);
    }

    #[test]
    fn test_remove_cards_reports_existing() {
        let store = MemoryCardStore::with_cards([("a@nauta.com.cu", CardRecord::new("pw"))]);
        let removed = remove_cards(
            &store,
            &["a@nauta.com.cu".to_string(), "ghost@nauta.com.cu".to_string()],
        )
        .unwrap();
        assert_eq!(removed, vec!["a@nauta.com.cu"]);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_card_detail_unknown() {
        let store = MemoryCardStore::new();
        let portal = FakePortal::new();
        assert!(matches!(
            card_detail(&store, &portal, "ghost@nauta.com.cu").await,
            Err(SessionError::UnknownCard(_))
        ));
        assert_eq!(portal.count("query_account"), 0);
    }
}
