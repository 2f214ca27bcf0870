//! Automatic card choice for `connect` when no card is named.

use std::time::Duration;

use tracing::debug;

use crate::error::SessionError;
use crate::store::{Card, CardStore};

/// Pick the card with the least positive time left.
///
/// Cards whose cached `time_left` is absent, unparsable or zero are never
/// chosen. Ties keep the first card in store order.
pub fn select_card<S: CardStore + ?Sized>(store: &S) -> Result<Card, SessionError> {
    let cards = store.list()?;
    pick(cards).ok_or(SessionError::NoCardAvailable)
}

fn pick(cards: Vec<Card>) -> Option<Card> {
    let mut best: Option<(Duration, Card)> = None;
    for card in cards {
        let Some(left) = card.record.time_left_duration().filter(|d| !d.is_zero()) else {
            debug!(card = %card.id, time_left = ?card.record.time_left, "Card not eligible");
            continue;
        };
        // strict comparison keeps the earlier card on ties
        if best.as_ref().map_or(true, |(current, _)| left < *current) {
            best = Some((left, card));
        }
    }
    best.map(|(_, card)| card)
}
