//! Cached remaining time and expiry per card.
//!
//! This module provides `CardCache`, which decides for each query whether
//! the value stored with the card is good enough or must be fetched from
//! the portal. Remaining time is considered stale after 60 seconds; expiry
//! dates are fetched once and then only on request.

pub mod policy;

pub use policy::{
    needs_expire_date_fetch, needs_time_left_fetch, BatchStatus, CardCache, CardStatus, Freshness,
    DEFAULT_TIME_LEFT_REFRESH, INVALID_CREDENTIALS, NOT_AVAILABLE,
};
