//! Nauta core - session management for the ETECSA captive portal.
//!
//! This crate contains everything except the terminal front-end:
//! - `portal`: HTTP client for the login, logout and query pages
//! - `session`: the connect/monitor/disconnect engine
//! - `store`: card storage and the persisted logout URL
//! - `cache`: when to trust cached remaining time and expiry dates
//! - `selector`: which card to use when none is named

pub mod cache;
pub mod cards;
pub mod config;
pub mod error;
pub mod portal;
pub mod selector;
pub mod session;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

pub use cache::{CardCache, Freshness};
pub use config::Config;
pub use error::SessionError;
pub use portal::{EtecsaPortal, Portal, PortalError};
pub use selector::select_card;
pub use session::{SessionEngine, SessionFiles, SessionState};
pub use store::{Artifact, CardStore, FileArtifact, JsonCardStore};
