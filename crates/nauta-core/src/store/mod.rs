//! Local persistence for cards and session artifacts.
//!
//! This module provides:
//! - `CardStore`: key-value storage of prepaid cards, with a JSON-file
//!   implementation and an in-memory one
//! - `Artifact`: a single durable text value (the logout URL, the last
//!   attribute UUID) whose existence is itself meaningful
//!
//! Passwords are stored in cleartext.

pub mod artifact;
pub mod cards;

pub use artifact::{Artifact, FileArtifact, MemoryArtifact, ATTRIBUTE_UUID_FILE, LOGOUT_URL_FILE};
pub use cards::{Card, CardRecord, CardStore, JsonCardStore, MemoryCardStore, CARDS_FILE};
