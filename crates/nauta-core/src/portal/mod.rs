//! Captive-portal protocol client.
//!
//! This module provides the `Portal` trait and its `EtecsaPortal`
//! implementation for the three portal interactions (open a session and
//! log in, log out, query remaining time and account information).
//!
//! The portal speaks HTML; all scraping is confined to `html`.

pub mod client;
pub mod error;
pub mod html;
pub mod logout;
pub mod models;

pub use client::{EtecsaPortal, Portal};
pub use error::PortalError;
pub use logout::LogoutRequest;
pub use models::{AccountInfo, LoginForm};
