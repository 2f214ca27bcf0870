//! Utility functions for time strings and console-safe formatting.

pub mod format;

pub use format::{format_hms, mask, parse_hms, truncate_string};
