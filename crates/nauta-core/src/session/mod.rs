//! Session lifecycle: connect, monitor, disconnect.
//!
//! `SessionEngine` drives the portal through one session and keeps the
//! logout URL on disk for as long as the session may be open, so that a
//! later process can always close it.

pub mod engine;
pub mod state;

pub use engine::{EngineSettings, SessionEngine, SessionFiles};
pub use state::{
    ActiveSession, ConnectOutcome, DisconnectOutcome, MonitorExit, SessionReport, SessionState,
    Tick,
};
