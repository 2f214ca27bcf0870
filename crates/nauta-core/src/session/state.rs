use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::SessionError;
use crate::portal::LogoutRequest;

/// Where the engine is in the connect/monitor/disconnect cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// A session this process opened
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub card: String,
    pub started_at: Instant,
    pub logout: LogoutRequest,
    /// Whether the logout URL written before login was already the real one
    pub guessed_right: bool,
}

#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// The landing page was not intercepted; nothing was changed
    AlreadyConnected,
    /// The portal rejected the login or gave no session attribute
    LoginFailed { card: String, reason: String },
    Connected(ActiveSession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Disconnected { attempts: u32 },
    /// No logout URL was stored; nothing to undo
    AlreadyDisconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Interrupted by the user
    Cancelled,
    /// The requested maximum duration was exceeded
    TimeLimit,
    /// The logout URL disappeared, so the session was closed elsewhere
    SessionClosed,
}

/// One monitor loop iteration, for progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub elapsed: Duration,
    /// Time until the automatic disconnect, when a limit was given
    pub remaining: Option<Duration>,
}

/// What happened between login and the end of the monitor loop
#[derive(Debug)]
pub struct SessionReport {
    pub card: String,
    pub exit: MonitorExit,
    /// `None` when the session was already closed elsewhere
    pub disconnect: Option<Result<DisconnectOutcome, SessionError>>,
    pub connected_for: Duration,
    /// Remaining time reported after logout
    pub time_left: Option<String>,
}
