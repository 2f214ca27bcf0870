//! Connect, monitor and disconnect a portal session.
//!
//! The logout URL is written twice during connect: once before the login
//! request, built from the last confirmed attribute UUID, and again with
//! the real UUID once the portal confirms the login. If the process dies in
//! between, the guess is still there for `disconnect` to use.
//!
//! The presence of the logout URL is what "connected" means across
//! processes; the engine's `SessionState` mirrors it in-process.

use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CardCache, Freshness, NOT_AVAILABLE};
use crate::cards::expand_card_id;
use crate::config::Config;
use crate::error::SessionError;
use crate::portal::{LogoutRequest, Portal, PortalError};
use crate::selector::select_card;
use crate::store::{Artifact, Card, CardStore, FileArtifact, ATTRIBUTE_UUID_FILE, LOGOUT_URL_FILE};

use super::state::{
    ActiveSession, ConnectOutcome, DisconnectOutcome, MonitorExit, SessionReport, SessionState,
    Tick,
};

/// Reason given when the portal accepts a login without a session attribute
const MISSING_ATTRIBUTE_REASON: &str = "portal did not return a session attribute";

/// The two durable values the engine owns
pub struct SessionFiles<A> {
    pub logout_url: A,
    pub attribute_uuid: A,
}

impl SessionFiles<FileArtifact> {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            logout_url: FileArtifact::new(dir.join(LOGOUT_URL_FILE)),
            attribute_uuid: FileArtifact::new(dir.join(ATTRIBUTE_UUID_FILE)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub logout_attempts: u32,
    pub monitor_interval: Duration,
    pub time_left_refresh: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            logout_attempts: config.session.logout_attempts,
            monitor_interval: config.session.monitor_interval(),
            time_left_refresh: config.cache.time_left_refresh(),
        }
    }
}

pub struct SessionEngine<P, S, A> {
    portal: P,
    cards: S,
    files: SessionFiles<A>,
    /// Base the logout URL is built under
    secure_base: Url,
    settings: EngineSettings,
    state: SessionState,
    active: Option<ActiveSession>,
}

impl<P, S, A> SessionEngine<P, S, A>
where
    P: Portal,
    S: CardStore,
    A: Artifact,
{
    pub fn new(
        portal: P,
        cards: S,
        files: SessionFiles<A>,
        secure_base: Url,
        settings: EngineSettings,
    ) -> Self {
        let state = if files.logout_url.exists() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        };
        debug!(%state, "Session engine created");
        Self {
            portal,
            cards,
            files,
            secure_base,
            settings,
            state,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn portal(&self) -> &P {
        &self.portal
    }

    pub fn cards(&self) -> &S {
        &self.cards
    }

    pub fn files(&self) -> &SessionFiles<A> {
        &self.files
    }

    /// Remaining-time/expiry cache over this engine's store and portal
    pub fn cache(&self) -> CardCache<'_, S, P> {
        CardCache::new(&self.cards, &self.portal).with_refresh_after(self.settings.time_left_refresh)
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Session state change");
            self.state = next;
        }
    }

    /// The named card (bare user names are expanded), or the selector's pick
    pub fn resolve_card(&self, card: Option<&str>) -> Result<Card, SessionError> {
        match card {
            Some(input) => {
                let id = expand_card_id(&self.cards, input)?;
                let record = self
                    .cards
                    .get(&id)?
                    .ok_or_else(|| SessionError::UnknownCard(id.clone()))?;
                Ok(Card { id, record })
            }
            None => select_card(&self.cards),
        }
    }

    /// Log in with `card`, or with the selector's choice when `None`.
    ///
    /// Rejections come back as `ConnectOutcome::LoginFailed`; errors are
    /// reserved for storage and network problems. Either way the guessed
    /// logout URL is left in place once it has been written.
    pub async fn connect(&mut self, card: Option<&str>) -> Result<ConnectOutcome, SessionError> {
        let card = self.resolve_card(card)?;
        let previous = self.state;
        self.transition(SessionState::Connecting);

        let result = self.try_connect(&card).await;
        match &result {
            Ok(ConnectOutcome::Connected(_)) => self.transition(SessionState::Connected),
            Ok(ConnectOutcome::AlreadyConnected) => self.transition(previous),
            Ok(ConnectOutcome::LoginFailed { .. }) | Err(_) => {
                self.transition(SessionState::Disconnected)
            }
        }
        result
    }

    async fn try_connect(&mut self, card: &Card) -> Result<ConnectOutcome, SessionError> {
        let form = match self.portal.create_session().await {
            Ok(form) => form,
            Err(PortalError::AlreadyConnected) => return Ok(ConnectOutcome::AlreadyConnected),
            Err(e) => return Err(e.into()),
        };

        let csrfhw = form
            .csrfhw()
            .ok_or(SessionError::IncompleteLoginForm("CSRFHW"))?;
        let wlanuserip = form
            .wlanuserip()
            .ok_or(SessionError::IncompleteLoginForm("wlanuserip"))?;

        let last_uuid = self.files.attribute_uuid.read()?.unwrap_or_default();
        let guess = LogoutRequest::new(csrfhw, &card.id, last_uuid, wlanuserip);
        let guessed_url = guess.to_url(&self.secure_base).map_err(PortalError::from)?;
        self.files.logout_url.write(guessed_url.as_str())?;
        info!(card = %card.id, logout_url = %guessed_url, "Attempting connection with guessed logout URL");

        let attribute_uuid = match self
            .portal
            .login(&form, &card.id, &card.record.password)
            .await
        {
            Ok(Some(uuid)) => uuid,
            Ok(None) => {
                return Ok(ConnectOutcome::LoginFailed {
                    card: card.id.clone(),
                    reason: MISSING_ATTRIBUTE_REASON.to_string(),
                })
            }
            Err(PortalError::LoginFailed(reason)) => {
                return Ok(ConnectOutcome::LoginFailed {
                    card: card.id.clone(),
                    reason,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let started_at = Instant::now();

        self.files.attribute_uuid.write(&attribute_uuid)?;
        let logout = guess.with_attribute_uuid(attribute_uuid);
        let logout_url = logout.to_url(&self.secure_base).map_err(PortalError::from)?;
        self.files.logout_url.write(logout_url.as_str())?;

        let guessed_right = logout_url == guessed_url;
        info!(card = %card.id, logout_url = %logout_url, guessed_right, "Connected");

        let session = ActiveSession {
            card: card.id.clone(),
            started_at,
            logout,
            guessed_right,
        };
        self.active = Some(session.clone());
        Ok(ConnectOutcome::Connected(session))
    }

    /// Wait until cancelled, past `limit`, or until the logout URL vanishes.
    ///
    /// `on_tick` runs at the top of every iteration. Cancellation is only
    /// observed between iterations.
    pub async fn monitor<F>(
        &mut self,
        limit: Option<Duration>,
        cancel: &mut watch::Receiver<bool>,
        mut on_tick: F,
    ) -> Result<MonitorExit, SessionError>
    where
        F: FnMut(&Tick),
    {
        let started_at = self
            .active
            .as_ref()
            .map(|s| s.started_at)
            .ok_or(SessionError::NotConnected)?;
        let mut cancel_open = true;

        loop {
            let elapsed = started_at.elapsed();
            let tick = Tick {
                elapsed,
                remaining: limit.map(|l| l.saturating_sub(elapsed)),
            };
            on_tick(&tick);

            if limit.is_some_and(|l| elapsed > l) {
                info!(elapsed_secs = elapsed.as_secs(), "Connection time limit reached");
                return Ok(MonitorExit::TimeLimit);
            }
            if *cancel.borrow() {
                info!("Interrupted, closing session");
                return Ok(MonitorExit::Cancelled);
            }
            if !self.files.logout_url.exists() {
                info!("Logout URL removed, session was closed elsewhere");
                self.active = None;
                self.transition(SessionState::Disconnected);
                return Ok(MonitorExit::SessionClosed);
            }

            if cancel_open {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.monitor_interval) => {}
                    changed = cancel.changed() => {
                        // sender gone: nobody can cancel any more
                        if changed.is_err() {
                            cancel_open = false;
                        }
                    }
                }
            } else {
                tokio::time::sleep(self.settings.monitor_interval).await;
            }
        }
    }

    /// Close the session recorded in the logout URL, if any.
    ///
    /// The stored URL is sent as written, even when it points somewhere
    /// other than the configured secure base. Connection errors are retried
    /// immediately up to `logout_attempts` times; a portal rejection is
    /// returned at once. The logout URL is only deleted after the portal
    /// confirms.
    pub async fn disconnect(&mut self) -> Result<DisconnectOutcome, SessionError> {
        let Some(raw) = self.files.logout_url.read()? else {
            info!("Connection already down");
            self.active = None;
            self.transition(SessionState::Disconnected);
            return Ok(DisconnectOutcome::AlreadyDisconnected);
        };
        let logout_url = match (LogoutRequest::from_url(&raw), Url::parse(&raw)) {
            (Some(_), Ok(url)) => url,
            _ => return Err(SessionError::CorruptLogoutUrl(raw)),
        };
        if logout_url.origin() != self.secure_base.origin() {
            warn!(%logout_url, secure_base = %self.secure_base, "Stored logout URL is not under the configured portal");
        }

        self.transition(SessionState::Disconnecting);
        let attempts = self.settings.logout_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.portal.logout(&logout_url).await {
                Ok(()) => {
                    self.files.logout_url.delete()?;
                    self.active = None;
                    self.transition(SessionState::Disconnected);
                    info!(attempts = attempt, "Connection closed");
                    return Ok(DisconnectOutcome::Disconnected { attempts: attempt });
                }
                Err(e) if e.is_connectivity() => {
                    warn!(attempt, error = %e, "Problem logging out, retrying");
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(error = %e, "Portal refused logout");
                    self.transition(SessionState::Connected);
                    return Err(e.into());
                }
            }
        }

        self.transition(SessionState::Connected);
        Err(match last_error {
            Some(e) => e.into(),
            None => PortalError::LogoutFailed("no attempt made".to_string()).into(),
        })
    }

    /// Monitor the active session, then disconnect when the loop was
    /// cancelled or timed out, and report the connected time and the
    /// remaining balance.
    pub async fn run<F>(
        &mut self,
        limit: Option<Duration>,
        cancel: &mut watch::Receiver<bool>,
        on_tick: F,
    ) -> Result<SessionReport, SessionError>
    where
        F: FnMut(&Tick),
    {
        let (card, started_at) = self
            .active
            .as_ref()
            .map(|s| (s.card.clone(), s.started_at))
            .ok_or(SessionError::NotConnected)?;

        let exit = self.monitor(limit, cancel, on_tick).await?;

        let (disconnect, time_left) = match exit {
            MonitorExit::SessionClosed => (None, None),
            MonitorExit::Cancelled | MonitorExit::TimeLimit => {
                let disconnect = self.disconnect().await;
                let time_left = self
                    .cache()
                    .time_left_or_cached(&card, Freshness::FRESH)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(card = %card, error = %e, "Could not read remaining time");
                        NOT_AVAILABLE.to_string()
                    });
                (Some(disconnect), Some(time_left))
            }
        };

        let connected_for = started_at.elapsed();
        info!(card = %card, connected_secs = connected_for.as_secs(), time_left = ?time_left, "Session finished");

        Ok(SessionReport {
            card,
            exit,
            disconnect,
            connected_for,
            time_left,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
