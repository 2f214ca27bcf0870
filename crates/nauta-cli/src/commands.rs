//! Command handlers.

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use nauta_core::cache::{BatchStatus, Freshness};
use nauta_core::cards::{add_card, card_detail, exhausted_cards, expand_card_id, remove_cards};
use nauta_core::session::{
    ConnectOutcome, DisconnectOutcome, EngineSettings, MonitorExit, SessionReport, Tick,
};
use nauta_core::store::FileArtifact;
use nauta_core::utils::{format_hms, mask, truncate_string};
use nauta_core::{Config, EtecsaPortal, JsonCardStore, SessionEngine, SessionError, SessionFiles};
use tokio::sync::watch;
use tracing::info;

use crate::cli::{CardsArgs, CardsCommand};

type Engine = SessionEngine<EtecsaPortal, JsonCardStore, FileArtifact>;

/// Longest portal message echoed to the terminal
const MAX_REASON_LENGTH: usize = 120;

/// Everything a command needs, built once from config
pub struct AppContext {
    pub config: Config,
    pub data_dir: PathBuf,
}

impl AppContext {
    pub fn new(config: Config, data_dir: PathBuf) -> Self {
        Self { config, data_dir }
    }

    fn engine(&self) -> Result<Engine> {
        let portal = EtecsaPortal::new(&self.config.portal).context("Failed to build HTTP client")?;
        let secure_base = portal.secure_base().clone();
        let cards = JsonCardStore::new(self.data_dir.clone())?;
        Ok(SessionEngine::new(
            portal,
            cards,
            SessionFiles::in_dir(&self.data_dir),
            secure_base,
            EngineSettings::from_config(&self.config),
        ))
    }
}

// ============================================================================
// up / down
// ============================================================================

pub async fn up(ctx: &AppContext, card: Option<String>, time: Option<u64>) -> Result<()> {
    let mut engine = ctx.engine()?;

    let card = match engine.resolve_card(card.as_deref()) {
        Ok(card) => card,
        Err(SessionError::UnknownCard(id)) => {
            println!("Invalid card: {}", id);
            return Ok(());
        }
        Err(SessionError::NoCardAvailable) => {
            println!("No card available, add one with 'nauta cards add'");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let time_left = engine
        .cache()
        .time_left_or_cached(&card.id, Freshness::default())
        .await?;
    println!("Using card {}. Time left: {}", card.id, time_left);
    info!(card = %card.id, %time_left, "Connecting");

    match engine.connect(Some(&card.id)).await? {
        ConnectOutcome::AlreadyConnected => {
            println!("Looks like you're already connected. Use 'nauta down' to log out.");
            return Ok(());
        }
        ConnectOutcome::LoginFailed { reason, .. } => {
            println!("Log in failed: {}", truncate_string(&reason, MAX_REASON_LENGTH));
            return Ok(());
        }
        ConnectOutcome::Connected(_) => {
            println!("Logged in successfully. To logout, run 'nauta down'");
            println!("or just hit Ctrl+C here, I'll stick around...");
        }
    }

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel_tx).await {
            eprintln!();
            eprintln!("Interrupted again, exiting. The session may still be open; try 'nauta down'.");
            std::process::exit(130);
        }
    });

    let limit = time.map(Duration::from_secs);
    let report = engine.run(limit, &mut cancel_rx, print_tick).await?;
    println!();
    print_report(&report);
    Ok(())
}

/// Turn the first interrupt into a cancellation request and keep listening
/// while the session winds down. Returns `true` on a second interrupt, and
/// `false` if the signal source fails.
pub(crate) async fn watch_interrupts<S, F>(mut next_signal: S, cancel: watch::Sender<bool>) -> bool
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    info!("Interrupt received, logging out");
    let _ = cancel.send(true);
    next_signal().await.is_ok()
}

fn print_tick(tick: &Tick) {
    let mut line = format!("\rConnection time: {} ", format_hms(tick.elapsed));
    if let Some(remaining) = tick.remaining {
        line.push_str(&format!(". Automatically disconnect in {}", format_hms(remaining)));
    }
    print!("{}", line);
    let _ = io::stdout().flush();
}

fn print_report(report: &SessionReport) {
    match report.exit {
        MonitorExit::Cancelled => println!("Got a Ctrl+C, logged out"),
        MonitorExit::TimeLimit => println!("Time limit reached, logged out"),
        MonitorExit::SessionClosed => println!("Session was closed from another terminal"),
    }

    if let Some(Err(e)) = &report.disconnect {
        println!("Could not log out: {}", e);
        println!("The session may still be open; try 'nauta down'.");
    }

    println!("Connection time: {}", format_hms(report.connected_for));
    if let Some(time_left) = &report.time_left {
        println!("Reported time left: {}", time_left);
    }
}

pub async fn down(ctx: &AppContext) -> Result<()> {
    let mut engine = ctx.engine()?;
    println!("Logging out...");
    match engine.disconnect().await? {
        DisconnectOutcome::AlreadyDisconnected => {
            println!("Connection seems to be down already. To connect, use 'nauta up'")
        }
        DisconnectOutcome::Disconnected { .. } => println!("Connection closed successfully"),
    }
    Ok(())
}

// ============================================================================
// cards
// ============================================================================

pub async fn cards(ctx: &AppContext, args: CardsArgs) -> Result<()> {
    match args.command {
        None => {
            let freshness = Freshness {
                force_fresh: args.fresh,
                cached_only: args.cached,
            };
            list(ctx, args.verbose, freshness).await
        }
        Some(CardsCommand::Add { card }) => add(ctx, card).await,
        Some(CardsCommand::Rm { cards, yes }) => rm(ctx, &cards, yes),
        Some(CardsCommand::Clean { yes }) => clean(ctx, yes),
        Some(CardsCommand::Info { card }) => card_info(ctx, &card).await,
    }
}

async fn list(ctx: &AppContext, verbose: bool, freshness: Freshness) -> Result<()> {
    let engine = ctx.engine()?;
    let BatchStatus { rows, offline } = engine.cache().batch_status(freshness).await?;

    if offline {
        println!("WARNING: It seems that you have no network access. Showing data from cache.");
    }
    for row in rows {
        let password = if verbose { row.password } else { mask(&row.password) };
        println!(
            "{}\t{}\t{}\t(expires {})",
            row.id, password, row.time_left, row.expire_date
        );
    }
    Ok(())
}

async fn add(ctx: &AppContext, card: Option<String>) -> Result<()> {
    let engine = ctx.engine()?;
    let card = match card {
        Some(card) => card,
        None => dialoguer::Input::<String>::new()
            .with_prompt("Username")
            .interact_text()
            .context("Input error")?,
    };
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    match add_card(engine.cards(), engine.portal(), &card, &password).await {
        Ok(id) => {
            println!("Card {} added", id);
            Ok(())
        }
        Err(SessionError::InvalidCredentials(_)) => {
            println!("Credentials seem incorrect");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn confirm_delete(ids: &[String], yes: bool) -> Result<bool> {
    println!("Will delete these cards:");
    for id in ids {
        println!("   {}", id);
    }
    if yes {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt("Proceed?")
        .default(false)
        .interact()
        .context("Input error")
}

fn rm(ctx: &AppContext, inputs: &[String], yes: bool) -> Result<()> {
    let engine = ctx.engine()?;
    let ids = inputs
        .iter()
        .map(|input| expand_card_id(engine.cards(), input))
        .collect::<Result<Vec<_>, _>>()?;

    if !confirm_delete(&ids, yes)? {
        return Ok(());
    }
    let removed = remove_cards(engine.cards(), &ids)?;
    for id in ids.iter().filter(|id| !removed.contains(id)) {
        println!("No such card: {}", id);
    }
    Ok(())
}

fn clean(ctx: &AppContext, yes: bool) -> Result<()> {
    let engine = ctx.engine()?;
    let ids = exhausted_cards(engine.cards())?;
    if ids.is_empty() {
        println!("No cards without time left");
        return Ok(());
    }
    if confirm_delete(&ids, yes)? {
        remove_cards(engine.cards(), &ids)?;
    }
    Ok(())
}

async fn card_info(ctx: &AppContext, input: &str) -> Result<()> {
    let engine = ctx.engine()?;
    let id = expand_card_id(engine.cards(), input)?;
    let info = card_detail(engine.cards(), engine.portal(), &id).await?;

    println!("Información");
    println!("-----------");
    for (label, value) in &info.details {
        println!("{} {}", label, value);
    }

    println!();
    println!("Sesiones");
    println!("--------");
    for session in &info.sessions {
        println!("{}", session.join("\t"));
    }
    Ok(())
}
