//! Command-line definitions.

use clap::{Args, Parser, Subcommand};

/// Log in and out of the Nauta captive portal using stored prepaid cards
#[derive(Debug, Parser)]
#[command(name = "nauta", version, about)]
pub struct Cli {
    /// Show debug output on stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect, stay until Ctrl+C (or the time limit), then disconnect
    Up {
        /// Disconnect automatically after this many seconds
        #[arg(short, long, value_name = "SECS")]
        time: Option<u64>,
        /// Card to use; defaults to the one with the least time left
        card: Option<String>,
    },
    /// Close the current session
    Down,
    /// List and manage stored cards
    Cards(CardsArgs),
}

#[derive(Debug, Args)]
pub struct CardsArgs {
    /// Show passwords
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Ask the portal even when cached values are recent
    #[arg(short, long)]
    pub fresh: bool,

    /// Only show cached values
    #[arg(short, long)]
    pub cached: bool,

    #[command(subcommand)]
    pub command: Option<CardsCommand>,
}

#[derive(Debug, Subcommand)]
pub enum CardsCommand {
    /// Verify a card against the portal and store it
    Add {
        /// Login, prompted for when omitted
        card: Option<String>,
    },
    /// Delete stored cards
    Rm {
        #[arg(required = true)]
        cards: Vec<String>,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete cards with no time left
    Clean {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show account details and recent connections of a card
    Info { card: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_up_with_limit() {
        let cli = Cli::parse_from(["nauta", "up", "-t", "3600", "pepe"]);
        match cli.command {
            Commands::Up { time, card } => {
                assert_eq!(time, Some(3600));
                assert_eq!(card.as_deref(), Some("pepe"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_cards_flags() {
        let cli = Cli::parse_from(["nauta", "-d", "cards", "-v", "--fresh"]);
        assert!(cli.debug);
        match cli.command {
            Commands::Cards(args) => {
                assert!(args.verbose);
                assert!(args.fresh);
                assert!(!args.cached);
                assert!(args.command.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rm_requires_a_card() {
        assert!(Cli::try_parse_from(["nauta", "cards", "rm"]).is_err());
    }
}
