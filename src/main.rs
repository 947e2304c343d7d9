use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use follow_graph_lib::commands;
use follow_graph_lib::extractor::{CellSelectors, HtmlExtractor};
use follow_graph_lib::input_loader::load_target_set;
use follow_graph_lib::{logger, Config, HttpSession, RunError, SessionProvider, StopSignal};

#[derive(Parser)]
#[command(name = "follow-graph", version, about = "Harvest who-follows-whom into a resumable graph")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect your own following and write the selection export
    #[command(name = "self")]
    SelfFollowing,

    /// Collect the following of every account in a list file
    Targets {
        /// One username per line
        list: PathBuf,

        #[arg(long, default_value = "targets")]
        namespace: String,

        /// Union with the existing aggregate and skip sources it already holds
        #[arg(long)]
        merge: bool,
    },

    /// Collect the members of a list, then their following
    ListMembers {
        list_id: String,

        #[arg(long, default_value = "list")]
        namespace: String,
    },

    /// Write selected_users.txt from the export's fetch_followers column
    Select,

    /// Print the ranking of an existing aggregate
    Rank {
        #[arg(long, default_value = "targets")]
        namespace: String,

        #[arg(long, default_value_t = 20)]
        top: usize,
    },
}

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    logger::init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    info!("Starting follow-graph...");
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    let config = cli.config;
    config.validate()?;

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        if let Err(e) = ctrlc::set_handler(move || stop.raise()) {
            warn!("Failed to set Ctrl-C handler: {}", e);
        }
    }

    // Offline commands and input checks come before any session exists.
    let targets = match &cli.command {
        Command::Select => {
            commands::select(&config)?;
            return Ok(());
        }
        Command::Rank { namespace, top } => {
            commands::rank(&config, namespace, *top)?;
            return Ok(());
        }
        Command::Targets { list, .. } => Some(load_target_set(list)?),
        Command::SelfFollowing | Command::ListMembers { .. } => None,
    };

    let extractor = HtmlExtractor::new(&CellSelectors::default())
        .map_err(|e| RunError::Config(e.to_string()))?;

    info!("Starting session...");
    let mut session = HttpSession::connect(
        &config.base_url,
        config.auth_token.as_deref(),
        &config.user_agent,
        config.request_timeout(),
    )?;

    let result = match cli.command {
        Command::SelfFollowing => {
            commands::collect_self(&mut session, &extractor, &config, &stop).map(|_| ())
        }
        Command::Targets {
            namespace, merge, ..
        } => commands::run_targets(
            &mut session,
            &extractor,
            &config,
            targets.as_deref().unwrap_or_default(),
            &namespace,
            merge,
            &stop,
        )
        .map(|_| ()),
        Command::ListMembers { list_id, namespace } => {
            commands::run_list_members(&mut session, &extractor, &config, &list_id, &namespace, &stop)
                .map(|_| ())
        }
        Command::Select | Command::Rank { .. } => Ok(()),
    };

    session.close();
    result
}
