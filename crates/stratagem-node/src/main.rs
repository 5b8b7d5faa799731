//! # Stratagem
//!
//! Command-line tool and HTTP service for the Stratagem planner.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod commands;
mod scenario;
mod state;

use scenario::{load_catalog, Scenario};
use state::AppState;

/// Learn and evaluate action chains over a declarative action catalog
#[derive(Parser)]
#[command(name = "stratagem")]
#[command(about = "Learn and evaluate action chains over a declarative action catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args, Clone)]
pub struct CommonArgs {
    /// Action catalog (JSON)
    #[arg(long)]
    pub catalog: PathBuf,

    /// Planner configuration (JSON); defaults apply for anything omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a policy on a scenario and print the best plan it finds
    Train {
        #[command(flatten)]
        common: CommonArgs,

        /// Scenario with the initial state and goal (JSON)
        #[arg(long)]
        scenario: PathBuf,

        /// Override the number of training episodes
        #[arg(long)]
        episodes: Option<usize>,

        /// Override the number of worker threads
        #[arg(long)]
        parallelism: Option<usize>,

        /// Override the per-episode step budget
        #[arg(long)]
        max_steps: Option<usize>,

        /// Write the learned estimator to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Plan greedily with a previously saved estimator
    Plan {
        #[command(flatten)]
        common: CommonArgs,

        /// Scenario with the initial state and goal (JSON)
        #[arg(long)]
        scenario: PathBuf,

        /// Estimator written by `train --output`
        #[arg(long)]
        estimator: PathBuf,

        /// Step budget for the rollout
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Replay a fixed chain of actions and report its success rate
    Evaluate {
        #[command(flatten)]
        common: CommonArgs,

        /// Scenario with the initial state and goal (JSON)
        #[arg(long)]
        scenario: PathBuf,

        /// Comma-separated action identifiers
        #[arg(long, value_delimiter = ',', required = true)]
        chain: Vec<String>,

        /// Number of replays
        #[arg(long)]
        runs: Option<usize>,
    },
    /// Serve the HTTP API
    Serve {
        #[command(flatten)]
        common: CommonArgs,

        /// Scenario used when a request omits the initial state or goal
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: SocketAddr,
    },
}

/// Run the HTTP server.
async fn run_server(common: &CommonArgs, scenario: Option<PathBuf>, addr: SocketAddr) -> anyhow::Result<()> {
    let catalog = load_catalog(&common.catalog)?;
    let config = commands::load_config(common)?;
    let scenario = scenario.map(Scenario::from_file).transpose()?;

    let state = AppState::new(catalog, config, scenario)?;
    let app = api::router(state);

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            common,
            scenario,
            episodes,
            parallelism,
            max_steps,
            output,
        } => commands::train(
            &common,
            &scenario,
            commands::Overrides {
                episodes,
                parallelism,
                max_steps,
            },
            output.as_deref(),
        ),
        Commands::Plan {
            common,
            scenario,
            estimator,
            max_steps,
        } => commands::plan(&common, &scenario, &estimator, max_steps),
        Commands::Evaluate {
            common,
            scenario,
            chain,
            runs,
        } => commands::evaluate(&common, &scenario, &chain, runs),
        Commands::Serve {
            common,
            scenario,
            addr,
        } => run_server(&common, scenario, addr).await,
    }
}
