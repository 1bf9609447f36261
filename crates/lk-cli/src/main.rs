//! Linekeeper CLI - monitoring for the betting data warehouse

use clap::Parser;

mod cli;
mod commands;
mod context;
mod logging;
mod scheduler;
mod stats_feed;

use cli::{Cli, Commands};
use commands::common::ExitCode;
use commands::{
    alerts, config, deadtuples, gaps, health, identity, init, jobs, meta, quality, run, serve,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.global.verbose {
        "debug"
    } else if matches!(cli.command, Commands::Serve(_)) {
        "info"
    } else {
        "warn"
    };
    logging::init(level);

    let result = match &cli.command {
        Commands::Init(args) => init::execute(args, &cli.global).await,
        Commands::Run(args) => run::execute(args, &cli.global).await,
        Commands::Health(args) => health::execute(args, &cli.global).await,
        Commands::Gaps(args) => gaps::execute(args, &cli.global).await,
        Commands::Deadtuples(args) => deadtuples::execute(args, &cli.global).await,
        Commands::Alerts(args) => alerts::execute(args, &cli.global).await,
        Commands::Config(args) => config::execute(args, &cli.global).await,
        Commands::Quality(args) => quality::execute(args, &cli.global).await,
        Commands::Identity(args) => identity::execute(args, &cli.global).await,
        Commands::Jobs(args) => jobs::execute(args, &cli.global).await,
        Commands::Serve(args) => serve::execute(args, &cli.global).await,
        Commands::Meta(args) => meta::execute(args, &cli.global).await,
    };

    if let Err(err) = result {
        if let Some(ExitCode(code)) = err.downcast_ref::<ExitCode>() {
            std::process::exit(*code);
        }
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
