//! CLI argument definitions using clap derive API

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lk_core::{AlertKind, Provider, RunStatus, SourceName};

/// Linekeeper - collection health and data quality monitoring for the betting warehouse
#[derive(Parser, Debug)]
#[command(name = "lk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file [default: linekeeper.yml]
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override the monitoring database path (takes precedence over LK_DATABASE)
    #[arg(short, long, global = true)]
    pub database: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default linekeeper.yml and create the monitoring database
    Init(InitArgs),

    /// Report collection runs
    Run(RunArgs),

    /// Collection health per source
    Health(HealthArgs),

    /// Collection gap detection
    Gaps(GapsArgs),

    /// Table bloat sampling
    Deadtuples(DeadTuplesArgs),

    /// Inspect and manage alerts
    Alerts(AlertsArgs),

    /// Versioned quality scoring settings
    Config(ConfigArgs),

    /// Game data quality scoring
    Quality(QualityArgs),

    /// Canonical game identities across providers
    Identity(IdentityArgs),

    /// Scheduled job history
    Jobs(JobsArgs),

    /// Run the monitoring scheduler until interrupted
    Serve(ServeArgs),

    /// Query the monitoring database directly
    Meta(MetaArgs),
}

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: RunCommands,
}

#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// Record a finished collection run
    Submit(RunSubmitArgs),
}

/// Final status a collector may report
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatusArg {
    Success,
    Partial,
    Failed,
}

impl From<RunStatusArg> for RunStatus {
    fn from(arg: RunStatusArg) -> Self {
        match arg {
            RunStatusArg::Success => RunStatus::Success,
            RunStatusArg::Partial => RunStatus::Partial,
            RunStatusArg::Failed => RunStatus::Failed,
        }
    }
}

/// Arguments for run submit
#[derive(Args, Debug)]
pub struct RunSubmitArgs {
    /// Source that ran the collection
    #[arg(long)]
    pub source: SourceName,

    /// Records collected
    #[arg(long)]
    pub records: u64,

    /// Records that passed validation
    #[arg(long)]
    pub valid: u64,

    /// Records that failed validation
    #[arg(long)]
    pub invalid: u64,

    /// Collector confidence in the batch, between 0 and 1
    #[arg(long)]
    pub confidence: f64,

    /// Final status of the run
    #[arg(long, value_enum, default_value = "success")]
    pub status: RunStatusArg,

    /// Mean provider response time in milliseconds
    #[arg(long)]
    pub avg_response_ms: Option<f64>,

    /// Slowest provider response in milliseconds
    #[arg(long)]
    pub max_response_ms: Option<f64>,

    /// Error reported by the collector
    #[arg(long)]
    pub error: Option<String>,

    /// When the run started (RFC 3339), defaults to now
    #[arg(long)]
    pub started_at: Option<String>,
}

/// Arguments for the health command
#[derive(Args, Debug)]
pub struct HealthArgs {
    #[command(subcommand)]
    pub command: HealthCommands,
}

#[derive(Subcommand, Debug)]
pub enum HealthCommands {
    /// Show the current health of each source
    Show(HealthShowArgs),

    /// Recompute health for every source now
    Refresh,

    /// Snapshot history for one source
    History(HealthHistoryArgs),
}

#[derive(Args, Debug)]
pub struct HealthShowArgs {
    /// Only this source
    #[arg(long)]
    pub source: Option<SourceName>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct HealthHistoryArgs {
    /// Source to show
    pub source: SourceName,

    /// Maximum snapshots to show
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the gaps command
#[derive(Args, Debug)]
pub struct GapsArgs {
    #[command(subcommand)]
    pub command: GapsCommands,
}

#[derive(Subcommand, Debug)]
pub enum GapsCommands {
    /// Run gap detection for every source now
    Detect,

    /// List open gaps
    List(GapsListArgs),
}

#[derive(Args, Debug)]
pub struct GapsListArgs {
    /// Only this source
    #[arg(long)]
    pub source: Option<SourceName>,

    /// Include resolved gaps
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the deadtuples command
#[derive(Args, Debug)]
pub struct DeadTuplesArgs {
    #[command(subcommand)]
    pub command: DeadTuplesCommands,
}

#[derive(Subcommand, Debug)]
pub enum DeadTuplesCommands {
    /// Sample table statistics from a JSON feed
    Sweep(DeadTuplesSweepArgs),

    /// List recorded samples
    List(DeadTuplesListArgs),
}

#[derive(Args, Debug)]
pub struct DeadTuplesSweepArgs {
    /// Table statistics feed [default: dead_tuples.stats_feed]
    #[arg(long)]
    pub feed: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeadTuplesListArgs {
    /// Only samples taken on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Only tables that need a vacuum
    #[arg(long)]
    pub recommended: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the alerts command
#[derive(Args, Debug)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub command: AlertsCommands,
}

#[derive(Subcommand, Debug)]
pub enum AlertsCommands {
    /// List active alerts
    List(AlertsListArgs),

    /// Acknowledge an alert
    Ack(AlertsAckArgs),

    /// Resolve an alert
    Resolve(AlertsResolveArgs),
}

#[derive(Args, Debug)]
pub struct AlertsListArgs {
    /// Only alerts for this source (or schema.table)
    #[arg(long)]
    pub source: Option<String>,

    /// Only this alert kind (degradation, gap, dead_tuple, drift)
    #[arg(long, value_parser = AlertKind::parse)]
    pub kind: Option<AlertKind>,

    /// Include resolved alerts
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AlertsAckArgs {
    /// Alert id
    pub id: i64,

    /// Who is acknowledging
    #[arg(long)]
    pub by: String,
}

#[derive(Args, Debug)]
pub struct AlertsResolveArgs {
    /// Alert id
    pub id: i64,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// List every quality setting
    List(ConfigListArgs),

    /// Show one setting
    Get(ConfigGetArgs),

    /// Change a setting and record the change in the audit log
    Set(ConfigSetArgs),

    /// Show the change history
    Audit(ConfigAuditArgs),
}

#[derive(Args, Debug)]
pub struct ConfigListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigGetArgs {
    /// Setting name
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ConfigSetArgs {
    /// Setting name
    pub name: String,

    /// New value
    pub value: f64,

    /// Who is making the change
    #[arg(long)]
    pub by: String,
}

#[derive(Args, Debug)]
pub struct ConfigAuditArgs {
    /// Only changes to this setting
    pub name: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the quality command
#[derive(Args, Debug)]
pub struct QualityArgs {
    #[command(subcommand)]
    pub command: QualityCommands,
}

#[derive(Subcommand, Debug)]
pub enum QualityCommands {
    /// Upsert games from a JSON file
    Load(QualityLoadArgs),

    /// Score recently updated games once
    Score(QualityScoreArgs),

    /// Score recently updated games in batches
    Batch(QualityBatchArgs),

    /// Games per quality tier
    Summary(QualitySummaryArgs),
}

#[derive(Args, Debug)]
pub struct QualityLoadArgs {
    /// JSON array of games
    pub file: String,
}

#[derive(Args, Debug)]
pub struct QualityScoreArgs {
    /// Maximum games to score [default: default_batch_size setting]
    #[arg(long)]
    pub limit: Option<i64>,
}

#[derive(Args, Debug)]
pub struct QualityBatchArgs {
    /// Games per batch [default: default_batch_size setting]
    #[arg(long)]
    pub batch_size: Option<i64>,

    /// Stop after this many games
    #[arg(long)]
    pub total_limit: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct QualitySummaryArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the identity command
#[derive(Args, Debug)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub command: IdentityCommands,
}

#[derive(Subcommand, Debug)]
pub enum IdentityCommands {
    /// Register a canonical game with its provider ids
    Register(IdentityRegisterArgs),

    /// Attach another provider id to a game
    Map(IdentityMapArgs),

    /// Find the canonical game for a provider id
    Resolve(IdentityResolveArgs),

    /// Record a fresh verification
    Verify(IdentityVerifyArgs),

    /// Games with low confidence or a stale verification
    Review(IdentityReviewArgs),

    /// List every registered game
    List(IdentityListArgs),
}

#[derive(Args, Debug)]
pub struct IdentityRegisterArgs {
    /// Canonical game id
    #[arg(long)]
    pub canonical: String,

    /// Provider id as PROVIDER=EXTERNAL_ID (repeatable)
    #[arg(long = "provider", required = true)]
    pub providers: Vec<String>,

    /// Resolution confidence, between 0 and 1
    #[arg(long)]
    pub confidence: f64,

    /// Primary provider [default: first mapped provider in attribution order]
    #[arg(long, value_parser = Provider::parse)]
    pub primary: Option<Provider>,
}

#[derive(Args, Debug)]
pub struct IdentityMapArgs {
    /// Canonical game id
    pub canonical: String,

    /// Provider (action_network, vsin, sbd, mlb_stats_api)
    #[arg(value_parser = Provider::parse)]
    pub provider: Provider,

    /// Provider's id for the game
    pub external_id: String,
}

#[derive(Args, Debug)]
pub struct IdentityResolveArgs {
    /// Provider (action_network, vsin, sbd, mlb_stats_api)
    #[arg(value_parser = Provider::parse)]
    pub provider: Provider,

    /// Provider's id for the game
    pub external_id: String,
}

#[derive(Args, Debug)]
pub struct IdentityVerifyArgs {
    /// Canonical game id
    pub canonical: String,

    /// New resolution confidence, between 0 and 1
    #[arg(long)]
    pub confidence: f64,
}

#[derive(Args, Debug)]
pub struct IdentityReviewArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct IdentityListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the jobs command
#[derive(Args, Debug)]
pub struct JobsArgs {
    /// Only runs of this job
    #[arg(long)]
    pub job: Option<String>,

    /// Maximum runs to show
    #[arg(long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Run every job once and exit
    #[arg(long)]
    pub once: bool,
}

/// Arguments for the meta command
#[derive(Args, Debug)]
pub struct MetaArgs {
    #[command(subcommand)]
    pub command: MetaCommands,
}

#[derive(Subcommand, Debug)]
pub enum MetaCommands {
    /// Run a SQL query against the monitoring database
    Query(MetaQueryArgs),

    /// List tables and views with row counts
    Tables,

    /// Applied schema migrations
    Migrations,
}

#[derive(Args, Debug)]
pub struct MetaQueryArgs {
    /// SQL to execute
    pub sql: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
