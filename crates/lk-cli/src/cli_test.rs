use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    Cli::command().debug_assert();
}

#[test]
fn parses_run_submit() {
    let cli = Cli::try_parse_from([
        "lk", "run", "submit", "--source", "sbd", "--records", "100", "--valid", "95",
        "--invalid", "5", "--confidence", "0.9", "--status", "partial",
    ])
    .unwrap();
    let Commands::Run(RunArgs {
        command: RunCommands::Submit(args),
    }) = cli.command
    else {
        panic!("expected run submit");
    };
    assert_eq!(args.source, "sbd");
    assert_eq!(args.valid, 95);
    assert_eq!(RunStatus::from(args.status), RunStatus::Partial);
    assert!(args.started_at.is_none());
}

#[test]
fn blank_source_rejected() {
    let result = Cli::try_parse_from([
        "lk", "run", "submit", "--source", "  ", "--records", "1", "--valid", "1",
        "--invalid", "0", "--confidence", "0.9",
    ]);
    assert!(result.is_err());
}

#[test]
fn global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["lk", "health", "show", "--database", ":memory:", "-v"]).unwrap();
    assert_eq!(cli.global.database.as_deref(), Some(":memory:"));
    assert!(cli.global.verbose);
    assert!(cli.global.config.is_none());
}

#[test]
fn identity_register_collects_providers() {
    let cli = Cli::try_parse_from([
        "lk", "identity", "register", "--canonical", "2024-06-01-NYY-BOS",
        "--provider", "action_network=an-1", "--provider", "mlb=745001",
        "--confidence", "0.95", "--primary", "mlb",
    ])
    .unwrap();
    let Commands::Identity(IdentityArgs {
        command: IdentityCommands::Register(args),
    }) = cli.command
    else {
        panic!("expected identity register");
    };
    assert_eq!(args.providers, vec!["action_network=an-1", "mlb=745001"]);
    assert_eq!(args.primary, Some(Provider::MlbStatsApi));
}

#[test]
fn unknown_alert_kind_rejected() {
    assert!(Cli::try_parse_from(["lk", "alerts", "list", "--kind", "outage"]).is_err());
    let cli = Cli::try_parse_from(["lk", "alerts", "list", "--kind", "dead_tuple"]).unwrap();
    let Commands::Alerts(AlertsArgs {
        command: AlertsCommands::List(args),
    }) = cli.command
    else {
        panic!("expected alerts list");
    };
    assert_eq!(args.kind, Some(AlertKind::DeadTuple));
}
