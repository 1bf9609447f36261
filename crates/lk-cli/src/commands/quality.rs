//! Quality command - load curated games and score their data quality

use anyhow::{Context, Result};
use chrono::Utc;
use lk_meta::games::{
    batch_update_quality_scores, quality_summary, update_quality_scores, upsert_games, GameRecord,
};
use lk_meta::quality_config::load_settings;

use crate::cli::{
    GlobalArgs, QualityArgs, QualityBatchArgs, QualityCommands, QualityLoadArgs, QualityScoreArgs,
    QualitySummaryArgs,
};
use crate::commands::common::{format_opt_f64, print_json, print_table};
use crate::context::RuntimeContext;

/// Execute the quality command
pub(crate) async fn execute(args: &QualityArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        QualityCommands::Load(load) => execute_load(load, global).await,
        QualityCommands::Score(score) => execute_score(score, global),
        QualityCommands::Batch(batch) => execute_batch(batch, global),
        QualityCommands::Summary(summary) => execute_summary(summary, global),
    }
}

async fn execute_load(args: &QualityLoadArgs, global: &GlobalArgs) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file))?;
    let games: Vec<GameRecord> =
        serde_json::from_str(&raw).with_context(|| format!("Invalid games file {}", args.file))?;

    let ctx = RuntimeContext::new(global)?;
    let report = upsert_games(&ctx.db, &games, Utc::now()).context("Failed to load games")?;
    println!(
        "Loaded {} games ({} new, {} updated)",
        games.len(),
        report.inserted,
        report.updated
    );
    Ok(())
}

fn execute_score(args: &QualityScoreArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let limit = match args.limit {
        Some(limit) => limit,
        None => {
            load_settings(ctx.db.conn())
                .context("Failed to read quality settings")?
                .default_batch_size
        }
    };
    let updated =
        update_quality_scores(&ctx.db, limit, Utc::now()).context("Quality scoring failed")?;
    println!("Scored {updated} games");
    Ok(())
}

fn execute_batch(args: &QualityBatchArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let batch_size = match args.batch_size {
        Some(size) => size,
        None => {
            load_settings(ctx.db.conn())
                .context("Failed to read quality settings")?
                .default_batch_size
        }
    };
    let report = batch_update_quality_scores(&ctx.db, batch_size, args.total_limit, Utc::now())
        .context("Batched quality scoring failed")?;
    if args.json {
        return print_json(&report);
    }

    let rows: Vec<Vec<String>> = report
        .batches
        .iter()
        .map(|b| {
            vec![
                b.batch_number.to_string(),
                b.updated.to_string(),
                b.cumulative.to_string(),
            ]
        })
        .collect();
    print_table(&["BATCH", "UPDATED", "CUMULATIVE"], &rows);
    println!(
        "\nScored {} games with settings version {}",
        report.total_updated, report.settings_version
    );
    Ok(())
}

fn execute_summary(args: &QualitySummaryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let summary = quality_summary(ctx.db.conn()).context("Failed to summarize quality")?;
    if args.json {
        return print_json(&summary);
    }

    let rows: Vec<Vec<String>> = summary
        .iter()
        .map(|t| {
            vec![
                t.quality_tier.clone(),
                t.games.to_string(),
                format_opt_f64(t.avg_confidence, 3),
            ]
        })
        .collect();
    print_table(&["TIER", "GAMES", "AVG_CONFIDENCE"], &rows);
    Ok(())
}
