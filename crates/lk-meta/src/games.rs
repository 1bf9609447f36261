//! Curated games and their quality scores.
//!
//! A game is due for scoring when it was updated inside the trailing scoring
//! window and has not been scored since that update.

use crate::connection::MonitorDb;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::quality_config::load_settings;
use crate::row_helpers::{get_count, get_date, get_opt_parsed, get_opt_ts, get_ts, ts};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use duckdb::Connection;
use lk_core::quality::{
    next_batch_len, score_game, BatchReport, BatchResult, GameFields, QualitySettings, QualityTier,
};
use lk_core::CoreError;
use serde::{Deserialize, Serialize};

/// A curated game as loaded by collectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub game_date: NaiveDate,
    #[serde(flatten)]
    pub fields: GameFields,
}

impl GameRecord {
    fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("game_id", &self.game_id),
            ("home_team", &self.home_team),
            ("away_team", &self.away_team),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::invalid(name, "must not be blank"));
            }
        }
        Ok(())
    }
}

/// A stored game with its quality columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Game {
    #[serde(flatten)]
    pub record: GameRecord,
    pub quality_tier: Option<QualityTier>,
    pub confidence_score: Option<f64>,
    pub updated_at: DateTime<Utc>,
    pub quality_scored_at: Option<DateTime<Utc>>,
}

fn map_game(row: &duckdb::Row<'_>) -> duckdb::Result<Game> {
    Ok(Game {
        record: GameRecord {
            game_id: row.get(0)?,
            home_team: row.get(1)?,
            away_team: row.get(2)?,
            game_date: get_date(row, 3)?,
            fields: GameFields {
                home_score: row.get(4)?,
                away_score: row.get(5)?,
                external_id: row.get(6)?,
                venue: row.get(7)?,
            },
        },
        quality_tier: get_opt_parsed(row, 8, QualityTier::parse)?,
        confidence_score: row.get(9)?,
        updated_at: get_ts(row, 10)?,
        quality_scored_at: get_opt_ts(row, 11)?,
    })
}

/// Counts from one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
}

/// Insert or replace curated games, stamping `updated_at = now` so they
/// become due for scoring.
pub fn upsert_games(db: &MonitorDb, games: &[GameRecord], now: DateTime<Utc>) -> MetaResult<UpsertReport> {
    for game in games {
        game.validate()?;
    }

    db.transaction(|conn| {
        let mut report = UpsertReport::default();
        for game in games {
            let date = game.game_date.format("%Y-%m-%d").to_string();
            let f = &game.fields;
            let updated = conn
                .execute(
                    "UPDATE curated.games SET home_team = ?, away_team = ?,
                         game_date = CAST(? AS DATE), home_score = ?, away_score = ?,
                         external_id = ?, venue = ?, updated_at = CAST(? AS TIMESTAMP)
                     WHERE game_id = ?",
                    duckdb::params![
                        game.home_team,
                        game.away_team,
                        date,
                        f.home_score,
                        f.away_score,
                        f.external_id,
                        f.venue,
                        ts(&now),
                        game.game_id,
                    ],
                )
                .query_context("update game")?;
            if updated > 0 {
                report.updated += 1;
                continue;
            }
            conn.execute(
                "INSERT INTO curated.games (game_id, home_team, away_team, game_date,
                     home_score, away_score, external_id, venue, updated_at)
                 VALUES (?, ?, ?, CAST(? AS DATE), ?, ?, ?, ?, CAST(? AS TIMESTAMP))",
                duckdb::params![
                    game.game_id,
                    game.home_team,
                    game.away_team,
                    date,
                    f.home_score,
                    f.away_score,
                    f.external_id,
                    f.venue,
                    ts(&now),
                ],
            )
            .query_context("insert game")?;
            report.inserted += 1;
        }
        Ok(report)
    })
}

/// Fetch one game.
pub fn get_game(conn: &Connection, game_id: &str) -> MetaResult<Option<Game>> {
    match conn.query_row(
        "SELECT game_id, home_team, away_team, CAST(game_date AS VARCHAR), home_score,
             away_score, external_id, venue, quality_tier, confidence_score,
             epoch_us(updated_at), epoch_us(quality_scored_at)
         FROM curated.games WHERE game_id = ?",
        duckdb::params![game_id],
        map_game,
    ) {
        Ok(game) => Ok(Some(game)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MetaError::QueryError(format!("select game: {e}"))),
    }
}

/// Score up to `limit` due games with `settings`. Returns how many were
/// updated.
fn score_due(
    conn: &Connection,
    settings: &QualitySettings,
    limit: i64,
    now: DateTime<Utc>,
) -> MetaResult<i64> {
    let window_start = now - Duration::minutes(settings.scoring_window_minutes);
    let sql = format!(
        "SELECT game_id, home_score, away_score, external_id, venue
         FROM curated.games
         WHERE updated_at >= CAST(? AS TIMESTAMP)
           AND (quality_scored_at IS NULL OR quality_scored_at < updated_at)
         ORDER BY updated_at, game_id
         LIMIT {limit}"
    );
    let mut stmt = conn.prepare(&sql).query_context("prepare due games")?;
    let due = stmt
        .query_map(duckdb::params![ts(&window_start)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                GameFields {
                    home_score: row.get(1)?,
                    away_score: row.get(2)?,
                    external_id: row.get(3)?,
                    venue: row.get(4)?,
                },
            ))
        })
        .query_context("query due games")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect due games")?;

    let mut updated = 0;
    for (game_id, fields) in &due {
        let score = score_game(fields, settings);
        // A game stamped ahead of `now` must still count as scored.
        updated += conn
            .execute(
                "UPDATE curated.games SET quality_tier = ?, confidence_score = ?,
                     quality_scored_at = GREATEST(CAST(? AS TIMESTAMP), updated_at)
                 WHERE game_id = ?",
                duckdb::params![score.tier.as_str(), score.confidence, ts(&now), game_id],
            )
            .query_context("update game score")? as i64;
    }
    Ok(updated)
}

/// Score at most `limit` due games in one pass.
pub fn update_quality_scores(db: &MonitorDb, limit: i64, now: DateTime<Utc>) -> MetaResult<i64> {
    QualitySettings::validate_limit(limit)?;
    let settings = load_settings(db.conn())?;
    let updated = db.transaction(|conn| score_due(conn, &settings, limit, now))?;
    log::info!("Scored {updated} games (settings v{})", settings.version);
    Ok(updated)
}

/// Score due games in batches until a batch updates nothing or
/// `total_limit` games were scored.
///
/// Settings are read once, so every batch uses the same version. Each batch
/// commits on its own.
pub fn batch_update_quality_scores(
    db: &MonitorDb,
    batch_size: i64,
    total_limit: i64,
    now: DateTime<Utc>,
) -> MetaResult<BatchReport> {
    let settings = load_settings(db.conn())?;
    settings.validate_batch(batch_size, total_limit)?;

    let mut report = BatchReport {
        settings_version: settings.version,
        ..BatchReport::default()
    };
    let mut batch_number = 0;
    while let Some(len) = next_batch_len(batch_size, total_limit, report.total_updated) {
        let updated = db.transaction(|conn| score_due(conn, &settings, len, now))?;
        if updated == 0 {
            break;
        }
        batch_number += 1;
        report.total_updated += updated;
        log::info!(
            "Batch {batch_number}: scored {updated} games ({} total)",
            report.total_updated
        );
        report.batches.push(BatchResult {
            batch_number,
            updated,
            cumulative: report.total_updated,
        });
    }
    Ok(report)
}

/// Game count per tier, unscored games under `UNSCORED`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSummary {
    pub quality_tier: String,
    pub games: u64,
    pub avg_confidence: Option<f64>,
}

/// Summarize curated games by quality tier, best tier first.
pub fn quality_summary(conn: &Connection) -> MetaResult<Vec<TierSummary>> {
    let mut stmt = conn
        .prepare(
            "SELECT quality_tier, games, avg_confidence FROM lk_meta.v_quality_summary
             ORDER BY CASE quality_tier
                 WHEN 'HIGH' THEN 1 WHEN 'MEDIUM' THEN 2 WHEN 'LOW' THEN 3
                 WHEN 'MINIMAL' THEN 4 ELSE 5 END",
        )
        .query_context("prepare quality summary")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TierSummary {
                quality_tier: row.get(0)?,
                games: get_count(row, 1)?,
                avg_confidence: row.get(2)?,
            })
        })
        .query_context("query quality summary")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect quality summary")?;
    Ok(rows)
}

#[cfg(test)]
#[path = "games_test.rs"]
mod tests;
