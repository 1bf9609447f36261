//! Canonical game identities and provider id mappings.
//!
//! `game_id_mappings` is keyed by (provider, external_id), so an external id
//! can never point at two games. Conflicts are detected up front to report
//! which game already owns the id.

use crate::connection::MonitorDb;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{get_parsed, get_ts, ts};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use lk_core::error::ensure_unit_interval;
use lk_core::identity::ReviewFlags;
use lk_core::{CanonicalGameId, CoreError, GameIdentity, IdentityConfig, IdentityIndex, Provider};
use serde::Serialize;
use std::collections::BTreeMap;

struct IdentityRow {
    canonical_id: CanonicalGameId,
    resolution_confidence: f64,
    primary_source: Provider,
    last_verified_at: DateTime<Utc>,
}

const IDENTITY_COLUMNS: &str =
    "canonical_game_id, resolution_confidence, primary_source, epoch_us(last_verified_at)";

fn map_identity_row(row: &duckdb::Row<'_>) -> duckdb::Result<IdentityRow> {
    Ok(IdentityRow {
        canonical_id: get_parsed(row, 0, CanonicalGameId::parse)?,
        resolution_confidence: row.get(1)?,
        primary_source: get_parsed(row, 2, Provider::parse)?,
        last_verified_at: get_ts(row, 3)?,
    })
}

fn mappings_for(conn: &Connection, canonical_id: &str) -> MetaResult<BTreeMap<Provider, String>> {
    let mut stmt = conn
        .prepare(
            "SELECT provider, external_id FROM lk_meta.game_id_mappings
             WHERE canonical_game_id = ?",
        )
        .query_context("prepare game id mappings")?;
    let pairs = stmt
        .query_map(duckdb::params![canonical_id], |row| {
            Ok((get_parsed(row, 0, Provider::parse)?, row.get::<_, String>(1)?))
        })
        .query_context("query game id mappings")?
        .collect::<Result<BTreeMap<_, _>, _>>()
        .query_context("collect game id mappings")?;
    Ok(pairs)
}

fn assemble(row: IdentityRow, external_ids: BTreeMap<Provider, String>) -> MetaResult<GameIdentity> {
    Ok(GameIdentity::new(
        row.canonical_id,
        external_ids,
        row.resolution_confidence,
        Some(row.primary_source),
        row.last_verified_at,
    )?)
}

/// Canonical id currently owning (provider, external_id).
fn owner_of(conn: &Connection, provider: Provider, external_id: &str) -> MetaResult<Option<String>> {
    match conn.query_row(
        "SELECT canonical_game_id FROM lk_meta.game_id_mappings
         WHERE provider = ? AND external_id = ?",
        duckdb::params![provider.as_str(), external_id],
        |row| row.get(0),
    ) {
        Ok(canonical) => Ok(Some(canonical)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MetaError::QueryError(format!("select mapping owner: {e}"))),
    }
}

fn insert_mapping(
    conn: &Connection,
    canonical_id: &str,
    provider: Provider,
    external_id: &str,
    now: DateTime<Utc>,
) -> MetaResult<()> {
    conn.execute(
        "INSERT INTO lk_meta.game_id_mappings (provider, external_id, canonical_game_id, created_at)
         VALUES (?, ?, ?, CAST(? AS TIMESTAMP))",
        duckdb::params![provider.as_str(), external_id, canonical_id, ts(&now)],
    )
    .query_context("insert game id mapping")?;
    Ok(())
}

/// Persist a new identity with all of its provider ids.
///
/// Fails with `DuplicateIdentity` when the canonical id exists and with
/// `IdentityConflict` when any external id belongs to another game. Nothing
/// is written on failure.
pub fn register_identity(db: &MonitorDb, identity: &GameIdentity, now: DateTime<Utc>) -> MetaResult<()> {
    let canonical = identity.canonical_id.as_str();
    db.transaction(|conn| {
        if get_identity(conn, canonical)?.is_some() {
            return Err(CoreError::DuplicateIdentity {
                canonical_id: canonical.to_string(),
            }
            .into());
        }
        for (provider, external_id) in &identity.external_ids {
            if let Some(existing) = owner_of(conn, *provider, external_id)? {
                return Err(CoreError::IdentityConflict {
                    provider: provider.to_string(),
                    external_id: external_id.clone(),
                    existing,
                }
                .into());
            }
        }

        conn.execute(
            "INSERT INTO lk_meta.game_identities (canonical_game_id, resolution_confidence,
                 primary_source, last_verified_at, created_at)
             VALUES (?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            duckdb::params![
                canonical,
                identity.resolution_confidence,
                identity.primary_source.as_str(),
                ts(&identity.last_verified_at),
                ts(&now),
            ],
        )
        .query_context("insert game identity")?;
        for (provider, external_id) in &identity.external_ids {
            insert_mapping(conn, canonical, *provider, external_id, now)?;
        }
        Ok(())
    })?;
    log::info!(
        "Registered game {canonical} with {} provider ids",
        identity.external_ids.len()
    );
    Ok(())
}

/// Attach a provider id to an existing identity.
///
/// Returns `false` when the exact mapping already exists. A provider that
/// already has a different id on this game is rejected.
pub fn add_mapping(
    db: &MonitorDb,
    canonical_id: &str,
    provider: Provider,
    external_id: &str,
    now: DateTime<Utc>,
) -> MetaResult<bool> {
    let external_id = external_id.trim();
    if external_id.is_empty() {
        return Err(CoreError::invalid(provider.as_str(), "external id must not be blank").into());
    }

    db.transaction(|conn| {
        let identity = get_identity(conn, canonical_id)?.ok_or_else(|| MetaError::NotFound {
            entity: "game identity",
            key: canonical_id.to_string(),
        })?;

        match owner_of(conn, provider, external_id)? {
            Some(existing) if existing == identity.canonical_id.as_str() => return Ok(false),
            Some(existing) => {
                return Err(CoreError::IdentityConflict {
                    provider: provider.to_string(),
                    external_id: external_id.to_string(),
                    existing,
                }
                .into())
            }
            None => {}
        }
        if let Some(current) = identity.external_id(provider) {
            return Err(CoreError::invalid(
                provider.as_str(),
                format!("{canonical_id} already has {provider} id '{current}'"),
            )
            .into());
        }

        insert_mapping(conn, canonical_id, provider, external_id, now)?;
        Ok(true)
    })
}

/// Resolve a provider id to its canonical game.
pub fn resolve(conn: &Connection, provider: Provider, external_id: &str) -> MetaResult<Option<CanonicalGameId>> {
    owner_of(conn, provider, external_id.trim())?
        .map(|id| CanonicalGameId::parse(&id).map_err(MetaError::from))
        .transpose()
}

/// Fetch one identity with its mappings.
pub fn get_identity(conn: &Connection, canonical_id: &str) -> MetaResult<Option<GameIdentity>> {
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM lk_meta.game_identities WHERE canonical_game_id = ?");
    let row = match conn.query_row(&sql, duckdb::params![canonical_id], map_identity_row) {
        Ok(row) => row,
        Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(MetaError::QueryError(format!("select game identity: {e}"))),
    };
    let mappings = mappings_for(conn, canonical_id)?;
    assemble(row, mappings).map(Some)
}

/// Every identity, ordered by canonical id.
pub fn list_identities(conn: &Connection) -> MetaResult<Vec<GameIdentity>> {
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM lk_meta.game_identities ORDER BY canonical_game_id");
    let mut stmt = conn.prepare(&sql).query_context("prepare game identities")?;
    let rows = stmt
        .query_map([], map_identity_row)
        .query_context("query game identities")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect game identities")?;

    let mut stmt = conn
        .prepare("SELECT canonical_game_id, provider, external_id FROM lk_meta.game_id_mappings")
        .query_context("prepare game id mappings")?;
    let mut mappings: BTreeMap<String, BTreeMap<Provider, String>> = BTreeMap::new();
    let pairs = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                get_parsed(row, 1, Provider::parse)?,
                row.get::<_, String>(2)?,
            ))
        })
        .query_context("query game id mappings")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect game id mappings")?;
    for (canonical, provider, external_id) in pairs {
        mappings.entry(canonical).or_default().insert(provider, external_id);
    }

    rows.into_iter()
        .map(|row| {
            let ids = mappings.remove(row.canonical_id.as_str()).unwrap_or_default();
            assemble(row, ids)
        })
        .collect()
}

/// Record a fresh verification of an identity.
pub fn verify(
    db: &MonitorDb,
    canonical_id: &str,
    confidence: f64,
    now: DateTime<Utc>,
) -> MetaResult<GameIdentity> {
    ensure_unit_interval("resolution_confidence", confidence)?;
    let identity = db.transaction(|conn| {
        let updated = conn
            .execute(
                "UPDATE lk_meta.game_identities
                 SET resolution_confidence = ?, last_verified_at = CAST(? AS TIMESTAMP)
                 WHERE canonical_game_id = ?",
                duckdb::params![confidence, ts(&now), canonical_id],
            )
            .query_context("verify game identity")?;
        if updated == 0 {
            return Err(MetaError::NotFound {
                entity: "game identity",
                key: canonical_id.to_string(),
            });
        }
        get_identity(conn, canonical_id)?.ok_or_else(|| MetaError::NotFound {
            entity: "game identity",
            key: canonical_id.to_string(),
        })
    })?;
    log::info!("Verified game {canonical_id} at confidence {confidence:.2}");
    Ok(identity)
}

/// An identity flagged for review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityReview {
    pub identity: GameIdentity,
    pub flags: ReviewFlags,
}

/// Identities with low confidence or a stale verification.
pub fn review_identities(
    conn: &Connection,
    now: DateTime<Utc>,
    cfg: &IdentityConfig,
) -> MetaResult<Vec<IdentityReview>> {
    Ok(list_identities(conn)?
        .into_iter()
        .filter_map(|identity| {
            let flags = identity.review(now, cfg);
            flags.any().then_some(IdentityReview { identity, flags })
        })
        .collect())
}

/// Load every identity into an in-memory index.
pub fn load_index(conn: &Connection) -> MetaResult<IdentityIndex> {
    Ok(IdentityIndex::try_from(list_identities(conn)?)?)
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
