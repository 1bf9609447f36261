//! Game identity reconciliation
//!
//! Every physical game has one canonical id. Each provider's own game id maps
//! to that canonical id so that cross-provider joins never need a lookup
//! chain at query time.

use crate::error::{ensure_unit_interval, CoreError, CoreResult};
use crate::newtype_string::define_identifier;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

define_identifier! {
    /// Canonical identifier of a physical game.
    pub struct CanonicalGameId("canonical_game_id");
}

/// External data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    ActionNetwork,
    Vsin,
    Sbd,
    MlbStatsApi,
}

impl Provider {
    /// All providers, in attribution order
    pub const ALL: [Provider; 4] = [
        Provider::ActionNetwork,
        Provider::Vsin,
        Provider::Sbd,
        Provider::MlbStatsApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::ActionNetwork => "action_network",
            Provider::Vsin => "vsin",
            Provider::Sbd => "sbd",
            Provider::MlbStatsApi => "mlb_stats_api",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "action_network" => Ok(Provider::ActionNetwork),
            "vsin" => Ok(Provider::Vsin),
            "sbd" => Ok(Provider::Sbd),
            "mlb_stats_api" | "mlb" => Ok(Provider::MlbStatsApi),
            other => Err(CoreError::UnknownLabel {
                kind: "provider",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review thresholds for identity mappings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Mappings below this confidence are flagged for re-verification
    #[serde(default = "default_reverify_below")]
    pub reverify_below: f64,

    /// Mappings not verified for longer than this are flagged stale
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,
}

fn default_reverify_below() -> f64 {
    0.8
}

fn default_stale_after_days() -> i64 {
    30
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            reverify_below: default_reverify_below(),
            stale_after_days: default_stale_after_days(),
        }
    }
}

impl IdentityConfig {
    pub(crate) fn validate(&self) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&self.reverify_below) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "identity.reverify_below must be within [0, 1], got {}",
                    self.reverify_below
                ),
            });
        }
        if self.stale_after_days <= 0 {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "identity.stale_after_days must be positive, got {}",
                    self.stale_after_days
                ),
            });
        }
        Ok(())
    }
}

/// A canonical game and its provider ids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameIdentity {
    pub canonical_id: CanonicalGameId,
    pub external_ids: BTreeMap<Provider, String>,
    pub resolution_confidence: f64,
    pub primary_source: Provider,
    pub last_verified_at: DateTime<Utc>,
}

impl GameIdentity {
    /// Build an identity, enforcing its invariants.
    ///
    /// At least one non-blank external id is required. `primary_source`
    /// defaults to the first mapped provider and must itself be mapped.
    pub fn new(
        canonical_id: CanonicalGameId,
        external_ids: BTreeMap<Provider, String>,
        resolution_confidence: f64,
        primary_source: Option<Provider>,
        last_verified_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        ensure_unit_interval("resolution_confidence", resolution_confidence)?;

        let mut cleaned = BTreeMap::new();
        for (provider, id) in external_ids {
            let id = id.trim();
            if id.is_empty() {
                return Err(CoreError::invalid(
                    provider.as_str(),
                    "external id must not be blank",
                ));
            }
            cleaned.insert(provider, id.to_string());
        }

        let Some(first) = cleaned.keys().next().copied() else {
            return Err(CoreError::MissingExternalId {
                canonical_id: canonical_id.into_inner(),
            });
        };

        let primary_source = primary_source.unwrap_or(first);
        if !cleaned.contains_key(&primary_source) {
            return Err(CoreError::invalid(
                "primary_source",
                format!("{primary_source} has no external id on this game"),
            ));
        }

        Ok(Self {
            canonical_id,
            external_ids: cleaned,
            resolution_confidence,
            primary_source,
            last_verified_at,
        })
    }

    /// External id for a provider
    pub fn external_id(&self, provider: Provider) -> Option<&str> {
        self.external_ids.get(&provider).map(String::as_str)
    }

    pub fn needs_reverification(&self, cfg: &IdentityConfig) -> bool {
        self.resolution_confidence < cfg.reverify_below
    }

    pub fn is_stale(&self, now: DateTime<Utc>, cfg: &IdentityConfig) -> bool {
        now - self.last_verified_at > Duration::days(cfg.stale_after_days)
    }

    /// Review flags for this identity at `now`
    pub fn review(&self, now: DateTime<Utc>, cfg: &IdentityConfig) -> ReviewFlags {
        ReviewFlags {
            needs_reverification: self.needs_reverification(cfg),
            stale: self.is_stale(now, cfg),
        }
    }
}

/// Why an identity needs attention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewFlags {
    pub needs_reverification: bool,
    pub stale: bool,
}

impl ReviewFlags {
    pub fn any(&self) -> bool {
        self.needs_reverification || self.stale
    }
}

/// In-memory lookup from provider ids to canonical ids.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_external: HashMap<(Provider, String), CanonicalGameId>,
    identities: HashMap<CanonicalGameId, GameIdentity>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity. Fails on a duplicate canonical id or when one of its
    /// external ids already belongs to another game; the index is unchanged
    /// on failure.
    pub fn insert(&mut self, identity: GameIdentity) -> CoreResult<()> {
        if self.identities.contains_key(&identity.canonical_id) {
            return Err(CoreError::DuplicateIdentity {
                canonical_id: identity.canonical_id.to_string(),
            });
        }
        for (provider, id) in &identity.external_ids {
            if let Some(existing) = self.by_external.get(&(*provider, id.clone())) {
                return Err(CoreError::IdentityConflict {
                    provider: provider.to_string(),
                    external_id: id.clone(),
                    existing: existing.to_string(),
                });
            }
        }
        for (provider, id) in &identity.external_ids {
            self.by_external
                .insert((*provider, id.clone()), identity.canonical_id.clone());
        }
        self.identities
            .insert(identity.canonical_id.clone(), identity);
        Ok(())
    }

    /// Resolve a provider id to its canonical id
    pub fn resolve(&self, provider: Provider, external_id: &str) -> Option<&CanonicalGameId> {
        self.by_external
            .get(&(provider, external_id.trim().to_string()))
    }

    pub fn get(&self, canonical_id: &str) -> Option<&GameIdentity> {
        self.identities.get(canonical_id)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl TryFrom<Vec<GameIdentity>> for IdentityIndex {
    type Error = CoreError;

    fn try_from(identities: Vec<GameIdentity>) -> CoreResult<Self> {
        let mut index = IdentityIndex::new();
        for identity in identities {
            index.insert(identity)?;
        }
        Ok(index)
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
