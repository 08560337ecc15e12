//! Canonical identity mapping between Platform A and Platform B id spaces.
//!
//! The mapping dataset is a CSV table built offline; at runtime lookups are
//! exact hash-map hits only. Ids missing from the dataset resolve to a
//! namespaced pass-through (`"a:<id>"` / `"b:<id>"`) so every player is always
//! resolvable.

use crate::domain::{CanonicalPlayerId, CanonicalTeamId, PlatformSource};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const BUNDLED_DATASET: &str = include_str!("../data/id_map.csv");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Team,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read mapping dataset: {0}")]
    Io(String),
    #[error("invalid mapping row {row}: {message}")]
    InvalidRow { row: usize, message: String },
    #[error("platform id {platform}:{id} mapped to both {first} and {second}")]
    ConflictingMapping {
        platform: PlatformSource,
        id: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    kind: EntityKind,
    canonical_id: String,
    platform_a_id: Option<String>,
    platform_b_id: Option<String>,
    #[allow(dead_code)]
    name: Option<String>,
}

type ForwardKey = (EntityKind, PlatformSource, String);

/// Bidirectional platform-id <-> canonical-id table.
#[derive(Debug, Clone, Default)]
pub struct IdentityMapper {
    forward: HashMap<ForwardKey, String>,
    /// (kind, target platform, canonical id) -> smallest platform id.
    reverse: HashMap<ForwardKey, String>,
}

impl IdentityMapper {
    /// An empty mapper: every id resolves through the pass-through fallback.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the dataset bundled with the crate.
    pub fn bundled() -> Result<Self, IdentityError> {
        Self::from_reader(BUNDLED_DATASET.as_bytes())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, IdentityError> {
        let file = std::fs::File::open(path.as_ref())
            .map_err(|e| IdentityError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, IdentityError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut mapper = Self::empty();
        for (idx, record) in csv_reader.deserialize::<MappingRow>().enumerate() {
            // Header is line 1.
            let row = idx + 2;
            let record = record.map_err(|e| IdentityError::InvalidRow {
                row,
                message: e.to_string(),
            })?;
            if record.canonical_id.is_empty() {
                return Err(IdentityError::InvalidRow {
                    row,
                    message: "empty canonical_id".to_string(),
                });
            }

            let ids = [
                (PlatformSource::A, record.platform_a_id),
                (PlatformSource::B, record.platform_b_id),
            ];
            for (platform, id) in ids {
                let Some(id) = id.filter(|s| !s.is_empty()) else {
                    continue;
                };
                mapper.insert(record.kind, platform, id, &record.canonical_id)?;
            }
        }

        tracing::info!(entries = mapper.len(), "loaded identity mapping dataset");
        Ok(mapper)
    }

    fn insert(
        &mut self,
        kind: EntityKind,
        platform: PlatformSource,
        platform_id: String,
        canonical: &str,
    ) -> Result<(), IdentityError> {
        let key = (kind, platform, platform_id.clone());
        if let Some(existing) = self.forward.get(&key) {
            if existing != canonical {
                return Err(IdentityError::ConflictingMapping {
                    platform,
                    id: platform_id,
                    first: existing.clone(),
                    second: canonical.to_string(),
                });
            }
            return Ok(());
        }
        self.forward.insert(key, canonical.to_string());

        self.reverse
            .entry((kind, platform, canonical.to_string()))
            .and_modify(|current| {
                if platform_id < *current {
                    *current = platform_id.clone();
                }
            })
            .or_insert(platform_id);
        Ok(())
    }

    /// Number of platform ids with an explicit mapping.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Every explicit `(kind, platform, platform_id, canonical_id)` entry.
    pub fn entries(&self) -> impl Iterator<Item = (EntityKind, PlatformSource, &str, &str)> {
        self.forward
            .iter()
            .map(|((kind, platform, id), canonical)| (*kind, *platform, id.as_str(), canonical.as_str()))
    }

    fn resolve_raw(&self, kind: EntityKind, platform_id: &str, source: PlatformSource) -> String {
        let key = (kind, source, platform_id.to_string());
        match self.forward.get(&key) {
            Some(canonical) => canonical.clone(),
            None => format!("{}:{}", source.namespace(), platform_id),
        }
    }

    fn reverse_raw(&self, kind: EntityKind, canonical: &str, target: PlatformSource) -> Option<String> {
        let key = (kind, target, canonical.to_string());
        if let Some(id) = self.reverse.get(&key) {
            return Some(id.clone());
        }
        // Pass-through ids carry their own platform namespace.
        canonical
            .strip_prefix(target.namespace())
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Resolve a platform player id. Never fails.
    pub fn resolve(&self, platform_id: &str, source: PlatformSource) -> CanonicalPlayerId {
        CanonicalPlayerId::new(self.resolve_raw(EntityKind::Player, platform_id, source))
    }

    /// Platform id of a canonical player on `target`, if the player exists there.
    pub fn reverse(&self, canonical: &CanonicalPlayerId, target: PlatformSource) -> Option<String> {
        self.reverse_raw(EntityKind::Player, canonical.as_str(), target)
    }

    /// Resolve a roster slot occupant. Team defenses are rostered like
    /// players but keyed by their pro-team id, so a team mapping wins.
    pub fn resolve_rostered(&self, platform_id: &str, source: PlatformSource) -> CanonicalPlayerId {
        let key = (EntityKind::Team, source, platform_id.to_string());
        match self.forward.get(&key) {
            Some(canonical) => CanonicalPlayerId::new(canonical.clone()),
            None => self.resolve(platform_id, source),
        }
    }

    pub fn resolve_team(&self, platform_id: &str, source: PlatformSource) -> CanonicalTeamId {
        CanonicalTeamId::new(self.resolve_raw(EntityKind::Team, platform_id, source))
    }

    pub fn reverse_team(&self, canonical: &CanonicalTeamId, target: PlatformSource) -> Option<String> {
        self.reverse_raw(EntityKind::Team, canonical.as_str(), target)
    }
}
