//! Raw stat records and the static stat dictionary.
//!
//! Each platform names box-score stats differently: Platform A uses numeric
//! stat ids ("53"), Platform B uses short string keys ("rec"). The dictionary
//! maps both onto one canonical vocabulary that scoring rulesets are keyed by.

use super::primitives::{CanonicalPlayerId, PlatformSource, Week};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a stat line is still accumulating or final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatSource {
    Live,
    Final,
}

/// Platform-native stats for one player in one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatRecord {
    pub player: CanonicalPlayerId,
    pub platform: PlatformSource,
    pub week: Week,
    pub source: StatSource,
    /// Native stat key -> value.
    pub stats: BTreeMap<String, f64>,
}

impl RawStatRecord {
    pub fn new(
        player: CanonicalPlayerId,
        platform: PlatformSource,
        week: Week,
        source: StatSource,
        stats: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            player,
            platform,
            week,
            source,
            stats,
        }
    }

    /// Stats re-keyed by canonical stat key. Native keys that share a
    /// canonical key are summed; unknown keys are dropped.
    pub fn canonical_stats(&self) -> BTreeMap<&'static str, f64> {
        StatDictionary::canonicalize(self.platform, &self.stats)
    }
}

/// Static mapping tables from platform stat identifiers to canonical keys.
pub struct StatDictionary;

impl StatDictionary {
    /// Canonical key for a platform-native stat identifier.
    pub fn canonical_key(source: PlatformSource, native: &str) -> Option<&'static str> {
        match source {
            PlatformSource::A => platform_a_key(native),
            PlatformSource::B => platform_b_key(native),
        }
    }

    /// Human-readable label for a canonical key.
    pub fn label(key: &str) -> &'static str {
        CANONICAL_LABELS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, label)| *label)
            .unwrap_or("Other")
    }

    /// Whether `key` is part of the canonical vocabulary.
    pub fn is_canonical(key: &str) -> bool {
        CANONICAL_LABELS.iter().any(|(k, _)| *k == key)
    }

    pub fn canonicalize(
        source: PlatformSource,
        stats: &BTreeMap<String, f64>,
    ) -> BTreeMap<&'static str, f64> {
        let mut out = BTreeMap::new();
        for (native, value) in stats {
            match Self::canonical_key(source, native) {
                Some(key) => *out.entry(key).or_insert(0.0) += *value,
                None => tracing::trace!(platform = %source, stat = %native, "unmapped stat key"),
            }
        }
        out
    }
}

const CANONICAL_LABELS: &[(&str, &str)] = &[
    ("pass_yd", "Passing Yards"),
    ("pass_td", "Passing TDs"),
    ("pass_int", "Interceptions Thrown"),
    ("pass_2pt", "Passing 2PT Conversions"),
    ("rush_yd", "Rushing Yards"),
    ("rush_td", "Rushing TDs"),
    ("rush_2pt", "Rushing 2PT Conversions"),
    ("rec", "Receptions"),
    ("rec_yd", "Receiving Yards"),
    ("rec_td", "Receiving TDs"),
    ("rec_2pt", "Receiving 2PT Conversions"),
    ("fum_lost", "Fumbles Lost"),
    ("fgm_0_19", "Field Goals Made (0-19)"),
    ("fgm_20_29", "Field Goals Made (20-29)"),
    ("fgm_30_39", "Field Goals Made (30-39)"),
    ("fgm_0_39", "Field Goals Made (0-39)"),
    ("fgm_40_49", "Field Goals Made (40-49)"),
    ("fgm_50p", "Field Goals Made (50+)"),
    ("fgmiss", "Field Goals Missed"),
    ("xpm", "Extra Points Made"),
    ("xpmiss", "Extra Points Missed"),
    ("def_td", "Defensive TDs"),
    ("def_int", "Defensive Interceptions"),
    ("def_fum_rec", "Fumble Recoveries"),
    ("def_sack", "Sacks"),
    ("def_safety", "Safeties"),
    ("fantasy_points", "Fantasy Points Earned"),
];

fn platform_a_key(native: &str) -> Option<&'static str> {
    let key = match native {
        "3" => "pass_yd",
        "4" => "pass_td",
        "19" => "pass_2pt",
        "20" => "pass_int",
        "24" => "rush_yd",
        "25" => "rush_td",
        "26" => "rush_2pt",
        "42" => "rec_yd",
        "43" => "rec_td",
        "44" => "rec_2pt",
        "53" => "rec",
        "72" => "fum_lost",
        "74" => "fgm_50p",
        "77" => "fgm_40_49",
        "80" => "fgm_0_39",
        "85" => "fgmiss",
        "86" => "xpm",
        "88" => "xpmiss",
        "94" => "def_td",
        "95" => "def_int",
        "96" => "def_fum_rec",
        "98" => "def_safety",
        "99" => "def_sack",
        _ => return None,
    };
    Some(key)
}

fn platform_b_key(native: &str) -> Option<&'static str> {
    let key = match native {
        "pass_yd" => "pass_yd",
        "pass_td" => "pass_td",
        "pass_int" => "pass_int",
        "pass_2pt" => "pass_2pt",
        "rush_yd" => "rush_yd",
        "rush_td" => "rush_td",
        "rush_2pt" => "rush_2pt",
        "rec" => "rec",
        "rec_yd" => "rec_yd",
        "rec_td" => "rec_td",
        "rec_2pt" => "rec_2pt",
        "fum_lost" => "fum_lost",
        "fgm_0_19" => "fgm_0_19",
        "fgm_20_29" => "fgm_20_29",
        "fgm_30_39" => "fgm_30_39",
        "fgm_40_49" => "fgm_40_49",
        "fgm_50p" => "fgm_50p",
        "fgmiss" => "fgmiss",
        "xpm" => "xpm",
        "xpmiss" => "xpmiss",
        "def_td" => "def_td",
        "int" => "def_int",
        "fum_rec" => "def_fum_rec",
        "sack" => "def_sack",
        "safe" => "def_safety",
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_a_numeric_ids() {
        assert_eq!(StatDictionary::canonical_key(PlatformSource::A, "53"), Some("rec"));
        assert_eq!(StatDictionary::canonical_key(PlatformSource::A, "42"), Some("rec_yd"));
        assert_eq!(StatDictionary::canonical_key(PlatformSource::A, "9999"), None);
    }

    #[test]
    fn test_platform_b_keys() {
        assert_eq!(StatDictionary::canonical_key(PlatformSource::B, "rec"), Some("rec"));
        assert_eq!(StatDictionary::canonical_key(PlatformSource::B, "sack"), Some("def_sack"));
        assert_eq!(StatDictionary::canonical_key(PlatformSource::B, "53"), None);
    }

    #[test]
    fn test_every_mapped_key_is_canonical() {
        for id in 0..200 {
            if let Some(key) = StatDictionary::canonical_key(PlatformSource::A, &id.to_string()) {
                assert!(StatDictionary::is_canonical(key), "{} not canonical", key);
            }
        }
    }

    #[test]
    fn test_canonicalize_keeps_distance_bands_apart() {
        let mut stats = BTreeMap::new();
        stats.insert("fgm_0_19".to_string(), 1.0);
        stats.insert("fgm_30_39".to_string(), 2.0);
        stats.insert("bonus_unknown".to_string(), 7.0);
        let out = StatDictionary::canonicalize(PlatformSource::B, &stats);
        assert_eq!(out.get("fgm_0_19"), Some(&1.0));
        assert_eq!(out.get("fgm_30_39"), Some(&2.0));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_labels() {
        assert_eq!(StatDictionary::label("rec_yd"), "Receiving Yards");
        assert_eq!(StatDictionary::label("nope"), "Other");
    }
}
