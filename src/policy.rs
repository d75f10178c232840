use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::MapperError;
use crate::mapping::Resolution;

/// Which refreshed identifiers survive into the caller's map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Only identifiers whose refreshed value differs from the input.
    Updated,
    /// Every identifier the backend returned, changed or not.
    #[default]
    Present,
    /// Every input identifier; those without a value map to `None`.
    All,
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionPolicy::Updated => write!(f, "updated"),
            RetentionPolicy::Present => write!(f, "present"),
            RetentionPolicy::All => write!(f, "all"),
        }
    }
}

impl FromStr for RetentionPolicy {
    type Err = MapperError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "updated" => Ok(RetentionPolicy::Updated),
            "present" => Ok(RetentionPolicy::Present),
            "all" => Ok(RetentionPolicy::All),
            _ => Err(MapperError::InvalidRetention(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub mapping: BTreeMap<String, Option<String>>,
    pub unresolved: BTreeSet<String>,
}

impl RefreshOutcome {
    /// Entries that carry a value.
    pub fn resolved(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping
            .iter()
            .filter_map(|(from, to)| to.as_deref().map(|to| (from.as_str(), to)))
    }
}

/// Post-processes a refresh resolution.
///
/// `unresolved` is passed through untouched for every policy, so `All` lists a failed
/// identifier both as a `None` entry and in `unresolved`.
pub fn apply(resolution: Resolution, policy: RetentionPolicy) -> RefreshOutcome {
    let Resolution {
        mapping,
        unresolved,
    } = resolution;

    let mut retained: BTreeMap<String, Option<String>> = mapping
        .into_iter()
        .filter(|(from, to)| policy != RetentionPolicy::Updated || from != to)
        .map(|(from, to)| (from, Some(to)))
        .collect();

    if policy == RetentionPolicy::All {
        for id in &unresolved {
            retained.entry(id.clone()).or_insert(None);
        }
    }

    RefreshOutcome {
        mapping: retained,
        unresolved,
    }
}
