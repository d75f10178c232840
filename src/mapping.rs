use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// One row returned by a backend: an input identifier and the value it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRecord {
    pub from: String,
    pub to: String,
}

impl MappingRecord {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Raw backend output before it is reduced to a 1:1 mapping.
///
/// `rows` may name the same `from` more than once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    pub rows: Vec<MappingRecord>,
    pub failed: BTreeSet<String>,
}

impl LookupTable {
    pub fn into_resolution(self) -> Resolution {
        let mapping = collapse_first_wins(self.rows);
        let unresolved = self
            .failed
            .into_iter()
            .filter(|id| !mapping.contains_key(id))
            .collect();
        Resolution {
            mapping,
            unresolved,
        }
    }
}

/// Builds an identifier set from anything string-like.
pub fn identifiers<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Reduces rows to a map keyed by `from`, keeping the first value seen for each key.
pub fn collapse_first_wins<I>(records: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = MappingRecord>,
{
    let mut mapping = BTreeMap::new();
    for record in records {
        mapping.entry(record.from).or_insert(record.to);
    }
    mapping
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub mapping: BTreeMap<String, String>,
    pub unresolved: BTreeSet<String>,
}

impl Resolution {
    /// Starts a resolution where every input is still outstanding.
    pub fn pending<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mapping: BTreeMap::new(),
            unresolved: inputs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Identifiers the next tier should be asked about.
    pub fn outstanding(&self) -> Vec<String> {
        self.unresolved.iter().cloned().collect()
    }

    /// Folds a later tier's mapping into this one.
    ///
    /// Keys already resolved are never overwritten. Newly resolved keys leave `unresolved`.
    /// Returns how many keys this tier contributed.
    pub fn merge_tier(&mut self, tier: BTreeMap<String, String>) -> usize {
        let mut added = 0;
        for (from, to) in tier {
            if self.mapping.contains_key(&from) {
                continue;
            }
            self.unresolved.remove(&from);
            self.mapping.insert(from, to);
            added += 1;
        }
        added
    }

    /// Marks identifiers unresolved unless some tier already produced a value for them.
    pub fn absorb_unresolved<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        for id in ids {
            if !self.mapping.contains_key(&id) {
                self.unresolved.insert(id);
            }
        }
    }

    /// Every identifier this resolution accounts for.
    pub fn covered(&self) -> BTreeSet<String> {
        self.mapping
            .keys()
            .chain(self.unresolved.iter())
            .cloned()
            .collect()
    }
}
