//! Four-stage refresh of gene symbols against the symbol authority.
//!
//! Stages run strictly in order, each one seeing only what the previous stages left
//! unresolved: approved symbols, full-name search, previous symbols, aliases. The per-item
//! stages cost one request per identifier.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::backends::aggregator::query_batched;
use crate::backends::{AggregatorService, SymbolRegistry};
use crate::config::EngineSettings;
use crate::error::MapperError;
use crate::mapping::Resolution;
use crate::timer::TaskTimer;

/// Aggregator scopes searched when an input looks like a gene's full name.
pub const NAME_SCOPES: &str = "name,other_names";

pub fn resolve_symbols<S, G>(
    registry: &S,
    aggregator: &G,
    ids: &[String],
    settings: &EngineSettings,
    timer: &mut dyn TaskTimer,
) -> Result<Resolution, MapperError>
where
    S: SymbolRegistry + ?Sized,
    G: AggregatorService + ?Sized,
{
    let mut resolution = Resolution::pending(ids.iter().cloned());
    if resolution.is_complete() {
        return Ok(resolution);
    }

    info!(stage = "approved", pending = resolution.unresolved.len(), "symbol refresh");
    timer.start("symbols: approved");
    let approved = registry.approved_symbols()?;
    resolution.merge_tier(approved_stage(&resolution.unresolved, &approved));
    timer.end("symbols: approved");

    if !resolution.is_complete() {
        info!(stage = "name", pending = resolution.unresolved.len(), "symbol refresh");
        timer.start("symbols: name");
        let names = name_stage(aggregator, &resolution.outstanding(), settings)?;
        resolution.merge_tier(names);
        timer.end("symbols: name");
    }

    if !resolution.is_complete() {
        info!(stage = "previous", pending = resolution.unresolved.len(), "symbol refresh");
        timer.start("symbols: previous");
        let previous = per_item_stage(&resolution.outstanding(), &approved, |symbol| {
            registry.previous_symbol_hits(symbol)
        })?;
        resolution.merge_tier(previous);
        timer.end("symbols: previous");
    }

    if !resolution.is_complete() {
        info!(stage = "alias", pending = resolution.unresolved.len(), "symbol refresh");
        timer.start("symbols: alias");
        let aliases = per_item_stage(&resolution.outstanding(), &approved, |symbol| {
            registry.alias_symbol_hits(symbol)
        })?;
        resolution.merge_tier(aliases);
        timer.end("symbols: alias");
    }

    Ok(resolution)
}

fn approved_stage(
    pending: &BTreeSet<String>,
    approved: &BTreeSet<String>,
) -> BTreeMap<String, String> {
    pending
        .intersection(approved)
        .map(|symbol| (symbol.clone(), symbol.clone()))
        .collect()
}

/// Full-text name search; when a name matches several genes the best-scoring one is kept.
fn name_stage<G: AggregatorService + ?Sized>(
    aggregator: &G,
    pending: &[String],
    settings: &EngineSettings,
) -> Result<BTreeMap<String, String>, MapperError> {
    let outcome = query_batched(aggregator, pending, NAME_SCOPES, "symbol", settings)?;
    let mut ranked: Vec<_> = outcome
        .hits
        .iter()
        .filter_map(|hit| hit.field("symbol").map(|symbol| (hit, symbol)))
        .collect();
    ranked.sort_by(|(a, _), (b, _)| b.score.total_cmp(&a.score));

    let mut best = BTreeMap::new();
    for (hit, symbol) in ranked {
        best.entry(hit.query.clone()).or_insert(symbol);
    }
    Ok(best)
}

/// Asks the registry about each identifier; only hits that are currently approved count.
fn per_item_stage<F>(
    pending: &[String],
    approved: &BTreeSet<String>,
    mut lookup: F,
) -> Result<BTreeMap<String, String>, MapperError>
where
    F: FnMut(&str) -> Result<Vec<String>, MapperError>,
{
    let mut found = BTreeMap::new();
    for symbol in pending {
        let hits = lookup(symbol)?;
        if let Some(current) = hits.into_iter().find(|hit| approved.contains(hit)) {
            found.insert(symbol.clone(), current);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_item_requires_approved_hit() {
        let approved: BTreeSet<String> = ["CDK6".to_string()].into_iter().collect();
        let pending = vec!["PLSTIRE".to_string(), "GONE".to_string()];
        let found = per_item_stage(&pending, &approved, |symbol| {
            Ok(match symbol {
                "PLSTIRE" => vec!["WITHDRAWN".to_string(), "CDK6".to_string()],
                _ => vec!["WITHDRAWN".to_string()],
            })
        })
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["PLSTIRE"], "CDK6");
    }

    #[test]
    fn approved_stage_is_identity() {
        let approved: BTreeSet<String> = ["TP53".to_string()].into_iter().collect();
        let pending: BTreeSet<String> = ["TP53".to_string(), "P53".to_string()]
            .into_iter()
            .collect();
        let stage = approved_stage(&pending, &approved);
        assert_eq!(stage.len(), 1);
        assert_eq!(stage["TP53"], "TP53");
    }
}
