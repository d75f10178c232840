//! Cross-namespace conversion.
//!
//! Each `(source, target)` pair selects a chain of tiers. A tier only sees what earlier tiers
//! left unresolved and never overwrites their answers.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::backends::accession::{ACCESSION_DB, DIP_DB};
use crate::backends::aggregator::{get_field, lookup_field, query_batched};
use crate::backends::{AccessionService, AggregatorService, ArchiveService, SymbolRegistry};
use crate::domain::Namespace;
use crate::engine::{Resolver, account_for};
use crate::error::MapperError;
use crate::mapping::Resolution;
use crate::timer::TaskTimer;

impl<A, S, E, G> Resolver<A, S, E, G>
where
    A: AccessionService,
    S: SymbolRegistry,
    E: ArchiveService,
    G: AggregatorService,
{
    /// Maps each identifier from `source` to `target`.
    ///
    /// Every input ends up either as a mapping key or in `unresolved`. A backend whose retry
    /// budget runs out aborts the whole call.
    pub fn convert(
        &self,
        ids: &BTreeSet<String>,
        source: Namespace,
        target: Namespace,
        timer: &mut dyn TaskTimer,
    ) -> Result<Resolution, MapperError> {
        info!(%source, %target, inputs = ids.len(), "convert");
        let label = format!("convert {source} -> {target}");
        timer.start(&label);

        let inputs: Vec<String> = ids.iter().cloned().collect();
        let resolution = if inputs.is_empty() {
            Resolution::default()
        } else {
            match (source, target) {
                (Namespace::Symbol, Namespace::Entrez) => self.symbols_to_entrez(&inputs, timer)?,
                (Namespace::Symbol, _) => lookup_field(
                    &self.aggregator,
                    &inputs,
                    Namespace::Symbol.aggregator_scope(),
                    target.aggregator_field(),
                    &self.settings,
                )?,
                (Namespace::Entrez, _) => get_field(
                    &self.aggregator,
                    &inputs,
                    target.aggregator_field(),
                    &self.settings,
                )?,
                (Namespace::Uniprot, _) => self.uniprot_chain(&inputs, target, timer)?,
                (Namespace::Dip, Namespace::Uniprot) => {
                    timer.start("dip: accession");
                    let hop = self.dip_to_uniprot(&inputs)?;
                    timer.end("dip: accession");
                    hop
                }
                (Namespace::Dip, _) => self.dip_chain(&inputs, target, timer)?,
                (Namespace::Ensembl | Namespace::EnsemblProtein | Namespace::Refseq, _) => {
                    lookup_field(
                        &self.aggregator,
                        &inputs,
                        source.aggregator_scope(),
                        target.aggregator_field(),
                        &self.settings,
                    )?
                }
            }
        };
        let resolution = account_for(resolution, ids);

        info!(
            %source,
            %target,
            resolved = resolution.mapping.len(),
            unresolved = resolution.unresolved.len(),
            "convert finished"
        );
        timer.end(&label);
        Ok(resolution)
    }

    /// Aggregator first, then one registry fetch per symbol the aggregator could not place.
    fn symbols_to_entrez(
        &self,
        ids: &[String],
        timer: &mut dyn TaskTimer,
    ) -> Result<Resolution, MapperError> {
        timer.start("symbol: aggregator");
        let mut resolution = lookup_field(
            &self.aggregator,
            ids,
            Namespace::Symbol.aggregator_scope(),
            Namespace::Entrez.aggregator_field(),
            &self.settings,
        )?;
        timer.end("symbol: aggregator");
        if resolution.is_complete() {
            return Ok(resolution);
        }

        timer.start("symbol: registry");
        let pending = resolution.outstanding();
        debug!(pending = pending.len(), "fetching entrez ids from symbol registry");
        let mut tier = BTreeMap::new();
        for symbol in pending {
            if let Some(entrez) = self.symbols.entrez_id(&symbol)? {
                tier.insert(symbol, entrez);
            }
        }
        let added = resolution.merge_tier(tier);
        timer.end("symbol: registry");
        debug!(added, "symbol registry tier finished");
        Ok(resolution)
    }

    /// Accession service, then aggregator by accession, then a detour through gene symbols.
    fn uniprot_chain(
        &self,
        ids: &[String],
        target: Namespace,
        timer: &mut dyn TaskTimer,
    ) -> Result<Resolution, MapperError> {
        let mut resolution = Resolution::pending(ids.iter().cloned());

        timer.start("uniprot: accession");
        let table = self.accession.map_ids(ids, ACCESSION_DB, target.accession_db())?;
        let added = resolution.merge_tier(table.into_resolution().mapping);
        timer.end("uniprot: accession");
        debug!(tier = 1, added, pending = resolution.unresolved.len(), "uniprot chain");
        if resolution.is_complete() {
            return Ok(resolution);
        }

        timer.start("uniprot: aggregator");
        let by_accession = lookup_field(
            &self.aggregator,
            &resolution.outstanding(),
            Namespace::Uniprot.aggregator_scope(),
            target.aggregator_field(),
            &self.settings,
        )?;
        let added = resolution.merge_tier(by_accession.mapping);
        timer.end("uniprot: aggregator");
        debug!(tier = 2, added, pending = resolution.unresolved.len(), "uniprot chain");
        // The symbol detour asks the same question tier 1 already answered.
        if resolution.is_complete() || target == Namespace::Symbol {
            return Ok(resolution);
        }

        timer.start("uniprot: via symbol");
        let via_symbol = self.via_symbol(&resolution.outstanding(), target)?;
        let added = resolution.merge_tier(via_symbol);
        timer.end("uniprot: via symbol");
        debug!(tier = 3, added, pending = resolution.unresolved.len(), "uniprot chain");
        Ok(resolution)
    }

    /// Uniprot -> symbol -> target, joined back onto the accession keys.
    ///
    /// A symbol with several aggregator records still resolves when they all name the same
    /// target.
    fn via_symbol(
        &self,
        ids: &[String],
        target: Namespace,
    ) -> Result<BTreeMap<String, String>, MapperError> {
        let to_symbol = self
            .accession
            .map_ids(ids, ACCESSION_DB, Namespace::Symbol.accession_db())?
            .into_resolution()
            .mapping;
        if to_symbol.is_empty() {
            return Ok(BTreeMap::new());
        }
        let symbols: Vec<String> = to_symbol
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let field = target.aggregator_field();
        let by_symbol = query_batched(
            &self.aggregator,
            &symbols,
            Namespace::Symbol.aggregator_scope(),
            field,
            &self.settings,
        )?
        .agreed_values(field);
        Ok(join(&to_symbol, &by_symbol))
    }

    fn dip_to_uniprot(&self, ids: &[String]) -> Result<Resolution, MapperError> {
        let table = self
            .accession
            .map_ids(ids, DIP_DB, Namespace::Uniprot.accession_db())?;
        let mut resolution = Resolution::pending(ids.iter().cloned());
        resolution.merge_tier(table.into_resolution().mapping);
        Ok(resolution)
    }

    /// DIP -> Uniprot, the full Uniprot chain on the intermediates, then the re-join.
    ///
    /// A DIP id whose first hop fails is never sent further down the chain.
    fn dip_chain(
        &self,
        ids: &[String],
        target: Namespace,
        timer: &mut dyn TaskTimer,
    ) -> Result<Resolution, MapperError> {
        timer.start("dip: accession");
        let hop = self.dip_to_uniprot(ids)?;
        timer.end("dip: accession");
        debug!(
            intermediates = hop.mapping.len(),
            failed = hop.unresolved.len(),
            "dip hop finished"
        );

        let mut resolution = Resolution::pending(ids.iter().cloned());
        if hop.mapping.is_empty() {
            return Ok(resolution);
        }
        let intermediates: Vec<String> = hop
            .mapping
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let downstream = self.uniprot_chain(&intermediates, target, timer)?;
        resolution.merge_tier(join(&hop.mapping, &downstream.mapping));
        Ok(resolution)
    }
}

/// Composes `first` with `second`; keys whose intermediate has no onward value are dropped.
fn join(
    first: &BTreeMap<String, String>,
    second: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    first
        .iter()
        .filter_map(|(from, via)| second.get(via).map(|to| (from.clone(), to.clone())))
        .collect()
}
