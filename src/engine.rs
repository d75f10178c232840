use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::backends::accession::ACCESSION_DB;
use crate::backends::aggregator::get_field;
use crate::backends::archive::latest_ids;
use crate::backends::{
    AccessionService, AggregatorService, ArchiveService, EnsemblArchiveClient, HgncHttpClient,
    MyGeneClient, SymbolRegistry, UniprotIdMappingClient,
};
use crate::config::{EngineSettings, ResolvedConfig};
use crate::domain::Namespace;
use crate::error::MapperError;
use crate::mapping::{MappingRecord, Resolution};
use crate::policy::{self, RefreshOutcome, RetentionPolicy};
use crate::symbol_chain::resolve_symbols;
use crate::timer::TaskTimer;

/// The resolver wired to the public web services.
pub type HttpResolver =
    Resolver<UniprotIdMappingClient, HgncHttpClient, EnsemblArchiveClient, MyGeneClient>;

/// Resolution engine: routes identifiers through the backends that can answer them.
///
/// Backends are injected so tests can substitute in-memory doubles. The engine keeps no
/// state between calls.
#[derive(Clone)]
pub struct Resolver<A, S, E, G>
where
    A: AccessionService,
    S: SymbolRegistry,
    E: ArchiveService,
    G: AggregatorService,
{
    pub(crate) accession: A,
    pub(crate) symbols: S,
    pub(crate) archive: E,
    pub(crate) aggregator: G,
    pub(crate) settings: EngineSettings,
}

impl<A, S, E, G> Resolver<A, S, E, G>
where
    A: AccessionService,
    S: SymbolRegistry,
    E: ArchiveService,
    G: AggregatorService,
{
    pub fn new(accession: A, symbols: S, archive: E, aggregator: G, settings: EngineSettings) -> Self {
        Self {
            accession,
            symbols,
            archive,
            aggregator,
            settings,
        }
    }

    /// Maps each identifier to its current form in the same namespace.
    pub fn refresh(
        &self,
        ids: &BTreeSet<String>,
        namespace: Namespace,
        retention: RetentionPolicy,
        timer: &mut dyn TaskTimer,
    ) -> Result<RefreshOutcome, MapperError> {
        info!(%namespace, %retention, inputs = ids.len(), "refresh");
        timer.start("refresh");

        let (accepted, rejected): (Vec<String>, Vec<String>) =
            ids.iter().cloned().partition(|id| namespace.accepts(id));
        if !rejected.is_empty() {
            debug!(%namespace, rejected = rejected.len(), "identifiers failed syntax screen");
        }

        let mut resolution = match namespace {
            Namespace::Uniprot => self.refresh_accessions(&accepted)?,
            Namespace::Symbol => resolve_symbols(
                &self.symbols,
                &self.aggregator,
                &accepted,
                &self.settings,
                timer,
            )?,
            Namespace::Ensembl | Namespace::EnsemblProtein => latest_ids(
                &self.archive,
                &accepted,
                self.settings.archive_batch_size,
                self.settings.archive_workers,
            )?,
            Namespace::Entrez => get_field(
                &self.aggregator,
                &accepted,
                Namespace::Entrez.aggregator_field(),
                &self.settings,
            )?,
            Namespace::Dip | Namespace::Refseq => identity(&accepted),
        };
        resolution.absorb_unresolved(rejected);
        let resolution = account_for(resolution, ids);

        info!(
            %namespace,
            resolved = resolution.mapping.len(),
            unresolved = resolution.unresolved.len(),
            "refresh finished"
        );
        timer.end("refresh");
        Ok(policy::apply(resolution, retention))
    }

    fn refresh_accessions(&self, ids: &[String]) -> Result<Resolution, MapperError> {
        if ids.is_empty() {
            return Ok(Resolution::default());
        }
        let table = self.accession.map_ids(
            ids,
            ACCESSION_DB,
            Namespace::Uniprot.accession_db(),
        )?;
        let mut resolution = Resolution::pending(ids.iter().cloned());
        resolution.merge_tier(table.into_resolution().mapping);
        Ok(resolution)
    }
}

impl HttpResolver {
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, MapperError> {
        let endpoints = &config.endpoints;
        Ok(Resolver::new(
            UniprotIdMappingClient::new(&endpoints.uniprot, config.timeout)?,
            HgncHttpClient::new(&endpoints.hgnc, config.timeout)?,
            EnsemblArchiveClient::new(&endpoints.ensembl, config.timeout)?,
            MyGeneClient::new(&endpoints.mygene, &config.species, config.timeout)?,
            config.settings.clone(),
        ))
    }
}

/// Identity mapping for namespaces whose ids never change once syntactically valid.
fn identity(ids: &[String]) -> Resolution {
    let mut resolution = Resolution::pending(ids.iter().cloned());
    resolution.merge_tier(crate::mapping::collapse_first_wins(
        ids.iter().map(|id| MappingRecord::new(id.clone(), id.clone())),
    ));
    resolution
}

/// Restricts a resolution to the caller's inputs and marks any input nobody answered for.
pub(crate) fn account_for(resolution: Resolution, inputs: &BTreeSet<String>) -> Resolution {
    let mut mapping = resolution.mapping;
    mapping.retain(|from, _| inputs.contains(from));
    let unresolved = inputs
        .iter()
        .filter(|id| !mapping.contains_key(*id))
        .cloned()
        .collect();
    Resolution {
        mapping,
        unresolved,
    }
}
