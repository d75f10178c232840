//! Lookup services the resolution engine composes.
//!
//! Each service is a `Send + Sync` trait with one HTTP implementation, so the engine can be
//! driven by in-memory doubles in tests.

pub mod accession;
pub mod aggregator;
pub mod archive;
pub mod symbols;

pub use accession::{AccessionService, UniprotIdMappingClient};
pub use aggregator::{AggregatorService, GeneDoc, MyGeneClient, QueryHit, QueryManyOutcome};
pub use archive::{ArchiveEntry, ArchiveService, EnsemblArchiveClient};
pub use symbols::{HgncHttpClient, SymbolRegistry};
