#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use kira_id_mapper::backends::{
    AccessionService, AggregatorService, ArchiveEntry, ArchiveService, GeneDoc,
    QueryManyOutcome, SymbolRegistry,
};
use kira_id_mapper::config::EngineSettings;
use kira_id_mapper::engine::Resolver;
use kira_id_mapper::error::MapperError;
use kira_id_mapper::mapping::{LookupTable, MappingRecord};

pub type FakeResolver = Resolver<FakeAccession, FakeRegistry, FakeArchive, FakeAggregator>;

pub fn resolver(
    accession: FakeAccession,
    registry: FakeRegistry,
    archive: FakeArchive,
    aggregator: FakeAggregator,
) -> FakeResolver {
    Resolver::new(
        accession,
        registry,
        archive,
        aggregator,
        EngineSettings::default(),
    )
}

/// One `map_ids` call as the engine issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessionCall {
    pub from_db: String,
    pub to_db: String,
    pub ids: Vec<String>,
}

#[derive(Default)]
pub struct FakeAccession {
    rows: Vec<(String, String, MappingRecord)>,
    pub calls: Arc<Mutex<Vec<AccessionCall>>>,
}

impl FakeAccession {
    pub fn row(mut self, from_db: &str, to_db: &str, from: &str, to: &str) -> Self {
        self.rows.push((
            from_db.to_string(),
            to_db.to_string(),
            MappingRecord::new(from, to),
        ));
        self
    }
}

impl AccessionService for FakeAccession {
    fn map_ids(
        &self,
        ids: &[String],
        from_db: &str,
        to_db: &str,
    ) -> Result<LookupTable, MapperError> {
        self.calls.lock().unwrap().push(AccessionCall {
            from_db: from_db.to_string(),
            to_db: to_db.to_string(),
            ids: ids.to_vec(),
        });
        let rows: Vec<MappingRecord> = self
            .rows
            .iter()
            .filter(|(from, to, record)| {
                from == from_db && to == to_db && ids.contains(&record.from)
            })
            .map(|(_, _, record)| record.clone())
            .collect();
        let failed = ids
            .iter()
            .filter(|id| !rows.iter().any(|row| &row.from == *id))
            .cloned()
            .collect();
        Ok(LookupTable { rows, failed })
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    approved: BTreeSet<String>,
    previous: BTreeMap<String, Vec<String>>,
    aliases: BTreeMap<String, Vec<String>>,
    entrez: BTreeMap<String, String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeRegistry {
    pub fn approved(mut self, symbols: &[&str]) -> Self {
        self.approved
            .extend(symbols.iter().map(|symbol| symbol.to_string()));
        self
    }

    pub fn previous(mut self, symbol: &str, hits: &[&str]) -> Self {
        self.previous.insert(
            symbol.to_string(),
            hits.iter().map(|hit| hit.to_string()).collect(),
        );
        self
    }

    pub fn alias(mut self, symbol: &str, hits: &[&str]) -> Self {
        self.aliases.insert(
            symbol.to_string(),
            hits.iter().map(|hit| hit.to_string()).collect(),
        );
        self
    }

    pub fn entrez(mut self, symbol: &str, id: &str) -> Self {
        self.entrez.insert(symbol.to_string(), id.to_string());
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SymbolRegistry for FakeRegistry {
    fn approved_symbols(&self) -> Result<BTreeSet<String>, MapperError> {
        self.record("approved".to_string());
        Ok(self.approved.clone())
    }

    fn previous_symbol_hits(&self, symbol: &str) -> Result<Vec<String>, MapperError> {
        self.record(format!("previous:{symbol}"));
        Ok(self.previous.get(symbol).cloned().unwrap_or_default())
    }

    fn alias_symbol_hits(&self, symbol: &str) -> Result<Vec<String>, MapperError> {
        self.record(format!("alias:{symbol}"));
        Ok(self.aliases.get(symbol).cloned().unwrap_or_default())
    }

    fn entrez_id(&self, symbol: &str) -> Result<Option<String>, MapperError> {
        self.record(format!("fetch:{symbol}"));
        Ok(self.entrez.get(symbol).cloned())
    }
}

#[derive(Default)]
pub struct FakeArchive {
    entries: BTreeMap<String, ArchiveEntry>,
    pub batches: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeArchive {
    pub fn current(mut self, id: &str) -> Self {
        self.entries.insert(
            id.to_string(),
            ArchiveEntry {
                id: id.to_string(),
                is_current: true,
                latest: Some(format!("{id}.1")),
            },
        );
        self
    }

    pub fn retired(mut self, id: &str, latest: Option<&str>) -> Self {
        self.entries.insert(
            id.to_string(),
            ArchiveEntry {
                id: id.to_string(),
                is_current: false,
                latest: latest.map(str::to_string),
            },
        );
        self
    }
}

impl ArchiveService for FakeArchive {
    fn archive_batch(&self, ids: &[String]) -> Result<Vec<ArchiveEntry>, MapperError> {
        self.batches.lock().unwrap().push(ids.to_vec());
        Ok(ids
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect())
    }
}

/// Aggregator double keyed by `(scopes, term)` for queries and by id for gene lookups.
#[derive(Default)]
pub struct FakeAggregator {
    docs: BTreeMap<(String, String), Vec<Value>>,
    genes: BTreeMap<String, Value>,
    failures_left: Mutex<usize>,
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeAggregator {
    pub fn hit(mut self, scopes: &str, term: &str, doc: Value) -> Self {
        self.docs
            .entry((scopes.to_string(), term.to_string()))
            .or_default()
            .push(doc);
        self
    }

    pub fn gene(mut self, id: &str, doc: Value) -> Self {
        self.genes.insert(id.to_string(), doc);
        self
    }

    /// The next `count` calls fail with a transport error.
    pub fn failing(self, count: usize) -> Self {
        *self.failures_left.lock().unwrap() = count;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn enter(&self, terms: &[String]) -> Result<(), MapperError> {
        self.calls.lock().unwrap().push(terms.to_vec());
        let mut failures = self.failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(MapperError::MyGeneHttp("connection reset".to_string()));
        }
        Ok(())
    }
}

impl AggregatorService for FakeAggregator {
    fn query_many(
        &self,
        terms: &[String],
        scopes: &str,
        _fields: &str,
    ) -> Result<QueryManyOutcome, MapperError> {
        self.enter(terms)?;
        let mut records = Vec::new();
        for term in terms {
            match self.docs.get(&(scopes.to_string(), term.clone())) {
                Some(docs) => {
                    for doc in docs {
                        let mut record = doc.clone();
                        record["query"] = json!(term);
                        records.push(record);
                    }
                }
                None => records.push(json!({"query": term, "notfound": true})),
            }
        }
        Ok(QueryManyOutcome::classify(terms, &records))
    }

    fn get_genes(&self, ids: &[String], _fields: &str) -> Result<Vec<GeneDoc>, MapperError> {
        self.enter(ids)?;
        Ok(ids
            .iter()
            .map(|id| GeneDoc {
                query: id.clone(),
                doc: self.genes.get(id).cloned(),
            })
            .collect())
    }
}
