use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::EngineSettings;
use crate::domain::normalize_identifier;
use crate::error::MapperError;
use crate::http::{Service, build_client, read_json, send_with_retries};
use crate::mapping::Resolution;
use crate::retry::with_retries;

/// One gene record matched by a query term.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub query: String,
    pub score: f64,
    pub doc: Value,
}

impl QueryHit {
    pub fn field(&self, path: &str) -> Option<String> {
        extract_field(&self.doc, path)
    }
}

/// Classified response of a multi-term scoped query.
///
/// `hits` keeps every matched record, including all records of a duplicated term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryManyOutcome {
    pub hits: Vec<QueryHit>,
    pub duplicates: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

impl QueryManyOutcome {
    /// Groups raw response records by term: one hit resolves, several mark a duplicate,
    /// `notfound` or silence marks it missing.
    pub fn classify(terms: &[String], records: &[Value]) -> Self {
        let mut hits = Vec::new();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            let Some(query) = record.get("query").and_then(normalize_identifier) else {
                continue;
            };
            if record.get("notfound").and_then(|v| v.as_bool()) == Some(true) {
                continue;
            }
            *counts.entry(query.clone()).or_default() += 1;
            hits.push(QueryHit {
                query,
                score: record.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
                doc: record.clone(),
            });
        }

        let duplicates = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(query, _)| query.clone())
            .collect();
        let missing = terms
            .iter()
            .map(|term| term.trim().to_string())
            .filter(|term| !counts.contains_key(term))
            .collect();

        Self {
            hits,
            duplicates,
            missing,
        }
    }

    /// Hits whose term matched exactly one record.
    pub fn unique_hits(&self) -> impl Iterator<Item = &QueryHit> {
        self.hits
            .iter()
            .filter(|hit| !self.duplicates.contains(&hit.query))
    }

    /// Maps each term to `field` when all of its records that carry the field agree on one
    /// value. Repeated records with the same value collapse into one; conflicting values leave
    /// the term out.
    pub fn agreed_values(&self, field: &str) -> BTreeMap<String, String> {
        let mut values: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for hit in &self.hits {
            if let Some(value) = hit.field(field) {
                values.entry(hit.query.as_str()).or_default().insert(value);
            }
        }
        values
            .into_iter()
            .filter(|(_, distinct)| distinct.len() == 1)
            .filter_map(|(query, distinct)| {
                distinct.into_iter().next().map(|value| (query.to_string(), value))
            })
            .collect()
    }

    pub fn unmapped(&self) -> BTreeSet<String> {
        self.duplicates.union(&self.missing).cloned().collect()
    }

    fn extend(&mut self, other: QueryManyOutcome) {
        self.hits.extend(other.hits);
        self.duplicates.extend(other.duplicates);
        self.missing.extend(other.missing);
    }
}

/// Record returned by a direct by-id lookup; `doc` is `None` when the id is unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneDoc {
    pub query: String,
    pub doc: Option<Value>,
}

impl GeneDoc {
    pub fn from_record(record: &Value) -> Option<Self> {
        let query = record.get("query").and_then(normalize_identifier)?;
        let found = record.get("notfound").and_then(|v| v.as_bool()) != Some(true);
        Some(Self {
            query,
            doc: found.then(|| record.clone()),
        })
    }
}

pub trait AggregatorService: Send + Sync {
    fn query_many(
        &self,
        terms: &[String],
        scopes: &str,
        fields: &str,
    ) -> Result<QueryManyOutcome, MapperError>;

    fn get_genes(&self, ids: &[String], fields: &str) -> Result<Vec<GeneDoc>, MapperError>;
}

#[derive(Clone)]
pub struct MyGeneClient {
    client: Client,
    base_url: String,
    species: String,
}

impl MyGeneClient {
    pub fn new(base_url: &str, species: &str, timeout: Duration) -> Result<Self, MapperError> {
        Ok(Self {
            client: build_client(Service::MyGene, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            species: species.to_string(),
        })
    }
}

impl AggregatorService for MyGeneClient {
    fn query_many(
        &self,
        terms: &[String],
        scopes: &str,
        fields: &str,
    ) -> Result<QueryManyOutcome, MapperError> {
        if terms.is_empty() {
            return Ok(QueryManyOutcome::default());
        }
        let url = format!("{}/query", self.base_url);
        let joined = terms.join(",");
        let response = send_with_retries(Service::MyGene, || {
            self.client.post(&url).form(&[
                ("q", joined.as_str()),
                ("scopes", scopes),
                ("fields", fields),
                ("species", self.species.as_str()),
                ("entrezonly", "true"),
            ])
        })?;
        let records: Vec<Value> = read_json(Service::MyGene, response)?;
        Ok(QueryManyOutcome::classify(terms, &records))
    }

    fn get_genes(&self, ids: &[String], fields: &str) -> Result<Vec<GeneDoc>, MapperError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/gene", self.base_url);
        let joined = ids.join(",");
        let response = send_with_retries(Service::MyGene, || {
            self.client
                .post(&url)
                .form(&[("ids", joined.as_str()), ("fields", fields)])
        })?;
        let records: Vec<Value> = read_json(Service::MyGene, response)?;
        Ok(records.iter().filter_map(GeneDoc::from_record).collect())
    }
}

/// Runs a scoped query in fixed-size batches, each batch under the configured retry budget.
pub fn query_batched<G: AggregatorService + ?Sized>(
    service: &G,
    terms: &[String],
    scopes: &str,
    fields: &str,
    settings: &EngineSettings,
) -> Result<QueryManyOutcome, MapperError> {
    let mut outcome = QueryManyOutcome::default();
    for batch in terms.chunks(settings.aggregator_batch_size.max(1)) {
        let partial = with_retries(settings.retry, "aggregator query", || {
            service.query_many(batch, scopes, fields)
        })?;
        outcome.extend(partial);
    }
    debug!(
        scopes,
        fields,
        hits = outcome.hits.len(),
        duplicates = outcome.duplicates.len(),
        unmapped = outcome.unmapped().len(),
        "aggregator query finished"
    );
    Ok(outcome)
}

/// Maps each term to `field` of its unique hit.
///
/// Duplicated, missing, and field-less terms stay unresolved.
pub fn lookup_field<G: AggregatorService + ?Sized>(
    service: &G,
    terms: &[String],
    scopes: &str,
    field: &str,
    settings: &EngineSettings,
) -> Result<Resolution, MapperError> {
    let outcome = query_batched(service, terms, scopes, field, settings)?;
    let mut resolution = Resolution::pending(terms.iter().cloned());
    let tier: BTreeMap<String, String> = outcome
        .unique_hits()
        .filter_map(|hit| hit.field(field).map(|value| (hit.query.clone(), value)))
        .collect();
    resolution.merge_tier(tier);
    Ok(resolution)
}

/// Direct by-id lookup of `field`, batched and retried like [`query_batched`].
pub fn get_field<G: AggregatorService + ?Sized>(
    service: &G,
    ids: &[String],
    field: &str,
    settings: &EngineSettings,
) -> Result<Resolution, MapperError> {
    let mut resolution = Resolution::pending(ids.iter().cloned());
    for batch in ids.chunks(settings.aggregator_batch_size.max(1)) {
        let docs = with_retries(settings.retry, "aggregator gene lookup", || {
            service.get_genes(batch, field)
        })?;
        let mut tier = BTreeMap::new();
        for gene in docs {
            let Some(value) = gene.doc.as_ref().and_then(|doc| extract_field(doc, field)) else {
                continue;
            };
            tier.entry(gene.query).or_insert(value);
        }
        resolution.merge_tier(tier);
    }
    Ok(resolution)
}

/// Reads a dotted field path out of a gene record.
///
/// Arrays yield their first usable element. The `uniprot` object yields its Swiss-Prot
/// accession, falling back to TrEMBL.
pub fn extract_field(doc: &Value, path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    descend(doc, &segments)
}

fn descend(value: &Value, path: &[&str]) -> Option<String> {
    if let Value::Array(items) = value {
        return items.iter().find_map(|item| descend(item, path));
    }
    match path.split_first() {
        Some((head, rest)) => value.get(*head).and_then(|next| descend(next, rest)),
        None => match value {
            Value::Object(entry) => ["Swiss-Prot", "TrEMBL"]
                .iter()
                .find_map(|key| entry.get(*key))
                .and_then(|inner| descend(inner, &[])),
            other => normalize_identifier(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn classify_splits_duplicates_and_missing() {
        let terms = vec!["TP53".to_string(), "MYC".to_string(), "NOPE".to_string()];
        let records = vec![
            json!({"query": "TP53", "_id": "7157", "_score": 20.0, "entrezgene": 7157}),
            json!({"query": "MYC", "_id": "4609", "_score": 10.0}),
            json!({"query": "MYC", "_id": "999", "_score": 5.0}),
            json!({"query": "NOPE", "notfound": true}),
        ];
        let outcome = QueryManyOutcome::classify(&terms, &records);
        assert_eq!(outcome.hits.len(), 3);
        assert!(outcome.duplicates.contains("MYC"));
        assert!(outcome.missing.contains("NOPE"));
        assert_eq!(outcome.unique_hits().count(), 1);
        assert_eq!(outcome.unmapped().len(), 2);
    }

    #[test]
    fn agreeing_duplicates_collapse() {
        let terms = vec!["GENE3".to_string(), "MIXED".to_string()];
        let records = vec![
            json!({"query": "GENE3", "_score": 9.0, "entrezgene": 333}),
            json!({"query": "GENE3", "_score": 2.0, "entrezgene": "333"}),
            json!({"query": "MIXED", "entrezgene": 1}),
            json!({"query": "MIXED", "entrezgene": 2}),
        ];
        let outcome = QueryManyOutcome::classify(&terms, &records);
        let agreed = outcome.agreed_values("entrezgene");
        assert_eq!(agreed.len(), 1);
        assert_eq!(agreed["GENE3"], "333");
    }

    #[test]
    fn extract_nested_and_list_fields() {
        let doc = json!({
            "entrezgene": 7157,
            "ensembl": [{"gene": "ENSG00000141510", "protein": ["ENSP1", "ENSP2"]}],
            "uniprot": {"Swiss-Prot": "P04637", "TrEMBL": ["Q1", "Q2"]},
            "refseq": {"protein": ["NP_000537.3"]}
        });
        assert_eq!(extract_field(&doc, "entrezgene").as_deref(), Some("7157"));
        assert_eq!(
            extract_field(&doc, "ensembl.gene").as_deref(),
            Some("ENSG00000141510")
        );
        assert_eq!(extract_field(&doc, "ensembl.protein").as_deref(), Some("ENSP1"));
        assert_eq!(extract_field(&doc, "uniprot").as_deref(), Some("P04637"));
        assert_eq!(
            extract_field(&doc, "refseq.protein").as_deref(),
            Some("NP_000537.3")
        );
        assert_eq!(extract_field(&doc, "symbol"), None);
    }

    #[test]
    fn trembl_used_without_swissprot() {
        let doc = json!({"uniprot": {"TrEMBL": ["Q1", "Q2"]}});
        assert_eq!(extract_field(&doc, "uniprot").as_deref(), Some("Q1"));
    }

    #[test]
    fn gene_doc_marks_notfound() {
        let missing = GeneDoc::from_record(&json!({"query": "1", "notfound": true})).unwrap();
        assert!(missing.doc.is_none());
        let found = GeneDoc::from_record(&json!({"query": 1017, "symbol": "CDK2"})).unwrap();
        assert_eq!(found.query, "1017");
        assert!(found.doc.is_some());
    }
}
