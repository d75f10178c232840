use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::normalize_identifier;
use crate::error::MapperError;
use crate::http::{Service, build_client, read_json, send_with_retries};
use crate::mapping::{LookupTable, MappingRecord};

/// Source database for UniProtKB accessions and entry names.
pub const ACCESSION_DB: &str = "UniProtKB_AC-ID";
/// Source database for DIP interactor ids.
pub const DIP_DB: &str = "DIP";

pub trait AccessionService: Send + Sync {
    /// Maps `ids` from one ID-mapping database to another.
    ///
    /// Rows may repeat a `from` when an accession maps to several targets.
    fn map_ids(&self, ids: &[String], from_db: &str, to_db: &str)
    -> Result<LookupTable, MapperError>;
}

#[derive(Clone)]
pub struct UniprotIdMappingClient {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    max_polls: usize,
}

#[derive(Debug, Deserialize)]
struct JobSubmission {
    #[serde(rename = "jobId")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobDetails {
    #[serde(rename = "redirectURL")]
    redirect_url: String,
}

impl UniprotIdMappingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MapperError> {
        Ok(Self {
            client: build_client(Service::Uniprot, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 300,
        })
    }

    fn submit(&self, ids: &[String], from_db: &str, to_db: &str) -> Result<String, MapperError> {
        let url = format!("{}/idmapping/run", self.base_url);
        let joined = ids.join(",");
        let response = send_with_retries(Service::Uniprot, || {
            self.client
                .post(&url)
                .form(&[("from", from_db), ("to", to_db), ("ids", joined.as_str())])
        })?;
        let submission: JobSubmission = read_json(Service::Uniprot, response)?;
        Ok(submission.job_id)
    }

    fn wait_for(&self, job_id: &str) -> Result<(), MapperError> {
        let url = format!("{}/idmapping/status/{job_id}", self.base_url);
        for poll in 0..self.max_polls {
            let response = send_with_retries(Service::Uniprot, || self.client.get(&url))?;
            let status: Value = read_json(Service::Uniprot, response)?;
            match status.get("jobStatus").and_then(|v| v.as_str()) {
                Some("NEW") | Some("RUNNING") => {
                    debug!(job_id, poll, "id mapping job still running");
                    thread::sleep(self.poll_interval);
                }
                Some("FINISHED") | None => return Ok(()),
                Some(other) => {
                    return Err(MapperError::IdMappingJob(format!("{job_id}: {other}")));
                }
            }
        }
        Err(MapperError::IdMappingJob(format!(
            "{job_id}: still running after {} polls",
            self.max_polls
        )))
    }

    fn fetch_results(&self, job_id: &str, to_db: &str) -> Result<Value, MapperError> {
        let url = format!("{}/idmapping/details/{job_id}", self.base_url);
        let response = send_with_retries(Service::Uniprot, || self.client.get(&url))?;
        let details: JobDetails = read_json(Service::Uniprot, response)?;

        let stream = stream_url(&details.redirect_url);
        let response = send_with_retries(Service::Uniprot, || {
            let request = self.client.get(&stream).query(&[("format", "json")]);
            if to_db == "UniProtKB" {
                request.query(&[("fields", "accession")])
            } else {
                request
            }
        })?;
        read_json(Service::Uniprot, response)
    }
}

impl AccessionService for UniprotIdMappingClient {
    fn map_ids(
        &self,
        ids: &[String],
        from_db: &str,
        to_db: &str,
    ) -> Result<LookupTable, MapperError> {
        if ids.is_empty() {
            return Ok(LookupTable::default());
        }
        let job_id = self.submit(ids, from_db, to_db)?;
        debug!(job_id, from_db, to_db, ids = ids.len(), "submitted id mapping job");
        self.wait_for(&job_id)?;
        let payload = self.fetch_results(&job_id, to_db)?;
        Ok(parse_mapping_results(ids, &payload))
    }
}

/// Turns a results redirect into the streaming endpoint, which returns every row at once.
pub fn stream_url(redirect: &str) -> String {
    if redirect.contains("/results/stream/") {
        return redirect.to_string();
    }
    redirect.replacen("/results/", "/results/stream/", 1)
}

/// Parses an ID-mapping results payload.
///
/// Every input that produced no row is reported failed, whether or not the service listed it
/// under `failedIds`.
pub fn parse_mapping_results(ids: &[String], payload: &Value) -> LookupTable {
    let mut rows = Vec::new();
    if let Some(results) = payload.get("results").and_then(|v| v.as_array()) {
        for item in results {
            let from = item.get("from").and_then(normalize_identifier);
            let to = item.get("to").and_then(|to| match to {
                Value::Object(entry) => entry.get("primaryAccession").and_then(normalize_identifier),
                other => normalize_identifier(other),
            });
            if let (Some(from), Some(to)) = (from, to) {
                rows.push(MappingRecord::new(from, to));
            }
        }
    }

    let seen: BTreeSet<&str> = rows.iter().map(|row| row.from.as_str()).collect();
    let mut failed: BTreeSet<String> = ids
        .iter()
        .filter(|id| !seen.contains(id.as_str()))
        .cloned()
        .collect();
    if let Some(listed) = payload.get("failedIds").and_then(|v| v.as_array()) {
        failed.extend(
            listed
                .iter()
                .filter_map(normalize_identifier)
                .filter(|id| !seen.contains(id.as_str())),
        );
    }

    LookupTable { rows, failed }
}
