use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::domain::strip_version;
use crate::error::MapperError;
use crate::http::{Service, build_client, read_json, send_with_retries};
use crate::mapping::Resolution;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One record of an archive "what is the latest id" response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchiveEntry {
    pub id: String,
    #[serde(default, alias = "current", deserialize_with = "flag")]
    pub is_current: bool,
    #[serde(default)]
    pub latest: Option<String>,
}

impl ArchiveEntry {
    /// Current ids map to themselves; retired ids map to their unversioned successor.
    ///
    /// `None` when a retired id has no recorded successor.
    pub fn resolved_id(&self) -> Option<String> {
        if self.is_current {
            return Some(self.id.clone());
        }
        self.latest
            .as_deref()
            .map(str::trim)
            .filter(|latest| !latest.is_empty())
            .map(|latest| strip_version(latest).to_string())
    }
}

/// Ensembl reports `is_current` as `1`, `"1"`, `true`, `0`, `""`, or `null` depending on release.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(text.trim(), "1" | "true" | "True"),
        _ => false,
    })
}

pub trait ArchiveService: Send + Sync {
    fn archive_batch(&self, ids: &[String]) -> Result<Vec<ArchiveEntry>, MapperError>;
}

#[derive(Clone)]
pub struct EnsemblArchiveClient {
    client: Client,
    base_url: String,
}

impl EnsemblArchiveClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MapperError> {
        Ok(Self {
            client: build_client(Service::Ensembl, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ArchiveService for EnsemblArchiveClient {
    fn archive_batch(&self, ids: &[String]) -> Result<Vec<ArchiveEntry>, MapperError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/archive/id", self.base_url);
        let body = json!({ "id": ids });
        let response = send_with_retries(Service::Ensembl, || {
            self.client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .json(&body)
        })?;
        read_json(Service::Ensembl, response)
    }
}

/// Looks up the latest stable id for every input, `batch_size` ids per request.
///
/// Up to `workers` batches are in flight at once. Results are merged in batch order, so the
/// outcome does not depend on which request finishes first. Any batch failure fails the call.
pub fn latest_ids<A: ArchiveService + ?Sized>(
    service: &A,
    ids: &[String],
    batch_size: usize,
    workers: usize,
) -> Result<Resolution, MapperError> {
    let batches: Vec<&[String]> = ids.chunks(batch_size.max(1)).collect();
    let mut responses: Vec<Vec<ArchiveEntry>> = Vec::with_capacity(batches.len());

    for (wave_index, wave) in batches.chunks(workers.max(1)).enumerate() {
        info!(
            wave = wave_index,
            batches = wave.len(),
            "querying archive batches"
        );
        let wave_results = thread::scope(|scope| {
            let handles: Vec<_> = wave
                .iter()
                .map(|batch| scope.spawn(move || service.archive_batch(batch)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(MapperError::EnsemblHttp(
                            "archive worker panicked".to_string(),
                        ))
                    })
                })
                .collect::<Vec<_>>()
        });
        for result in wave_results {
            responses.push(result?);
        }
    }

    let mut tier = BTreeMap::new();
    let mut seen = BTreeSet::new();
    for entry in responses.into_iter().flatten() {
        seen.insert(entry.id.clone());
        if let Some(latest) = entry.resolved_id() {
            tier.entry(entry.id).or_insert(latest);
        }
    }

    let mut resolution = Resolution::pending(ids.iter().cloned());
    resolution.merge_tier(tier);
    let absent = ids.iter().filter(|id| !seen.contains(*id)).count();
    debug!(
        resolved = resolution.mapping.len(),
        absent,
        retired = resolution.unresolved.len().saturating_sub(absent),
        "archive lookup finished"
    );
    Ok(resolution)
}
