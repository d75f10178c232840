use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::normalize_identifier;
use crate::error::MapperError;
use crate::http::{Service, build_client, handle_status, read_json, send_with_retries};

/// Record field holding the Entrez gene id.
pub const ENTREZ_FIELD: &str = "entrez_id";

/// Single-item lookups against the symbol authority. It has no batch endpoint.
pub trait SymbolRegistry: Send + Sync {
    /// Snapshot of every currently approved symbol.
    fn approved_symbols(&self) -> Result<BTreeSet<String>, MapperError>;
    /// Current symbols that list `symbol` as a previous symbol.
    fn previous_symbol_hits(&self, symbol: &str) -> Result<Vec<String>, MapperError>;
    /// Current symbols that list `symbol` as an alias.
    fn alias_symbol_hits(&self, symbol: &str) -> Result<Vec<String>, MapperError>;
    /// Entrez id of the approved record for `symbol`, if there is one.
    fn entrez_id(&self, symbol: &str) -> Result<Option<String>, MapperError>;
}

#[derive(Debug, Deserialize)]
struct HgncEnvelope {
    response: HgncDocs,
}

#[derive(Debug, Deserialize)]
struct HgncDocs {
    #[serde(default)]
    docs: Vec<Value>,
}

#[derive(Clone)]
pub struct HgncHttpClient {
    client: Client,
    base_url: String,
}

impl HgncHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MapperError> {
        Ok(Self {
            client: build_client(Service::Hgnc, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn item_url(&self, segments: &[&str]) -> Result<Url, MapperError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|err| MapperError::HgncHttp(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MapperError::HgncHttp(format!("not a base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Per-item query. A failing status is logged and treated as "no hits" for that item.
    fn item_docs(&self, segments: &[&str]) -> Result<Vec<Value>, MapperError> {
        let url = self.item_url(segments)?;
        let response = send_with_retries(Service::Hgnc, || self.client.get(url.clone()))?;
        match handle_status(Service::Hgnc, response) {
            Ok(response) => {
                let envelope: HgncEnvelope = response
                    .json()
                    .map_err(|err| MapperError::HgncHttp(err.to_string()))?;
                Ok(envelope.response.docs)
            }
            Err(MapperError::HgncStatus { status, .. }) => {
                warn!(status, path = %url.path(), "HGNC lookup failed; leaving item unresolved");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    fn symbols_of(docs: &[Value]) -> Vec<String> {
        docs.iter()
            .filter_map(|doc| doc.get("symbol").and_then(normalize_identifier))
            .collect()
    }
}

impl SymbolRegistry for HgncHttpClient {
    fn approved_symbols(&self) -> Result<BTreeSet<String>, MapperError> {
        let url = format!("{}/search/symbol/*+AND+status:Approved", self.base_url);
        info!("checking approved symbols");
        let response = send_with_retries(Service::Hgnc, || self.client.get(&url))?;
        let envelope: HgncEnvelope = read_json(Service::Hgnc, response)?;
        Ok(Self::symbols_of(&envelope.response.docs)
            .into_iter()
            .collect())
    }

    fn previous_symbol_hits(&self, symbol: &str) -> Result<Vec<String>, MapperError> {
        let docs = self.item_docs(&["search", "prev_symbol", symbol])?;
        Ok(Self::symbols_of(&docs))
    }

    fn alias_symbol_hits(&self, symbol: &str) -> Result<Vec<String>, MapperError> {
        let docs = self.item_docs(&["search", "alias_symbol", symbol])?;
        Ok(Self::symbols_of(&docs))
    }

    fn entrez_id(&self, symbol: &str) -> Result<Option<String>, MapperError> {
        let docs = self.item_docs(&["fetch", "symbol", symbol])?;
        Ok(approved_field(&docs, ENTREZ_FIELD))
    }
}

/// First value of `field` among records whose status is `Approved`.
fn approved_field(docs: &[Value], field: &str) -> Option<String> {
    docs.iter()
        .filter(|doc| doc.get("status").and_then(|v| v.as_str()) == Some("Approved"))
        .find_map(|doc| {
            doc.get(field).and_then(|value| match value {
                Value::Array(items) => items.iter().find_map(normalize_identifier),
                other => normalize_identifier(other),
            })
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn approved_field_skips_withdrawn_records() {
        let docs = vec![
            json!({"symbol": "OLD", "status": "Entry Withdrawn", "entrez_id": "1"}),
            json!({"symbol": "TP53", "status": "Approved", "entrez_id": "7157"}),
        ];
        assert_eq!(
            approved_field(&docs, ENTREZ_FIELD).as_deref(),
            Some("7157")
        );
        assert_eq!(approved_field(&docs, "ensembl_gene_id"), None);
    }

    #[test]
    fn list_fields_take_first_entry() {
        let docs = vec![json!({"status": "Approved", "entrez_id": [7157, 1]})];
        assert_eq!(
            approved_field(&docs, ENTREZ_FIELD).as_deref(),
            Some("7157")
        );
    }

    #[test]
    fn item_urls_escape_free_text() {
        let client = HgncHttpClient::new("https://rest.genenames.org", Duration::from_secs(5))
            .unwrap();
        let url = client
            .item_url(&["search", "prev_symbol", "Cyclin dependent kinase 6"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://rest.genenames.org/search/prev_symbol/Cyclin%20dependent%20kinase%206"
        );
    }
}
