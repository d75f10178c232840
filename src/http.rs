use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::MapperError;

/// Which service a request targets; picks the error variants a failure is reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Uniprot,
    Hgnc,
    Ensembl,
    MyGene,
}

impl Service {
    pub fn transport_error(&self, message: String) -> MapperError {
        match self {
            Service::Uniprot => MapperError::UniprotHttp(message),
            Service::Hgnc => MapperError::HgncHttp(message),
            Service::Ensembl => MapperError::EnsemblHttp(message),
            Service::MyGene => MapperError::MyGeneHttp(message),
        }
    }

    pub fn status_error(&self, status: u16, message: String) -> MapperError {
        match self {
            Service::Uniprot => MapperError::UniprotStatus { status, message },
            Service::Hgnc => MapperError::HgncStatus { status, message },
            Service::Ensembl => MapperError::EnsemblStatus { status, message },
            Service::MyGene => MapperError::MyGeneStatus { status, message },
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Service::Uniprot => "UniProt",
            Service::Hgnc => "HGNC",
            Service::Ensembl => "Ensembl",
            Service::MyGene => "MyGene.info",
        }
    }
}

pub fn build_client(service: Service, timeout: Duration) -> Result<Client, MapperError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("kira-idmap/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| service.transport_error(err.to_string()))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| service.transport_error(err.to_string()))
}

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

/// Sends a request, retrying throttling and gateway statuses plus connection-level errors.
pub fn send_with_retries<F>(service: Service, mut make_req: F) -> Result<Response, MapperError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        let response = make_req().send();
        let retryable = match &response {
            Ok(resp) => is_retryable_status(resp.status().as_u16()),
            Err(err) => is_retryable_error(err),
        };
        if retryable && attempt < MAX_RETRIES {
            thread::sleep(backoff_delay(attempt));
            attempt += 1;
            continue;
        }
        return response.map_err(|err| service.transport_error(err.to_string()));
    }
}

/// Linear backoff: 200 ms before the first retry, 400 ms before the second, and so on.
fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))
}

pub fn handle_status(service: Service, response: Response) -> Result<Response, MapperError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| format!("{} request failed", service.name()));
    Err(service.status_error(status, message))
}

pub fn read_json<T: serde::de::DeserializeOwned>(
    service: Service,
    response: Response,
) -> Result<T, MapperError> {
    let response = handle_status(service, response)?;
    response
        .json()
        .map_err(|err| service.transport_error(err.to_string()))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn backoff_grows_linearly() {
        assert_eq!(backoff_delay(0), Duration::from_millis(200));
        assert_eq!(backoff_delay(2), Duration::from_millis(600));
    }

    #[test]
    fn errors_route_to_service_variants() {
        assert_matches!(
            Service::Ensembl.status_error(500, "boom".to_string()),
            MapperError::EnsemblStatus { status: 500, .. }
        );
        assert_matches!(
            Service::MyGene.transport_error("reset".to_string()),
            MapperError::MyGeneHttp(_)
        );
    }
}
