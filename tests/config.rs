use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use tempfile::TempDir;

use kira_id_mapper::config::{CONFIG_FILE, Config, ConfigLoader, Endpoints};
use kira_id_mapper::error::MapperError;

#[test]
fn resolves_explicit_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "aggregator_retries": 3,
            "retry_delay_ms": 50,
            "archive_workers": 2,
            "species": "mouse",
            "timeout_secs": 5,
            "endpoints": { "mygene": "http://localhost:9000/v3/" }
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.settings.retry.attempts, 3);
    assert_eq!(resolved.settings.retry.delay, Duration::from_millis(50));
    assert_eq!(resolved.settings.archive_workers, 2);
    assert_eq!(resolved.settings.archive_batch_size, 100);
    assert_eq!(resolved.species, "mouse");
    assert_eq!(resolved.timeout, Duration::from_secs(5));
    assert_eq!(resolved.endpoints.mygene, "http://localhost:9000/v3");
    assert_eq!(resolved.endpoints.hgnc, Endpoints::default().hgnc);
    assert!(resolved.source.is_some());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let result = ConfigLoader::resolve(path.to_str());
    assert_matches!(result, Err(MapperError::ConfigRead(_)));
}

#[test]
fn malformed_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "{ not json").unwrap();
    let result = ConfigLoader::resolve(path.to_str());
    assert_matches!(result, Err(MapperError::ConfigParse(_)));
}

#[test]
fn blank_overrides_keep_defaults() {
    let config: Config =
        serde_json::from_str(r#"{"species": "  ", "endpoints": {"uniprot": " "}}"#).unwrap();
    let resolved = ConfigLoader::resolve_config(config, None).unwrap();
    assert_eq!(resolved.species, "human");
    assert_eq!(resolved.endpoints.uniprot, "https://rest.uniprot.org");
    assert_eq!(resolved.timeout, Duration::from_secs(60));
}
