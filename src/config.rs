use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::backends::archive;
use crate::error::MapperError;
use crate::retry::{DEFAULT_ATTEMPTS, RetryPolicy};

pub const CONFIG_FILE: &str = "kira-idmap.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub aggregator_retries: Option<usize>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub archive_batch_size: Option<usize>,
    #[serde(default)]
    pub archive_workers: Option<usize>,
    #[serde(default)]
    pub aggregator_batch_size: Option<usize>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub endpoints: EndpointOverrides,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointOverrides {
    #[serde(default)]
    pub uniprot: Option<String>,
    #[serde(default)]
    pub hgnc: Option<String>,
    #[serde(default)]
    pub ensembl: Option<String>,
    #[serde(default)]
    pub mygene: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub uniprot: String,
    pub hgnc: String,
    pub ensembl: String,
    pub mygene: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            uniprot: "https://rest.uniprot.org".to_string(),
            hgnc: "https://rest.genenames.org".to_string(),
            ensembl: "https://rest.ensembl.org".to_string(),
            mygene: "https://mygene.info/v3".to_string(),
        }
    }
}

/// Knobs the resolution engine reads; independent of any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub retry: RetryPolicy,
    pub archive_batch_size: usize,
    pub archive_workers: usize,
    pub aggregator_batch_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            archive_batch_size: archive::DEFAULT_BATCH_SIZE,
            archive_workers: 4,
            aggregator_batch_size: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub source: Option<Utf8PathBuf>,
    pub settings: EngineSettings,
    pub endpoints: Endpoints,
    pub species: String,
    pub timeout: Duration,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `path`, or the first default location that exists.
    ///
    /// An explicit path must exist. Without one, missing files fall back to built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MapperError> {
        let config_path = match path {
            Some(path) => Some(Utf8PathBuf::from(path)),
            None => Self::default_locations()
                .into_iter()
                .find(|candidate| candidate.as_std_path().exists()),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default(), None);
        };

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| MapperError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MapperError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config, Some(config_path))
    }

    pub fn default_locations() -> Vec<Utf8PathBuf> {
        let mut locations = vec![Utf8PathBuf::from(CONFIG_FILE)];
        if let Some(user) = BaseDirs::new().and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.config_dir().join("kira-idmap").join(CONFIG_FILE)).ok()
        }) {
            locations.push(user);
        }
        locations
    }

    pub fn resolve_config(
        config: Config,
        source: Option<Utf8PathBuf>,
    ) -> Result<ResolvedConfig, MapperError> {
        let defaults = EngineSettings::default();
        let retry = RetryPolicy::new(
            config.aggregator_retries.unwrap_or(DEFAULT_ATTEMPTS),
            Duration::from_millis(config.retry_delay_ms.unwrap_or(0)),
        );
        let settings = EngineSettings {
            retry,
            archive_batch_size: config
                .archive_batch_size
                .unwrap_or(defaults.archive_batch_size)
                .max(1),
            archive_workers: config
                .archive_workers
                .unwrap_or(defaults.archive_workers)
                .max(1),
            aggregator_batch_size: config
                .aggregator_batch_size
                .unwrap_or(defaults.aggregator_batch_size)
                .max(1),
        };

        let base = Endpoints::default();
        let endpoints = Endpoints {
            uniprot: trim_base(config.endpoints.uniprot).unwrap_or(base.uniprot),
            hgnc: trim_base(config.endpoints.hgnc).unwrap_or(base.hgnc),
            ensembl: trim_base(config.endpoints.ensembl).unwrap_or(base.ensembl),
            mygene: trim_base(config.endpoints.mygene).unwrap_or(base.mygene),
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            source,
            settings,
            endpoints,
            species: config
                .species
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| "human".to_string()),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(60).max(1)),
        })
    }
}

fn trim_base(value: Option<String>) -> Option<String> {
    value
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
}
