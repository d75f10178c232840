use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MapperError;

static UNIPROT_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.\-]+$").expect("static uniprot pattern"));

/// Suffix UniProt uses for human entry names (`P53_HUMAN`).
pub const SPECIES_SUFFIX: &str = "_HUMAN";
/// Marker carried by every DIP interactor id (`DIP-12345N`).
pub const DIP_MARKER: &str = "DIP-";
/// Tokens that flag an identifier as belonging to some other authority.
const FOREIGN_MARKERS: [&str; 2] = ["CHEBI:", SPECIES_SUFFIX];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
    Uniprot,
    Symbol,
    Ensembl,
    EnsemblProtein,
    Entrez,
    Dip,
    Refseq,
}

impl Namespace {
    pub const ALL: [Namespace; 7] = [
        Namespace::Uniprot,
        Namespace::Symbol,
        Namespace::Ensembl,
        Namespace::EnsemblProtein,
        Namespace::Entrez,
        Namespace::Dip,
        Namespace::Refseq,
    ];

    /// Cheap syntactic screen applied before an identifier is sent anywhere.
    ///
    /// Namespaces without a rule accept everything and leave rejection to the backend.
    pub fn accepts(&self, id: &str) -> bool {
        match self {
            Namespace::Uniprot => id.contains(SPECIES_SUFFIX) || UNIPROT_CHARSET.is_match(id),
            Namespace::Symbol => !FOREIGN_MARKERS.iter().any(|marker| id.contains(marker)),
            Namespace::Dip => id.contains(DIP_MARKER),
            Namespace::Refseq => id.contains('_'),
            Namespace::Ensembl | Namespace::EnsemblProtein | Namespace::Entrez => true,
        }
    }

    /// Database name used by the UniProt ID-mapping service when this namespace is the target.
    pub fn accession_db(&self) -> &'static str {
        match self {
            Namespace::Uniprot => "UniProtKB",
            Namespace::Symbol => "Gene_Name",
            Namespace::Ensembl => "Ensembl",
            Namespace::EnsemblProtein => "Ensembl_Protein",
            Namespace::Entrez => "GeneID",
            Namespace::Dip => "DIP",
            Namespace::Refseq => "RefSeq_Protein",
        }
    }

    /// Scope to search when identifiers of this namespace are the query terms.
    pub fn aggregator_scope(&self) -> &'static str {
        match self {
            Namespace::Uniprot => "uniprot",
            Namespace::Symbol => "symbol",
            Namespace::Ensembl => "ensembl.gene",
            Namespace::EnsemblProtein => "ensembl.protein",
            Namespace::Entrez => "entrezgene",
            Namespace::Dip => "dip",
            Namespace::Refseq => "refseq",
        }
    }

    /// Document field holding this namespace's identifier in an aggregator gene record.
    pub fn aggregator_field(&self) -> &'static str {
        match self {
            Namespace::Uniprot => "uniprot",
            Namespace::Symbol => "symbol",
            Namespace::Ensembl => "ensembl.gene",
            Namespace::EnsemblProtein => "ensembl.protein",
            Namespace::Entrez => "entrezgene",
            Namespace::Dip => "dip",
            Namespace::Refseq => "refseq.protein",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Namespace::Uniprot => "Uniprot",
            Namespace::Symbol => "Symbol",
            Namespace::Ensembl => "Ensembl",
            Namespace::EnsemblProtein => "EnsemblProtein",
            Namespace::Entrez => "Entrez",
            Namespace::Dip => "DIP",
            Namespace::Refseq => "Refseq",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Namespace {
    type Err = MapperError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .to_ascii_lowercase()
            .replace(['-', '_'], "");
        match normalized.as_str() {
            "uniprot" => Ok(Namespace::Uniprot),
            "symbol" => Ok(Namespace::Symbol),
            "ensembl" => Ok(Namespace::Ensembl),
            "ensemblprotein" => Ok(Namespace::EnsemblProtein),
            "entrez" => Ok(Namespace::Entrez),
            "dip" => Ok(Namespace::Dip),
            "refseq" => Ok(Namespace::Refseq),
            _ => Err(MapperError::InvalidNamespace(value.to_string())),
        }
    }
}

/// Renders a JSON scalar as the canonical identifier string.
///
/// Entrez ids arrive as numbers from some services and strings from others; both must key
/// the same map entry, so integral numbers drop any fractional part and strings are trimmed.
pub fn normalize_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => {
            if let Some(int) = number.as_u64() {
                Some(int.to_string())
            } else if let Some(int) = number.as_i64() {
                Some(int.to_string())
            } else {
                number.as_f64().map(|float| {
                    if float.fract() == 0.0 {
                        format!("{}", float as i64)
                    } else {
                        float.to_string()
                    }
                })
            }
        }
        _ => None,
    }
}

/// Drops a trailing `.N` version from a stable id (`ENSG00000139618.15` -> `ENSG00000139618`).
pub fn strip_version(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}
