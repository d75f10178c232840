use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MapperError {
    #[error("invalid namespace: {0}")]
    #[diagnostic(help(
        "expected one of: uniprot, symbol, ensembl, ensembl-protein, entrez, dip, refseq"
    ))]
    InvalidNamespace(String),

    #[error("invalid retention policy: {0}")]
    #[diagnostic(help("expected one of: updated, present, all"))]
    InvalidRetention(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read identifier list {path}: {message}")]
    InputRead { path: Utf8PathBuf, message: String },

    #[error("uniprot request failed: {0}")]
    UniprotHttp(String),

    #[error("uniprot returned status {status}: {message}")]
    UniprotStatus { status: u16, message: String },

    #[error("uniprot id mapping job failed: {0}")]
    IdMappingJob(String),

    #[error("HGNC request failed: {0}")]
    HgncHttp(String),

    #[error("HGNC returned status {status}: {message}")]
    HgncStatus { status: u16, message: String },

    #[error("Ensembl request failed: {0}")]
    EnsemblHttp(String),

    #[error("Ensembl returned status {status}: {message}")]
    EnsemblStatus { status: u16, message: String },

    #[error("MyGene.info request failed: {0}")]
    MyGeneHttp(String),

    #[error("MyGene.info returned status {status}: {message}")]
    MyGeneStatus { status: u16, message: String },

    #[error("{operation} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        operation: String,
        attempts: usize,
        message: String,
    },
}

impl MapperError {
    /// True for failures raised by a remote service rather than by local input.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            MapperError::UniprotHttp(_)
                | MapperError::UniprotStatus { .. }
                | MapperError::IdMappingJob(_)
                | MapperError::HgncHttp(_)
                | MapperError::HgncStatus { .. }
                | MapperError::EnsemblHttp(_)
                | MapperError::EnsemblStatus { .. }
                | MapperError::MyGeneHttp(_)
                | MapperError::MyGeneStatus { .. }
                | MapperError::RetriesExhausted { .. }
        )
    }
}
