use crate::peaks::{
    PeakId,
    SampleId,
};

/// Problems with user supplied configuration, raised before any work starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown storage kind: '{0}' (expected dense, sparse, row_compressed or auto)")]
    UnknownStorageKind(String),

    #[error("Worker pool size must be positive")]
    EmptyPool,

    #[error("Could not build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid value for '{name}': {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

/// Malformed input data. Never corrected silently.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Duplicate peak id {peak} in sample '{sample}'")]
    DuplicatePeakId { sample: SampleId, peak: PeakId },

    #[error("Duplicate sample id '{0}'")]
    DuplicateSampleId(SampleId),

    #[error("Peak {peak} in sample '{sample}' has {masses} masses but {intensities} intensities")]
    SpectrumLength {
        sample: SampleId,
        peak: PeakId,
        masses: usize,
        intensities: usize,
    },

    #[error("Peak {peak} in sample '{sample}' has {found} retention times, expected 1 or 2")]
    RetentionTimeLength {
        sample: SampleId,
        peak: PeakId,
        found: usize,
    },

    #[error("Peak {peak} in sample '{sample}' has masses out of ascending order")]
    UnsortedSpectrum { sample: SampleId, peak: PeakId },

    #[error("Peak {peak} in sample '{sample}' has a non-finite retention time")]
    InvalidRetentionTime { sample: SampleId, peak: PeakId },

    #[error(
        "Peak {peak} in sample '{sample}' has {found} retention time dimensions, expected {expected}"
    )]
    DimensionMismatch {
        sample: SampleId,
        peak: PeakId,
        expected: usize,
        found: usize,
    },
}

/// Raised by a similarity function for a single pair.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimilarityError {
    #[error("Retention time vectors differ in length ({0} vs {1})")]
    DimensionMismatch(usize, usize),

    #[error("Similarity failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("Sample '{0}' is not part of this alignment")]
    UnknownSample(SampleId),

    #[error("Clique row {0} is out of range")]
    UnknownClique(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum AlignmentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Similarity computation was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AlignmentError>;
