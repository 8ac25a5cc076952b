use thiserror::Error;

#[derive(Error, Debug)]
pub enum CityPulseError {
    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
