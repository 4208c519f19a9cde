use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unrecognized status: {0}")]
    UnrecognizedStatus(i64),

    #[error("Missing measurement for OK reading: {0}")]
    MissingMeasurement(&'static str),

    #[error("Invalid decimal value for {field}: {value}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("Risk factor computation overflowed: {0}")]
    RiskComputationOverflow(String),

    #[error("Corrupt entry: {0}")]
    CorruptEntry(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
