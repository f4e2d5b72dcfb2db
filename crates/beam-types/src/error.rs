use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeamError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data out of model range: {0}")]
    DataRange(String),

    #[error("Solver failed to converge after {iterations} iterations: {message}")]
    NumericConvergence { iterations: usize, message: String },

    #[error("Cache holds {cached} charge states but the incoming bunch has {incoming}")]
    CacheConsistency { cached: usize, incoming: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BeamResult<T> = Result<T, BeamError>;
