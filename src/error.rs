use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid pattern {0:?}: {1}")]
    PatternInvalid(String, String),

    #[error("seed derivation failed: {0}")]
    SeedDerivationFailed(String),

    #[error("accelerator unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("grouped inverse hit a zero delta")]
    ArithDegenerate,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal invariant broken: {0}")]
    InternalInvariantBroken(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
