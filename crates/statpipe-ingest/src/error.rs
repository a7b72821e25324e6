//! Error types for the ingest crate

use statpipe_common::CommonError;
use statpipe_core::EtlError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Etl(#[from] EtlError),

    #[error(transparent)]
    Common(#[from] CommonError),

    /// An environment variable or flag holds an unusable value
    #[error("Configuration error: {0}. Check your environment variables or command-line flags.")]
    Config(String),

    #[error("Unknown source '{0}'. Expected one of: gti, unctadstat")]
    UnknownSource(String),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        IngestError::Config(msg.into())
    }
}
