use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure to read an exposition stream. Malformed lines are never errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to read exposition stream: {0}")]
    Read(#[from] io::Error),
}

/// Why a single scrape of a target produced nothing.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("response body larger than {0} bytes")]
    BodyTooLarge(usize),
    #[error(transparent)]
    Decode(#[from] CodecError),
}
