use download_common::error::{ClassifierError, ParseHttpMethodError};
use thiserror::Error;

/// Enumeration of errors raised while reading the tool configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("the tool configuration is not valid JSON: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("invalid HTTP action: {0}")]
    HttpActionError(#[from] ParseHttpMethodError),
}

/// Enumeration of errors that can occur as a transport sends a request.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("error parsing request url: {0}")]
    ParseUrlError(#[from] url::ParseError),
    #[error("error parsing request headers: {0}")]
    ParseHeadersError(String),
    #[error("the request could not be completed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("error reading the response body: {0}")]
    ReadBodyError(#[from] std::io::Error),
}

/// Enumeration of errors returned by the `DownloadTool` lifecycle.
///
/// User-facing problems are reported through the messenger; these are the failures the
/// host has to stop on.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{operation} is not valid while the tool is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("the tool accepts a single incoming connection, {0} was refused")]
    TooManyInputs(String),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}
