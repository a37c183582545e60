use thiserror::Error;

/// Error kinds shared across the whole run. Everything except config load and
/// workbook open/create is handled at row/model granularity by the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet error: {0}")]
    Sheet(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("api error: {0}")]
    Api(String),
}
