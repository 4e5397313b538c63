use moldserve_api::ServeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Manifest error: {0}")]
    Manifest(String),
    #[error(transparent)]
    Serve(#[from] ServeError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
