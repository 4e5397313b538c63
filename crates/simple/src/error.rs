use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimpleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SimpleError>;
