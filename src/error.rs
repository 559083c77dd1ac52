use thiserror::Error;

#[derive(Error, Debug)]
pub enum RexecError {
    #[error("No endpoint configured for path: {0}")]
    EndpointNotFound(String),

    #[error("A job for endpoint {0} is already running")]
    EndpointBusy(String),

    #[error("Job store is at capacity")]
    StoreFull,

    #[error("No job found with id: {0}")]
    JobNotFound(String),

    #[error("Failed to start process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Process supervision failed: {0}")]
    Execution(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RexecError>;
