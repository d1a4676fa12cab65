//! Errors raised by the shared model and config code

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file unreadable, unparsable or holding a bad value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected value from a request (session type, role, profile field)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
