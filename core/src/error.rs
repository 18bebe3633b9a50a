use std::fmt;
use thiserror::Error;

/// Store mutation that triggered a persistence failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Remove,
    Clear,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Add => "add favorite",
            Operation::Remove => "remove favorite",
            Operation::Clear => "clear favorites",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to {op}{}: {source}", quoted_id(.id))]
    Persist {
        op: Operation,
        id: Option<String>,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Operation that failed, if this is a store-level persistence failure
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::Persist { op, .. } => Some(*op),
            _ => None,
        }
    }
}

fn quoted_id(id: &Option<String>) -> String {
    id.as_deref().map(|id| format!(" '{}'", id)).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
