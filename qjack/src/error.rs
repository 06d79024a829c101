use std::path::PathBuf;

use thiserror::Error;

use crate::simulation::GamePhase;

/// Errors surfaced by the game, the learning core and the training loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid game rules: {0}")]
    InvalidRules(String),

    #[error("Invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),

    #[error("Invalid training config: {0}")]
    InvalidConfig(String),

    #[error("No valid actions provided")]
    NoValidActions,

    /// The caller queried something that only exists in another game phase,
    /// e.g. the outcome of a round that is still being played.
    #[error("{operation} is not allowed in the {phase:?} phase")]
    NotReady {
        operation: &'static str,
        phase: GamePhase,
    },

    #[error("Unsupported q-table version {0}")]
    UnsupportedVersion(u32),

    #[error("Corrupt q-table: {0}")]
    CorruptTable(String),

    #[error("Malformed agent metadata: {0}")]
    Metadata(String),

    #[error("Failed to format report")]
    Format(#[from] std::fmt::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
