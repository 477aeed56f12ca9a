use std::fmt::{self, Display};
use std::path::PathBuf;

use thiserror::Error;

use super::types::{AoeAddress, DevicePath};

#[derive(Error, Debug)]
pub enum AoeError {
    #[error("invalid share option: {0}")]
    Syntax(String),

    #[error("AoE support unavailable: {} is not an executable", .0.display())]
    Unavailable(PathBuf),

    #[error("vblade command failed: {0}")]
    CommandFailed(String),

    #[error("{address} on {netif} already exports {device}")]
    AddressInUse {
        address: AoeAddress,
        netif: String,
        device: DevicePath,
    },

    #[error("unusable share options: {0}")]
    InvalidOptions(String),

    #[error("invalid share: {0}")]
    InvalidShare(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("out of memory while copying share options")]
    NoMemory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes reported back to the volume manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    System,
    NoMemory,
}

impl AoeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AoeError::Syntax(_) => ErrorKind::Syntax,
            AoeError::NoMemory => ErrorKind::NoMemory,
            AoeError::Unavailable(_)
            | AoeError::CommandFailed(_)
            | AoeError::AddressInUse { .. }
            | AoeError::InvalidOptions(_)
            | AoeError::InvalidShare(_)
            | AoeError::InvalidName(_)
            | AoeError::Io(_) => ErrorKind::System,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "SYNTAX_ERR"),
            ErrorKind::System => write!(f, "SYSTEM_ERR"),
            ErrorKind::NoMemory => write!(f, "NO_MEMORY"),
        }
    }
}

pub type Result<T> = std::result::Result<T, AoeError>;
