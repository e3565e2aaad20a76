use std::{io, path::PathBuf};

use _model::Source;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{site}: http status {status} from {url}")]
    Status {
        site: Source,
        url: String,
        status: u16,
    },
    #[error("{site}: request to {url} failed: {cause}")]
    Network {
        site: Source,
        url: String,
        cause: String,
    },
}

impl FetchError {
    pub fn site(&self) -> Source {
        match self {
            Self::Status { site, .. } => *site,
            Self::Network { site, .. } => *site,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("{site}: no {expected} found, markup may have changed")]
    MissingStructure {
        site: Source,
        expected: &'static str,
    },
    #[error("invalid selector {0:?}")]
    Selector(&'static str),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("email: {0}")]
    Email(String),
    #[error("webhook returned status {0}")]
    WebhookStatus(u16),
    #[error("webhook: {0}")]
    Webhook(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },
    #[error("history at {path} is not valid")]
    Corrupt {
        path: PathBuf,
        #[source]
        cause: serde_json::Error,
    },
    #[error("entry {entry} of {path} is not a valid price record: {cause}")]
    InvalidRecord {
        path: PathBuf,
        entry: usize,
        cause: serde_json::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },
    #[error("failed to serialize history")]
    Serialize(#[from] serde_json::Error),
}
