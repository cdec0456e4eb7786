//! Errors raised while importing a dataset

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionError;

/// Errors that abort an import run
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Cannot create {edge_type} edge: no {label} with {key} = {value}")]
    UnresolvedEndpoint {
        edge_type: String,
        label: String,
        key: String,
        value: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ImportResult<T> = Result<T, ImportError>;
