// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use thiserror::Error;

/// The error taxonomy for this crate. Every variant here can appear in a
/// [`crate::change::ChangeRecord::Error`]; whether a given call site
/// surfaces it to the caller or only logs it and continues is a property
/// of *where* it's produced, not of the variant itself — see the call
/// sites in `discover`/`materialize`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid unit name: {0}")]
    InvalidName(#[from] unitname::Error),

    #[error("unit {0} not found")]
    NotFound(String),

    #[error("symlink loop following {0:?}")]
    SymlinkLoop(PathBuf),

    #[error("unit {0} is masked")]
    Masked(String),

    #[error("{0:?} is generated or transient and cannot be modified directly")]
    TransientOrGenerated(PathBuf),

    #[error("{0} is not a template")]
    NotATemplate(String),

    #[error("{0} cannot be used as an instance reference for a template")]
    InvalidTemplateRef(String),

    #[error("{0:?} already exists and points elsewhere")]
    Exists(PathBuf),

    #[error("dependency target {0} is not installed")]
    DestinationNotPresent(String),

    #[error("auxiliary unit {0} could not be enabled")]
    AuxiliaryFailed(String),

    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?}:{line}: {message}")]
    ParseError { path: PathBuf, line: usize, message: String },

    #[error("lookup paths")]
    Paths(#[from] paths::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}
