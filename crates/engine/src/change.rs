// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use crate::error::Error;

/// One mutation attempt or reportable anomaly. The sole audit trail a
/// verb returns to its caller.
#[derive(Debug)]
pub enum ChangeRecord {
    Symlink { path: PathBuf, source: PathBuf },
    Unlink { path: PathBuf },
    IsMasked { path: PathBuf },
    IsDangling { path: PathBuf },
    DestinationNotPresent { path: PathBuf },
    AuxiliaryFailed { path: PathBuf },
    Error { path: PathBuf, source: Option<PathBuf>, error: Error },
}

impl ChangeRecord {
    pub fn path(&self) -> &std::path::Path {
        match self {
            ChangeRecord::Symlink { path, .. }
            | ChangeRecord::Unlink { path }
            | ChangeRecord::IsMasked { path }
            | ChangeRecord::IsDangling { path }
            | ChangeRecord::DestinationNotPresent { path }
            | ChangeRecord::AuxiliaryFailed { path }
            | ChangeRecord::Error { path, .. } => path,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ChangeRecord::Error { .. })
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, ChangeRecord::Symlink { .. } | ChangeRecord::Unlink { .. })
    }
}

impl std::fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeRecord::Symlink { path, source } => write!(f, "symlink  {path:?} -> {source:?}"),
            ChangeRecord::Unlink { path } => write!(f, "unlink   {path:?}"),
            ChangeRecord::IsMasked { path } => write!(f, "masked   {path:?}"),
            ChangeRecord::IsDangling { path } => write!(f, "dangling {path:?}"),
            ChangeRecord::DestinationNotPresent { path } => write!(f, "missing  {path:?}"),
            ChangeRecord::AuxiliaryFailed { path } => write!(f, "aux-fail {path:?}"),
            ChangeRecord::Error { path, error, .. } => write!(f, "error    {path:?}: {error}"),
        }
    }
}
