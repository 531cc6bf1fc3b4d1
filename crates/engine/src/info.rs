// SPDX-License-Identifier: MPL-2.0

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// On-disk shape of a discovered unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Symlink { target: PathBuf },
    Masked,
    Unknown,
}

/// One discovered unit, with its `[Install]` section parsed out.
#[derive(Debug, Clone)]
pub struct InstallInfo {
    pub name: String,
    pub path: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub file_type: FileType,
    pub aliases: Vec<String>,
    pub wanted_by: Vec<String>,
    pub required_by: Vec<String>,
    pub also: Vec<String>,
    pub default_instance: Option<String>,
    /// `true` if this record was pulled in via another unit's `Also=`.
    pub auxiliary: bool,
}

impl InstallInfo {
    fn new(name: String, path: Option<PathBuf>, root: Option<PathBuf>, auxiliary: bool) -> Self {
        Self {
            name,
            path,
            root,
            file_type: FileType::Unknown,
            aliases: Vec::new(),
            wanted_by: Vec::new(),
            required_by: Vec::new(),
            also: Vec::new(),
            default_instance: None,
            auxiliary,
        }
    }

    pub fn is_masked(&self) -> bool {
        matches!(self.file_type, FileType::Masked)
    }

    /// An install rule exists when there's something for a verb to act on:
    /// an alias, a dependency edge, or an `Also=` fan-out.
    pub fn has_install_rules(&self) -> bool {
        !self.aliases.is_empty() || !self.wanted_by.is_empty() || !self.required_by.is_empty()
    }
}

/// Scratch space for one verb invocation: the frontier (`will_process`)
/// and the retired set (`have_processed`). Entries move
/// `will_process -> have_processed` exactly once; re-`add`ing by name
/// merges `auxiliary` with AND rather than creating a second record.
#[derive(Debug, Default)]
pub struct InstallContext {
    will_process: HashMap<String, InstallInfo>,
    have_processed: HashMap<String, InstallInfo>,
}

impl InstallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit to the frontier (or merge into an existing record).
    /// Returns the canonical name so callers can look the record up again
    /// without holding a borrow across later mutations — `Also=`
    /// expansion in particular needs this, since it both reads the current
    /// record and adds new ones in the same pass.
    pub fn add(&mut self, name: Option<String>, path: Option<PathBuf>, root: Option<PathBuf>, auxiliary: bool) -> String {
        let name = name.unwrap_or_else(|| {
            path.as_deref()
                .and_then(Path::file_name)
                .and_then(|s| s.to_str())
                .expect("add() requires a name or a path with a file name")
                .to_owned()
        });

        if let Some(existing) = self.have_processed.get_mut(&name) {
            existing.auxiliary &= auxiliary;
            return name;
        }
        if let Some(existing) = self.will_process.get_mut(&name) {
            existing.auxiliary &= auxiliary;
            if existing.path.is_none() {
                existing.path = path;
            }
            return name;
        }

        self.will_process.insert(name.clone(), InstallInfo::new(name.clone(), path, root, auxiliary));
        name
    }

    pub fn find(&self, name: &str) -> Option<&InstallInfo> {
        self.have_processed.get(name).or_else(|| self.will_process.get(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut InstallInfo> {
        if self.have_processed.contains_key(name) {
            self.have_processed.get_mut(name)
        } else {
            self.will_process.get_mut(name)
        }
    }

    /// Pop the next frontier entry, if any, for `traverse` to process.
    pub fn next_pending(&self) -> Option<String> {
        self.will_process.keys().next().cloned()
    }

    /// Move `name` from `will_process` to `have_processed`. A no-op if it's
    /// already retired.
    pub fn retire(&mut self, name: &str) {
        if let Some(info) = self.will_process.remove(name) {
            self.have_processed.insert(name.to_owned(), info);
        }
    }

    pub fn have_processed(&self) -> impl Iterator<Item = &InstallInfo> {
        self.have_processed.values()
    }
}
