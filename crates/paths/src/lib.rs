// SPDX-License-Identifier: MPL-2.0

//! Search-path tables and directory classification.
//!
//! [`LookupPaths`] is immutable once constructed: every field is already
//! prefixed with `root_dir` (when one is set), so callers never thread a
//! root prefix through individual path builders.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Which family of unit directories a [`LookupPaths`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    System,
    User,
    Global,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0:?} is not under root {1:?}")]
    NotUnderRoot(PathBuf, PathBuf),
    #[error("duplicate search path entry: {0:?}")]
    DuplicateSearchPath(PathBuf),
}

/// Flags shared by every high-level verb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub runtime: bool,
    pub force: bool,
    pub portable: bool,
    pub dry_run: bool,
    pub ignore_auxiliary_failure: bool,
}

#[derive(Debug, Clone)]
pub struct LookupPaths {
    pub scope: Scope,
    pub root_dir: Option<PathBuf>,
    pub search_path: Vec<PathBuf>,
    pub persistent_config: PathBuf,
    pub runtime_config: PathBuf,
    pub persistent_attached: PathBuf,
    pub runtime_attached: PathBuf,
    pub generator: PathBuf,
    pub generator_early: PathBuf,
    pub generator_late: PathBuf,
    pub transient: PathBuf,
    pub persistent_control: PathBuf,
    pub runtime_control: PathBuf,
}

struct RawTable {
    search_path: &'static [&'static str],
    persistent_config: &'static str,
    runtime_config: &'static str,
    persistent_attached: &'static str,
    runtime_attached: &'static str,
    generator: &'static str,
    generator_early: &'static str,
    generator_late: &'static str,
    transient: &'static str,
    persistent_control: &'static str,
    runtime_control: &'static str,
}

const SYSTEM_TABLE: RawTable = RawTable {
    search_path: &[
        "/etc/systemd/system",
        "/run/systemd/system",
        "/usr/local/lib/systemd/system",
        "/usr/lib/systemd/system",
        "/lib/systemd/system",
    ],
    persistent_config: "/etc/systemd/system",
    runtime_config: "/run/systemd/system",
    persistent_attached: "/etc/systemd/system/attached",
    runtime_attached: "/run/systemd/system/attached",
    generator: "/run/systemd/generator",
    generator_early: "/run/systemd/generator.early",
    generator_late: "/run/systemd/generator.late",
    transient: "/run/systemd/transient",
    persistent_control: "/etc/systemd/system.control",
    runtime_control: "/run/systemd/system.control",
};

const USER_TABLE: RawTable = RawTable {
    search_path: &[
        "/etc/systemd/user",
        "/run/systemd/user",
        "/usr/local/lib/systemd/user",
        "/usr/lib/systemd/user",
        "/lib/systemd/user",
    ],
    persistent_config: "/etc/systemd/user",
    runtime_config: "/run/systemd/user",
    persistent_attached: "/etc/systemd/user/attached",
    runtime_attached: "/run/systemd/user/attached",
    generator: "/run/systemd/user-generator",
    generator_early: "/run/systemd/user-generator.early",
    generator_late: "/run/systemd/user-generator.late",
    transient: "/run/systemd/transient",
    persistent_control: "/etc/systemd/user.control",
    runtime_control: "/run/systemd/user.control",
};

const GLOBAL_TABLE: RawTable = RawTable {
    search_path: &[
        "/run/systemd/user",
        "/usr/local/lib/systemd/user",
        "/usr/lib/systemd/user",
        "/lib/systemd/user",
    ],
    ..USER_TABLE
};

impl RawTable {
    fn for_scope(scope: Scope) -> &'static RawTable {
        match scope {
            Scope::System => &SYSTEM_TABLE,
            Scope::User => &USER_TABLE,
            Scope::Global => &GLOBAL_TABLE,
        }
    }
}

fn under_root(root: Option<&Path>, raw: &str) -> PathBuf {
    match root {
        None => PathBuf::from(raw),
        Some(root) => root.join(raw.trim_start_matches('/')),
    }
}

impl LookupPaths {
    /// Build the path tables for `scope`, optionally rooted under `root_dir`.
    pub fn new(scope: Scope, root_dir: Option<PathBuf>) -> Result<Self, Error> {
        let raw = RawTable::for_scope(scope);
        let root = root_dir.as_deref();

        let mut search_path = Vec::new();
        for entry in raw.search_path {
            let full = under_root(root, entry);
            if search_path.contains(&full) {
                return Err(Error::DuplicateSearchPath(full));
            }
            search_path.push(full);
        }

        Ok(Self {
            scope,
            root_dir: root_dir.clone(),
            search_path,
            persistent_config: under_root(root, raw.persistent_config),
            runtime_config: under_root(root, raw.runtime_config),
            persistent_attached: under_root(root, raw.persistent_attached),
            runtime_attached: under_root(root, raw.runtime_attached),
            generator: under_root(root, raw.generator),
            generator_early: under_root(root, raw.generator_early),
            generator_late: under_root(root, raw.generator_late),
            transient: under_root(root, raw.transient),
            persistent_control: under_root(root, raw.persistent_control),
            runtime_control: under_root(root, raw.runtime_control),
        })
    }

    /// Strip `root_dir` from `p`, returning an absolute path as seen from
    /// inside the root. Identity when no root is set.
    pub fn skip_root(&self, p: &Path) -> Result<PathBuf, Error> {
        match &self.root_dir {
            None => Ok(p.to_path_buf()),
            Some(root) => {
                let stripped = p
                    .strip_prefix(root)
                    .map_err(|_| Error::NotUnderRoot(p.to_path_buf(), root.clone()))?;
                Ok(Path::new("/").join(stripped))
            }
        }
    }

    /// The destination config directory selected by `flags`: exactly one
    /// of `persistent_config`/`runtime_config` is chosen per operation via
    /// `RUNTIME`, or the attached variants under `PORTABLE`.
    pub fn config_path(&self, flags: Flags) -> &Path {
        match (flags.portable, flags.runtime) {
            (true, true) => &self.runtime_attached,
            (true, false) => &self.persistent_attached,
            (false, true) => &self.runtime_config,
            (false, false) => &self.persistent_config,
        }
    }

    pub fn is_config(&self, p: &Path) -> bool {
        matches!(p.parent(), Some(d) if d == self.persistent_config || d == self.runtime_config)
    }

    pub fn is_generator(&self, p: &Path) -> bool {
        matches!(p.parent(), Some(d) if d == self.generator || d == self.generator_early || d == self.generator_late)
    }

    pub fn is_transient(&self, p: &Path) -> bool {
        matches!(p.parent(), Some(d) if d == self.transient)
    }

    pub fn is_control(&self, p: &Path) -> bool {
        matches!(p.parent(), Some(d) if d == self.persistent_control || d == self.runtime_control)
    }

    /// `runtime ⟺ skip_root(p)` starts with `/run` **or** `dirname(p)` is
    /// one of the runtime-family directories. These two checks can
    /// disagree when `root_dir` remaps `/run` elsewhere — both are
    /// preserved and OR'd, deliberately, rather than collapsed into one.
    pub fn is_runtime(&self, p: &Path) -> bool {
        let subtree = self
            .skip_root(p)
            .map(|skipped| skipped.starts_with("/run"))
            .unwrap_or(false);
        let parent_match = matches!(p.parent(), Some(d) if d == self.runtime_config
            || d == self.runtime_attached
            || d == self.runtime_control);
        subtree || parent_match
    }

    /// `vendor-or-generator ⟺ skip_root(p)` starts with `/usr`, or `p` is
    /// the system unit data directory, or `p` classifies as generator.
    pub fn is_vendor_or_generator(&self, p: &Path) -> bool {
        let under_usr = self
            .skip_root(p)
            .map(|skipped| skipped.starts_with("/usr"))
            .unwrap_or(false);
        under_usr || self.is_generator(p)
    }

    /// Index of the search-path entry containing `p`, if any. Earlier
    /// indices shadow later ones for the same basename.
    pub fn search_path_rank(&self, p: &Path) -> Option<usize> {
        let dir = p.parent()?;
        self.search_path.iter().position(|entry| entry == dir)
    }

    pub fn is_in_search_path(&self, p: &Path) -> bool {
        self.search_path_rank(p).is_some()
    }

    /// Is `p` under the user's own scope, i.e. not a vendor/runtime/shared
    /// directory but the first (highest priority) search-path entry for a
    /// `User` scope lookup. Used by the state classifier's `enabled` vs.
    /// `enabled-runtime` split for user units.
    pub fn is_user_config(&self, p: &Path) -> bool {
        self.scope == Scope::User && matches!(p.parent(), Some(d) if Some(d) == self.search_path.first().map(|p| p.as_path()))
    }
}
