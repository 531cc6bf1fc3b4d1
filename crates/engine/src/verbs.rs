// SPDX-License-Identifier: MPL-2.0

//! The high-level operations a caller actually drives: `enable`,
//! `disable`, `mask`, `preset`, `revert` and friends. Each one builds a
//! fresh [`InstallContext`], runs discovery over its inputs, and either
//! materializes or removes symlinks under a single config directory
//! chosen by `flags`.

use std::{
    collections::{BTreeSet, HashSet},
    path::{Path, PathBuf},
};

use fs_err as fs;
use paths::{Flags, LookupPaths};

use crate::{change::ChangeRecord, discover, error::Error, info::InstallContext, materialize, state};

/// The return shape of every verb: the audit trail plus a scalar summary.
/// A negative `count` means the operation could not be started at all;
/// otherwise `count` is the number of mutations applied.
#[derive(Debug)]
pub struct Outcome {
    pub changes: Vec<ChangeRecord>,
    pub count: i64,
}

impl Outcome {
    fn from_changes(changes: Vec<ChangeRecord>) -> Self {
        let count = changes.iter().filter(|c| c.is_mutation()).count() as i64;
        Self { changes, count }
    }

    fn failed(error: Error, path: impl Into<PathBuf>) -> Self {
        Self { changes: vec![ChangeRecord::Error { path: path.into(), source: None, error }], count: -1 }
    }
}

pub fn enable(lp: &LookupPaths, flags: Flags, names: &[String]) -> Outcome {
    let mut ctx = InstallContext::new();
    let results = discover::discover_all(&mut ctx, lp, names);
    let mut changes = Vec::new();

    for (name, result) in results {
        if let Err(error) = result {
            changes.push(ChangeRecord::Error { path: PathBuf::from(&name), source: None, error });
            continue;
        }
        let info = ctx.find(&name).expect("just discovered").clone();
        changes.extend(materialize::install_one(lp, flags, &info));
    }

    Outcome::from_changes(changes)
}

pub fn disable(lp: &LookupPaths, flags: Flags, names: &[String]) -> Outcome {
    let marks: HashSet<String> = names.iter().cloned().collect();
    let config_path = lp.config_path(flags).to_path_buf();
    Outcome::from_changes(materialize::remove_marked_symlinks(lp, &config_path, flags, &marks))
}

/// `reenable(u) = disable(basename(u)); enable(u)` — the disable phase
/// strips any path components so a link currently pointing into a
/// different directory is still removed by name.
pub fn reenable(lp: &LookupPaths, flags: Flags, names: &[String]) -> Outcome {
    let basenames: Vec<String> = names
        .iter()
        .map(|n| Path::new(n).file_name().and_then(|f| f.to_str()).unwrap_or(n).to_owned())
        .collect();

    let mut changes = disable(lp, flags, &basenames).changes;
    let enabled = enable(lp, flags, names);
    changes.extend(enabled.changes);
    Outcome::from_changes(changes)
}

pub fn mask(lp: &LookupPaths, flags: Flags, names: &[String]) -> Outcome {
    let changes = names.iter().flat_map(|name| materialize::mask(lp, flags, name)).collect();
    Outcome::from_changes(changes)
}

pub fn unmask(lp: &LookupPaths, flags: Flags, names: &[String]) -> Outcome {
    let changes = names.iter().flat_map(|name| materialize::unmask(lp, flags, name)).collect();
    Outcome::from_changes(changes)
}

/// `systemctl link`: force a symlink into existence for an arbitrary
/// absolute path, regardless of whether it's already under `search_path`.
pub fn link(lp: &LookupPaths, flags: Flags, paths_in: &[PathBuf]) -> Outcome {
    let mut changes = Vec::new();

    for p in paths_in {
        let Some(name) = p.file_name().and_then(|n| n.to_str()) else {
            changes.push(ChangeRecord::Error { path: p.clone(), source: None, error: Error::NotFound(p.display().to_string()) });
            continue;
        };
        let target = match lp.skip_root(p) {
            Ok(t) => t,
            Err(e) => {
                changes.push(ChangeRecord::Error { path: p.clone(), source: None, error: Error::Paths(e) });
                continue;
            }
        };
        let link_path = lp.config_path(flags).join(name);
        changes.extend(materialize::create_symlink(&link_path, &target, flags));
    }

    Outcome::from_changes(changes)
}

fn remove_file_change(path: &Path, dry_run: bool) -> Vec<ChangeRecord> {
    if fs::symlink_metadata(path).is_err() {
        return vec![];
    }
    if dry_run {
        return vec![ChangeRecord::Unlink { path: path.to_path_buf() }];
    }
    match fs::remove_file(path) {
        Ok(()) => vec![ChangeRecord::Unlink { path: path.to_path_buf() }],
        Err(e) => vec![ChangeRecord::Error { path: path.to_path_buf(), source: None, error: Error::io(path, e) }],
    }
}

fn remove_dir_change(dir: &Path, dry_run: bool) -> Vec<ChangeRecord> {
    if fs::symlink_metadata(dir).is_err() {
        return vec![];
    }
    if dry_run {
        return vec![ChangeRecord::Unlink { path: dir.to_path_buf() }];
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => vec![ChangeRecord::Unlink { path: dir.to_path_buf() }],
        Err(e) => vec![ChangeRecord::Error { path: dir.to_path_buf(), source: None, error: Error::io(dir, e) }],
    }
}

/// Erase a unit's config-scope footprint: drop-ins under every config/
/// control/transient directory, the config-scope copy of the file itself
/// (if a vendor copy also exists), then garbage-collect links left
/// dangling by the erasure.
pub fn revert(lp: &LookupPaths, flags: Flags, names: &[String]) -> Outcome {
    let mut changes = Vec::new();
    let dropin_roots = [&lp.persistent_config, &lp.runtime_config, &lp.persistent_control, &lp.runtime_control, &lp.transient];

    for name in names {
        for dir in dropin_roots {
            changes.extend(remove_dir_change(&dir.join(format!("{name}.d")), flags.dry_run));
        }

        let has_vendor_copy = discover::probe(lp, name).map(|p| lp.is_vendor_or_generator(&p)).unwrap_or(false);
        if has_vendor_copy {
            for dir in [&lp.persistent_config, &lp.runtime_config] {
                changes.extend(remove_file_change(&dir.join(name), flags.dry_run));
            }
        }
    }

    let marks: HashSet<String> = names.iter().cloned().collect();
    let config_path = lp.config_path(flags).to_path_buf();
    changes.extend(materialize::remove_marked_symlinks(lp, &config_path, flags, &marks));

    Outcome::from_changes(changes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Wants,
    Requires,
}

impl DependencyKind {
    fn suffix(self) -> &'static str {
        match self {
            DependencyKind::Wants => "wants",
            DependencyKind::Requires => "requires",
        }
    }
}

pub fn add_dependency(lp: &LookupPaths, flags: Flags, names: &[String], target: &str, kind: DependencyKind) -> Outcome {
    let mut ctx = InstallContext::new();
    let results = discover::discover_all(&mut ctx, lp, names);
    let mut changes = Vec::new();

    for (name, result) in results {
        if let Err(error) = result {
            changes.push(ChangeRecord::Error { path: PathBuf::from(&name), source: None, error });
            continue;
        }
        let info = ctx.find(&name).expect("just discovered").clone();
        let Some(path) = info.path.clone() else { continue };
        let link_target = match lp.skip_root(&path) {
            Ok(t) => t,
            Err(e) => {
                changes.push(ChangeRecord::Error { path, source: None, error: Error::Paths(e) });
                continue;
            }
        };
        changes.extend(materialize::install_dependency(lp, flags, &link_target, &info, target, kind.suffix()));
    }

    Outcome::from_changes(changes)
}

pub fn set_default(lp: &LookupPaths, flags: Flags, name: &str) -> Outcome {
    let mut ctx = InstallContext::new();
    let canonical = match discover::discover_one(&mut ctx, lp, name, false) {
        Ok(c) => c,
        Err(e) => return Outcome::failed(e, name),
    };
    let info = ctx.find(&canonical).expect("just discovered").clone();

    let is_target = unitname::type_of(&canonical).map(|t| t == unitname::UnitType::Target).unwrap_or(false);
    let Some(path) = (is_target.then(|| info.path.clone()).flatten()) else {
        return Outcome::failed(Error::InvalidName(unitname::Error::InvalidName(name.to_owned())), name);
    };

    let target = match lp.skip_root(&path) {
        Ok(t) => t,
        Err(e) => return Outcome::failed(Error::Paths(e), path),
    };
    let link_path = lp.config_path(flags).join("default.target");
    Outcome::from_changes(materialize::create_symlink(&link_path, &target, flags))
}

pub fn get_default(lp: &LookupPaths) -> Result<String, Error> {
    for dir in [&lp.persistent_config, &lp.runtime_config] {
        let Ok(target) = fs::read_link(dir.join("default.target")) else { continue };
        if let Some(name) = target.file_name().and_then(|n| n.to_str()) {
            return Ok(name.to_owned());
        }
    }
    Err(Error::NotFound("default.target".to_owned()))
}

/// Preset directories mirror `search_path`'s entries with `-preset`
/// appended to the final component (`/usr/lib/systemd/system-preset`, ...).
fn preset_dirs(lp: &LookupPaths) -> Vec<PathBuf> {
    lp.search_path
        .iter()
        .filter_map(|dir| {
            let parent = dir.parent()?;
            let base = dir.file_name()?.to_str()?;
            Some(parent.join(format!("{base}-preset")))
        })
        .collect()
}

fn run_preset(lp: &LookupPaths, flags: Flags, names: &[String], mode: presets::Mode) -> Outcome {
    let dirs = preset_dirs(lp);
    let rules = match presets::load(&dirs) {
        Ok(r) => r,
        Err(presets::LoadError::Io(e)) => return Outcome::failed(Error::io(dirs.first().cloned().unwrap_or_default(), e), ""),
    };

    let mut to_enable = Vec::new();
    let mut to_disable = Vec::new();
    for name in names {
        match presets::query(name, &rules) {
            presets::Query::Enable(expanded) if mode.runs_enable() => to_enable.extend(expanded),
            presets::Query::Disable if mode.runs_disable() => to_disable.push(name.clone()),
            _ => {}
        }
    }

    let mut changes = Vec::new();
    if mode.runs_disable() && !to_disable.is_empty() {
        changes.extend(disable(lp, flags, &to_disable).changes);
    }
    if mode.runs_enable() && !to_enable.is_empty() {
        changes.extend(enable(lp, flags, &to_enable).changes);
    }

    Outcome::from_changes(changes)
}

pub fn preset(lp: &LookupPaths, flags: Flags, names: &[String], mode: presets::Mode) -> Outcome {
    run_preset(lp, flags, names, mode)
}

fn discoverable_unit_names(lp: &LookupPaths) -> Vec<String> {
    let mut seen = BTreeSet::new();
    for dir in &lp.search_path {
        let Ok(entries) = fs::read_dir(dir) else { continue };
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if unitname::classify(name).is_ok() {
                    seen.insert(name.to_owned());
                }
            }
        }
    }
    seen.into_iter().collect()
}

pub fn preset_all(lp: &LookupPaths, flags: Flags, mode: presets::Mode) -> Outcome {
    run_preset(lp, flags, &discoverable_unit_names(lp), mode)
}

pub fn get_list(
    lp: &LookupPaths,
    states: Option<&[state::UnitFileState]>,
    patterns: Option<&[fnmatch::Pattern]>,
) -> Vec<(String, state::UnitFileState, Option<PathBuf>)> {
    let mut out = Vec::new();

    for name in discoverable_unit_names(lp) {
        if let Some(patterns) = patterns {
            if !patterns.iter().any(|p| p.matches(&name)) {
                continue;
            }
        }
        let Ok(unit_state) = state::lookup_state(lp, &name) else { continue };
        if let Some(states) = states {
            if !states.contains(&unit_state) {
                continue;
            }
        }

        let mut ctx = InstallContext::new();
        let path = discover::discover_one(&mut ctx, lp, &name, false).ok().and_then(|n| ctx.find(&n).and_then(|i| i.path.clone()));
        out.push((name, unit_state, path));
    }

    out
}

pub fn lookup_state(lp: &LookupPaths, name: &str) -> Result<state::UnitFileState, Error> {
    state::lookup_state(lp, name)
}

pub fn exists(lp: &LookupPaths, name: &str) -> bool {
    state::exists(lp, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paths::Scope;

    fn write_unit(root: &Path, dir: &str, name: &str, contents: &str) {
        let d = root.join(dir.trim_start_matches('/'));
        fs::create_dir_all(&d).unwrap();
        fs::write(d.join(name), contents).unwrap();
    }

    #[test]
    fn enable_plain_service_creates_alias_and_wants_link() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(
            tmp.path(),
            "/usr/lib/systemd/system",
            "foo.service",
            "[Install]\nWantedBy=multi-user.target\nAlias=bar.service\n",
        );
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        let outcome = enable(&lp, Flags::default(), &["foo.service".to_owned()]);

        assert_eq!(outcome.count, 2);
        assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/bar.service")).is_ok());
        assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/multi-user.target.wants/foo.service")).is_ok());
    }

    #[test]
    fn enable_twice_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nWantedBy=multi-user.target\n");
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        enable(&lp, Flags::default(), &["foo.service".to_owned()]);
        let second = enable(&lp, Flags::default(), &["foo.service".to_owned()]);
        assert!(second.changes.is_empty());
    }

    #[test]
    fn enable_then_disable_restores_absence() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nWantedBy=multi-user.target\n");
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        enable(&lp, Flags::default(), &["foo.service".to_owned()]);
        disable(&lp, Flags::default(), &["foo.service".to_owned()]);
        assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/multi-user.target.wants/foo.service")).is_err());
    }

    #[test]
    fn mask_then_state_reports_masked() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "net.service", "[Install]\nWantedBy=multi-user.target\n");
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        mask(&lp, Flags::default(), &["net.service".to_owned()]);
        assert_eq!(lookup_state(&lp, "net.service").unwrap(), state::UnitFileState::Masked);
    }

    #[test]
    fn preset_round_trip_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nWantedBy=multi-user.target\n");
        write_unit(tmp.path(), "/usr/lib/systemd/system", "bar.service", "[Install]\nWantedBy=multi-user.target\n");
        write_unit(tmp.path(), "/usr/lib/systemd/system-preset", "10-test.preset", "disable foo.service\nenable bar.service\n");

        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        let first = preset_all(&lp, Flags::default(), presets::Mode::Full);
        assert!(first.count > 0);
        let second = preset_all(&lp, Flags::default(), presets::Mode::Full);
        assert!(second.changes.is_empty());
    }

    #[test]
    fn linked_unit_reports_linked_state() {
        let tmp = tempfile::tempdir().unwrap();
        let opt = tmp.path().join("opt");
        fs::create_dir_all(&opt).unwrap();
        fs::write(opt.join("foo.service"), "[Install]\nWantedBy=multi-user.target\n").unwrap();
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();

        fs::create_dir_all(&lp.persistent_config).unwrap();
        std::os::unix::fs::symlink(opt.join("foo.service"), lp.persistent_config.join("foo.service")).unwrap();

        assert_eq!(lookup_state(&lp, "foo.service").unwrap(), state::UnitFileState::Linked);
    }

    #[test]
    fn cycle_rejection_surfaces_symlink_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("etc/systemd/system");
        fs::create_dir_all(&dir).unwrap();
        std::os::unix::fs::symlink(dir.join("b.service"), dir.join("a.service")).unwrap();
        std::os::unix::fs::symlink(dir.join("a.service"), dir.join("b.service")).unwrap();
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        assert!(matches!(lookup_state(&lp, "a.service"), Err(Error::SymlinkLoop(_))));
    }
}
