// SPDX-License-Identifier: MPL-2.0

//! State classification: given a unit name, what would a user see when
//! asking whether it's enabled?

use std::path::{Path, PathBuf};

use paths::LookupPaths;
use unitname::Kind;

use crate::{
    discover,
    error::Error,
    info::{FileType, InstallContext, InstallInfo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFileState {
    Enabled,
    EnabledRuntime,
    Linked,
    LinkedRuntime,
    Alias,
    Masked,
    MaskedRuntime,
    Static,
    Disabled,
    Indirect,
    Generated,
    Transient,
    Bad,
}

impl std::fmt::Display for UnitFileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnitFileState::Enabled => "enabled",
            UnitFileState::EnabledRuntime => "enabled-runtime",
            UnitFileState::Linked => "linked",
            UnitFileState::LinkedRuntime => "linked-runtime",
            UnitFileState::Alias => "alias",
            UnitFileState::Masked => "masked",
            UnitFileState::MaskedRuntime => "masked-runtime",
            UnitFileState::Static => "static",
            UnitFileState::Disabled => "disabled",
            UnitFileState::Indirect => "indirect",
            UnitFileState::Generated => "generated",
            UnitFileState::Transient => "transient",
            UnitFileState::Bad => "bad",
        };
        f.write_str(s)
    }
}

enum LinkHit {
    Persistent,
    UserConfig,
    Runtime,
    Elsewhere,
}

/// Find the first symlink anywhere under `dir` (including `.wants`/
/// `.requires` subdirectories) whose basename or whose link target's
/// basename is one of `candidates`, in sorted-entry order.
fn find_first_link(dir: &Path, candidates: &[String]) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).collect();
    entries.sort();

    for path in &entries {
        let Ok(meta) = std::fs::symlink_metadata(path) else { continue };
        if meta.file_type().is_symlink() {
            let by_name = path.file_name().and_then(|n| n.to_str()).map(|n| candidates.iter().any(|c| c == n));
            let by_target = std::fs::read_link(path)
                .ok()
                .and_then(|t| t.file_name().and_then(|n| n.to_str().map(str::to_owned)))
                .map(|n| candidates.iter().any(|c| *c == n));
            if by_name.unwrap_or(false) || by_target.unwrap_or(false) {
                return Some(path.clone());
            }
        } else if meta.is_dir() {
            if let Some(found) = find_first_link(path, candidates) {
                return Some(found);
            }
        }
    }
    None
}

fn is_user_tree(lp: &LookupPaths, link: &Path) -> bool {
    lp.scope == paths::Scope::User && lp.search_path.first().map(|first| link.starts_with(first)).unwrap_or(false)
}

/// Scan `lp.search_path` for a symlink named by `name` or one of its
/// aliases, matching either by link path or link target, and classify
/// where the first hit (in search-path order) lands. "Same-name" here
/// means the hit is a direct child of the search-path entry itself named
/// exactly `info.name` — the shape the plain-link step produces — as
/// opposed to a name nested inside a `.wants`/`.requires` directory.
fn scan_for_links(lp: &LookupPaths, info: &InstallInfo) -> Option<(LinkHit, bool)> {
    let mut candidates = vec![info.name.clone()];
    candidates.extend(info.aliases.iter().cloned());

    for dir in &lp.search_path {
        let Some(link) = find_first_link(dir, &candidates) else { continue };

        let same_name = link.parent() == Some(dir.as_path())
            && link.file_name().and_then(|n| n.to_str()) == Some(info.name.as_str());

        let hit = if link.starts_with(&lp.persistent_config) {
            LinkHit::Persistent
        } else if is_user_tree(lp, &link) {
            LinkHit::UserConfig
        } else if lp.is_runtime(&link) {
            LinkHit::Runtime
        } else {
            LinkHit::Elsewhere
        };
        return Some((hit, same_name));
    }

    None
}

/// Run discovery for `name` and classify the result into the state a user
/// would see when querying whether the unit is enabled.
pub fn lookup_state(lp: &LookupPaths, name: &str) -> Result<UnitFileState, Error> {
    let mut ctx = InstallContext::new();
    let canonical = match discover::discover_one(&mut ctx, lp, name, true) {
        Ok(name) => name,
        Err(Error::NotFound(_)) => return Ok(UnitFileState::Bad),
        Err(e) => return Err(e),
    };
    let info = ctx.find(&canonical).expect("just discovered").clone();

    match &info.file_type {
        FileType::Masked => {
            let path = info.path.as_deref().unwrap_or_else(|| Path::new(""));
            Ok(if lp.is_runtime(path) { UnitFileState::MaskedRuntime } else { UnitFileState::Masked })
        }
        FileType::Regular => classify_regular(lp, &info),
        FileType::Symlink { .. } | FileType::Unknown => Ok(UnitFileState::Bad),
    }
}

fn classify_regular(lp: &LookupPaths, info: &InstallInfo) -> Result<UnitFileState, Error> {
    let path = info.path.as_deref().unwrap_or_else(|| Path::new(""));
    let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    let is_instance_of_file = unitname::classify(&info.name).ok() == Some(Kind::Instance)
        && unitname::template_of(&info.name).map(|t| t == basename).unwrap_or(false);

    if basename != info.name && !is_instance_of_file {
        return Ok(UnitFileState::Alias);
    }
    if lp.is_generator(path) {
        return Ok(UnitFileState::Generated);
    }
    if lp.is_transient(path) {
        return Ok(UnitFileState::Transient);
    }

    if let Some((hit, same_name)) = scan_for_links(lp, info) {
        return Ok(match (hit, same_name) {
            (LinkHit::Persistent, true) => UnitFileState::Linked,
            (LinkHit::Persistent, false) => UnitFileState::Enabled,
            (LinkHit::UserConfig, _) => UnitFileState::Enabled,
            (LinkHit::Runtime, true) => UnitFileState::LinkedRuntime,
            (LinkHit::Runtime, false) => UnitFileState::EnabledRuntime,
            (LinkHit::Elsewhere, _) if unitname::classify(&info.name)? == Kind::Instance => UnitFileState::Static,
            (LinkHit::Elsewhere, true) => UnitFileState::Linked,
            (LinkHit::Elsewhere, false) => UnitFileState::EnabledRuntime,
        });
    }

    if !info.aliases.is_empty() || !info.wanted_by.is_empty() || !info.required_by.is_empty() {
        Ok(UnitFileState::Disabled)
    } else if !info.also.is_empty() {
        Ok(UnitFileState::Indirect)
    } else {
        Ok(UnitFileState::Static)
    }
}

/// `exists(name)`: true iff discovery locates a file at all, masked or not.
pub fn exists(lp: &LookupPaths, name: &str) -> bool {
    let mut ctx = InstallContext::new();
    discover::discover_one(&mut ctx, lp, name, false).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use paths::Scope;
    use std::fs;

    fn write_unit(root: &Path, dir: &str, name: &str, contents: &str) {
        let d = root.join(dir.trim_start_matches('/'));
        fs::create_dir_all(&d).unwrap();
        fs::write(d.join(name), contents).unwrap();
    }

    #[test]
    fn masked_unit_is_masked() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("etc/systemd/system");
        fs::create_dir_all(&dir).unwrap();
        std::os::unix::fs::symlink("/dev/null", dir.join("foo.service")).unwrap();
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        assert_eq!(lookup_state(&lp, "foo.service").unwrap(), UnitFileState::Masked);
    }

    #[test]
    fn unlinked_service_with_install_rules_is_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nWantedBy=multi-user.target\n");
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        assert_eq!(lookup_state(&lp, "foo.service").unwrap(), UnitFileState::Disabled);
    }

    #[test]
    fn unit_with_no_install_rules_is_static() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Unit]\nDescription=x\n");
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        assert_eq!(lookup_state(&lp, "foo.service").unwrap(), UnitFileState::Static);
    }

    #[test]
    fn enabled_via_persistent_config_link() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nWantedBy=multi-user.target\n");
        let wants = tmp.path().join("etc/systemd/system/multi-user.target.wants");
        fs::create_dir_all(&wants).unwrap();
        std::os::unix::fs::symlink("/usr/lib/systemd/system/foo.service", wants.join("foo.service")).unwrap();
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        assert_eq!(lookup_state(&lp, "foo.service").unwrap(), UnitFileState::Enabled);
    }

    #[test]
    fn missing_unit_is_bad() {
        let tmp = tempfile::tempdir().unwrap();
        let lp = LookupPaths::new(Scope::System, Some(tmp.path().to_owned())).unwrap();
        assert_eq!(lookup_state(&lp, "missing.service").unwrap(), UnitFileState::Bad);
    }
}
