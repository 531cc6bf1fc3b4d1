// SPDX-License-Identifier: MPL-2.0

//! Discovery & traversal: locate a unit's file on disk and follow any
//! symlink indirection to a terminal record.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use fs_err as fs;
use paths::LookupPaths;
use unitname::Kind;

use crate::{
    error::Error,
    info::{FileType, InstallContext},
    ini,
};

/// Bound on symlink follows before a chain is declared a loop.
pub const MAX_SYMLINK_FOLLOWS: u32 = 64;

/// Find `name` in the search path, returning the first hit: earlier
/// entries shadow later ones.
pub fn probe(lp: &LookupPaths, name: &str) -> Option<PathBuf> {
    lp.search_path.iter().map(|dir| dir.join(name)).find(|candidate| fs::symlink_metadata(candidate).is_ok())
}

fn classify_path(path: &Path) -> Result<FileType, Error> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(path).map_err(|e| Error::io(path, e))?;
        if target == Path::new("/dev/null") {
            return Ok(FileType::Masked);
        }
        return Ok(FileType::Symlink { target });
    }
    if meta.len() == 0 {
        return Ok(FileType::Masked);
    }
    Ok(FileType::Regular)
}

/// Resolve a symlink target read from `link_path` into an absolute path,
/// without touching the filesystem beyond what `read_link` already did
/// (the target need not exist yet).
fn resolve_target(link_path: &Path, target: &Path) -> PathBuf {
    let joined = if target.is_absolute() {
        target.to_path_buf()
    } else {
        link_path.parent().unwrap_or_else(|| Path::new("/")).join(target)
    };
    lexical_normalize(&joined)
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component::*;
        match component {
            ParentDir => {
                out.pop();
            }
            CurDir => {}
            other => out.push(other),
        }
    }
    out
}

/// Collect `<unit-name>.d/*.conf` drop-ins across every search-path entry,
/// sorted by basename.
fn collect_dropins(lp: &LookupPaths, resolved_name: &str) -> Vec<PathBuf> {
    let mut by_basename: BTreeMap<std::ffi::OsString, PathBuf> = BTreeMap::new();
    for dir in &lp.search_path {
        let dropin_dir = dir.join(format!("{resolved_name}.d"));
        let Ok(entries) = fs::read_dir(&dropin_dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("conf") {
                by_basename.entry(path.file_name().unwrap().to_owned()).or_insert(path);
            }
        }
    }
    by_basename.into_values().collect()
}

/// Load the base file at `fs_path` (and its drop-ins) into the record
/// named `record_name`, leaving `record_name` untouched and only updating
/// `path`/`file_type`/`[Install]` fields.
fn load_into(ctx: &mut InstallContext, lp: &LookupPaths, record_name: &str, fs_path: PathBuf) -> Result<(), Error> {
    let file_type = classify_path(&fs_path)?;

    let info = ctx.find_mut(record_name).expect("record must exist before load_into");
    info.path = Some(fs_path.clone());
    info.file_type = file_type.clone();

    if !matches!(file_type, FileType::Regular) {
        return Ok(());
    }

    let unit_type = unitname::type_of(record_name)?;
    let text = fs::read_to_string(&fs_path).map_err(|e| Error::io(&fs_path, e))?;
    let resolved_name = fs_path.file_name().and_then(|n| n.to_str()).unwrap_or(record_name);

    let mut section = ini::parse(&text, record_name, unit_type);
    for dropin in collect_dropins(lp, resolved_name) {
        match fs::read_to_string(&dropin) {
            Ok(dropin_text) => section = section.merge(ini::parse(&dropin_text, record_name, unit_type)),
            Err(e) => log::warn!("skipping unreadable drop-in {dropin:?}: {e}"),
        }
    }

    let also = section.also.clone();
    let info = ctx.find_mut(record_name).expect("record must still exist");
    info.aliases = section.aliases;
    info.wanted_by = section.wanted_by;
    info.required_by = section.required_by;
    info.also = section.also;
    info.default_instance = section.default_instance;
    let _ = also; // kept on info; expansion happens in traverse()

    Ok(())
}

/// Find `name` in the search path, falling back to its template when
/// `name` is an instance that has no file of its own.
fn search(ctx: &mut InstallContext, lp: &LookupPaths, name: &str) -> Result<(), Error> {
    if let Some(found) = probe(lp, name) {
        return load_into(ctx, lp, name, found);
    }

    if unitname::classify(name)? == Kind::Instance {
        let template = unitname::template_of(name)?;
        if let Some(found) = probe(lp, &template) {
            return load_into(ctx, lp, name, found);
        }
    }

    Err(Error::NotFound(name.to_owned()))
}

/// Advance `name`'s record one step at a time until it lands on a
/// terminal file type, following symlinks as they're encountered.
///
/// `follow_config` permits chasing exactly one symlink that lives in
/// config space before the usual refusal kicks back in — set by state
/// classification, which needs to resolve a `link`-installed unit down
/// to its real file to report `linked`/`linked-runtime` rather than
/// erroring. Installation discovery always passes `false`.
fn traverse(ctx: &mut InstallContext, lp: &LookupPaths, name: &str, follows: u32, follow_config: bool) -> Result<(), Error> {
    if follows > MAX_SYMLINK_FOLLOWS {
        return Err(Error::SymlinkLoop(PathBuf::from(name)));
    }

    let needs_search = ctx.find(name).map(|i| i.path.is_none()).unwrap_or(true);
    if needs_search {
        search(ctx, lp, name)?;
    }

    let info = ctx.find(name).expect("record was just populated").clone();
    let Some(link_path) = info.path.clone() else {
        return Ok(());
    };

    let target = match &info.file_type {
        FileType::Symlink { target } => target.clone(),
        _ => return Ok(()),
    };

    // A symlink living in config space is user configuration, not vendor
    // indirection: don't chase it, unless the caller has one allowance
    // left to spend (state classification resolving a `link`ed unit).
    let spends_config_allowance = lp.is_config(&link_path);
    if spends_config_allowance && !follow_config {
        return Err(Error::SymlinkLoop(link_path));
    }
    let follow_config = follow_config && !spends_config_allowance;

    let resolved = resolve_target(&link_path, &target);
    let target_basename = resolved.file_name().and_then(|n| n.to_str()).unwrap_or_default();

    if target_basename == name {
        load_into(ctx, lp, name, resolved)?;
        return traverse(ctx, lp, name, follows + 1, follow_config);
    }

    // instance-vs-template absorption: if `name` is an instance and the
    // target is that instance's template, the link is just indirection to
    // the shared template file, not a rename.
    if unitname::classify(name)? == Kind::Instance {
        if let Ok(expanded) = unitname::template_of(name) {
            if expanded == target_basename {
                load_into(ctx, lp, name, resolved)?;
                return Ok(());
            }
        }
    }

    // Otherwise it's a genuine rename: synthesize a fresh record for the
    // target, classify it immediately (a pre-set `path` would otherwise
    // make the next call think it's already been searched), and continue
    // traversal from there.
    let new_name = ctx.add(Some(target_basename.to_owned()), None, None, info.auxiliary);
    load_into(ctx, lp, &new_name, resolved)?;
    traverse(ctx, lp, &new_name, follows + 1, follow_config)
}

/// Seed `ctx` with `names` and drain the frontier (including any `Also=`
/// entries pulled in transitively), returning the outcome for each of the
/// originally-requested names. `Also=` entries are discovered lazily as
/// the frontier drains.
pub fn discover_all(ctx: &mut InstallContext, lp: &LookupPaths, names: &[String]) -> Vec<(String, Result<(), Error>)> {
    let canonical: Vec<String> = names.iter().map(|n| ctx.add(Some(n.clone()), None, None, false)).collect();
    let mut results = Vec::new();

    while let Some(name) = ctx.next_pending() {
        let result = traverse(ctx, lp, &name, 0, false);

        if result.is_ok() {
            if let Some(info) = ctx.find(&name) {
                for also in info.also.clone() {
                    ctx.add(Some(also), None, None, true);
                }
            }
        }

        ctx.retire(&name);

        if canonical.contains(&name) {
            results.push((name, result));
        } else if let Err(e) = result {
            log::warn!("auxiliary unit {name} could not be discovered: {e}");
        }
    }

    results
}

/// Discover a single unit and return its canonical name, surfacing the
/// error instead of only logging it (used by verbs that operate on one
/// name at a time outside the `Also=` fan-out, e.g. `lookup_state`).
/// `follow_config` is forwarded to `traverse`; only `state::lookup_state`
/// sets it.
pub fn discover_one(ctx: &mut InstallContext, lp: &LookupPaths, name: &str, follow_config: bool) -> Result<String, Error> {
    let canonical = ctx.add(Some(name.to_owned()), None, None, false);
    traverse(ctx, lp, &canonical, 0, follow_config)?;
    ctx.retire(&canonical);
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paths::Scope;
    use std::os::unix::fs::symlink;

    fn system_paths(root: &Path) -> LookupPaths {
        LookupPaths::new(Scope::System, Some(root.to_owned())).unwrap()
    }

    fn write_unit(root: &Path, dir: &str, name: &str, contents: &str) {
        let d = root.join(dir.trim_start_matches('/'));
        fs::create_dir_all(&d).unwrap();
        fs::write(d.join(name), contents).unwrap();
    }

    #[test]
    fn discovers_plain_service() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nWantedBy=multi-user.target\n");
        let lp = system_paths(tmp.path());
        let mut ctx = InstallContext::new();
        let results = discover_all(&mut ctx, &lp, &["foo.service".to_owned()]);
        assert!(results[0].1.is_ok());
        let info = ctx.find("foo.service").unwrap();
        assert_eq!(info.wanted_by, vec!["multi-user.target"]);
    }

    #[test]
    fn instance_falls_back_to_template() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(
            tmp.path(),
            "/usr/lib/systemd/system",
            "getty@.service",
            "[Install]\nWantedBy=getty.target\n",
        );
        let lp = system_paths(tmp.path());
        let mut ctx = InstallContext::new();
        let results = discover_all(&mut ctx, &lp, &["getty@tty1.service".to_owned()]);
        assert!(results[0].1.is_ok());
        let info = ctx.find("getty@tty1.service").unwrap();
        assert_eq!(info.wanted_by, vec!["getty.target"]);
    }

    #[test]
    fn also_entries_are_discovered() {
        let tmp = tempfile::tempdir().unwrap();
        write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nAlso=bar.service\n");
        write_unit(tmp.path(), "/usr/lib/systemd/system", "bar.service", "[Install]\nWantedBy=multi-user.target\n");
        let lp = system_paths(tmp.path());
        let mut ctx = InstallContext::new();
        discover_all(&mut ctx, &lp, &["foo.service".to_owned()]);
        let bar = ctx.find("bar.service").unwrap();
        assert!(bar.auxiliary);
        assert_eq!(bar.wanted_by, vec!["multi-user.target"]);
    }

    #[test]
    fn symlink_loop_is_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("usr/lib/systemd/system");
        fs::create_dir_all(&dir).unwrap();
        symlink(dir.join("b.service"), dir.join("a.service")).unwrap();
        symlink(dir.join("a.service"), dir.join("b.service")).unwrap();
        let lp = system_paths(tmp.path());
        let mut ctx = InstallContext::new();
        let results = discover_all(&mut ctx, &lp, &["a.service".to_owned()]);
        assert!(matches!(results[0].1, Err(Error::SymlinkLoop(_))));
    }

    #[test]
    fn masked_unit_skips_install_processing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("etc/systemd/system");
        fs::create_dir_all(&dir).unwrap();
        symlink("/dev/null", dir.join("foo.service")).unwrap();
        let lp = system_paths(tmp.path());
        let mut ctx = InstallContext::new();
        discover_all(&mut ctx, &lp, &["foo.service".to_owned()]);
        let info = ctx.find("foo.service").unwrap();
        assert!(info.is_masked());
        assert!(info.wanted_by.is_empty());
    }
}
