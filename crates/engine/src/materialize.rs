// SPDX-License-Identifier: MPL-2.0

//! Symlink creation, masking and removal under a config directory.

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use fs_err as fs;
use paths::{Flags, LookupPaths};
use unitname::Kind;

use crate::{change::ChangeRecord, discover, error::Error, info::InstallInfo, specifier};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_sibling(link_path: &Path) -> PathBuf {
    let parent = link_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = link_path.file_name().and_then(|n| n.to_str()).unwrap_or("unit");
    let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    parent.join(format!(".{stem}.{}.{unique}", std::process::id()))
}

/// Create (or correct) one symlink at `link_path` pointing at `target`.
/// Empty result means the link already existed and already pointed at
/// `target`; callers rely on this to keep a no-op `enable` producing an
/// empty change set.
pub fn create_symlink(link_path: &Path, target: &Path, flags: Flags) -> Vec<ChangeRecord> {
    if flags.dry_run {
        let already_correct = fs::read_link(link_path).map(|t| t == target).unwrap_or(false);
        return if already_correct {
            vec![]
        } else {
            vec![ChangeRecord::Symlink { path: link_path.to_path_buf(), source: target.to_path_buf() }]
        };
    }

    if let Some(parent) = link_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return vec![ChangeRecord::Error {
                path: link_path.to_path_buf(),
                source: Some(target.to_path_buf()),
                error: Error::io(parent, e),
            }];
        }
    }

    match std::os::unix::fs::symlink(target, link_path) {
        Ok(()) => vec![ChangeRecord::Symlink { path: link_path.to_path_buf(), source: target.to_path_buf() }],
        Err(e) if e.kind() == ErrorKind::AlreadyExists => match fs::read_link(link_path) {
            Ok(existing) if existing == target => vec![],
            Ok(_) if flags.force => replace_atomically(link_path, target),
            Ok(_) => vec![ChangeRecord::Error {
                path: link_path.to_path_buf(),
                source: Some(target.to_path_buf()),
                error: Error::Exists(link_path.to_path_buf()),
            }],
            Err(e) => vec![ChangeRecord::Error { path: link_path.to_path_buf(), source: None, error: Error::io(link_path, e) }],
        },
        Err(e) => vec![ChangeRecord::Error {
            path: link_path.to_path_buf(),
            source: Some(target.to_path_buf()),
            error: Error::io(link_path, e),
        }],
    }
}

/// Never unlink-then-symlink: write the new link to a randomly-named
/// sibling and rename over the destination, so a reader of `link_path`
/// always observes either the old link or the new one.
fn replace_atomically(link_path: &Path, target: &Path) -> Vec<ChangeRecord> {
    let tmp = temp_sibling(link_path);
    if let Err(e) = std::os::unix::fs::symlink(target, &tmp) {
        return vec![ChangeRecord::Error { path: link_path.to_path_buf(), source: Some(target.to_path_buf()), error: Error::io(&tmp, e) }];
    }
    if let Err(e) = fs::rename(&tmp, link_path) {
        let _ = fs::remove_file(&tmp);
        return vec![ChangeRecord::Error {
            path: link_path.to_path_buf(),
            source: Some(target.to_path_buf()),
            error: Error::io(link_path, e),
        }];
    }
    vec![
        ChangeRecord::Unlink { path: link_path.to_path_buf() },
        ChangeRecord::Symlink { path: link_path.to_path_buf(), source: target.to_path_buf() },
    ]
}

fn remove_link(link_path: &Path, dry_run: bool) -> Vec<ChangeRecord> {
    if dry_run {
        return vec![ChangeRecord::Unlink { path: link_path.to_path_buf() }];
    }
    match fs::remove_file(link_path) {
        Ok(()) => vec![ChangeRecord::Unlink { path: link_path.to_path_buf() }],
        Err(e) => vec![ChangeRecord::Error { path: link_path.to_path_buf(), source: None, error: Error::io(link_path, e) }],
    }
}

/// Write a symlink to `/dev/null` at `config_path/name`.
pub fn mask(lp: &LookupPaths, flags: Flags, name: &str) -> Vec<ChangeRecord> {
    let link_path = lp.config_path(flags).join(name);
    create_symlink(&link_path, Path::new("/dev/null"), flags)
}

/// Remove a mask link at `config_path/name`, if one exists.
pub fn unmask(lp: &LookupPaths, flags: Flags, name: &str) -> Vec<ChangeRecord> {
    let link_path = lp.config_path(flags).join(name);
    match fs::symlink_metadata(&link_path) {
        Err(_) => vec![],
        Ok(meta) if meta.file_type().is_symlink() => match fs::read_link(&link_path) {
            Ok(target) if target == Path::new("/dev/null") => remove_link(&link_path, flags.dry_run),
            _ => vec![],
        },
        Ok(_) => vec![],
    }
}

fn emit_template_error(flags: Flags, error: Error) -> Vec<ChangeRecord> {
    if flags.ignore_auxiliary_failure {
        log::warn!("{error}");
        vec![]
    } else {
        vec![ChangeRecord::Error { path: PathBuf::new(), source: None, error }]
    }
}

fn install_alias(lp: &LookupPaths, flags: Flags, target: &Path, source_name: &str, alias: &str) -> Vec<ChangeRecord> {
    let config_path = lp.config_path(flags);

    if let Some((dir_part, file_part)) = alias.split_once('/') {
        let is_dependency_dir = dir_part.ends_with(".wants") || dir_part.ends_with(".requires");
        let dir_base = dir_part.trim_end_matches(".wants").trim_end_matches(".requires");
        if !is_dependency_dir || unitname::classify(dir_base).is_err() || unitname::classify(file_part).is_err() {
            return vec![ChangeRecord::Error {
                path: PathBuf::from(alias),
                source: None,
                error: Error::InvalidName(unitname::Error::InvalidName(alias.to_owned())),
            }];
        }
        let link_path = config_path.join(dir_part).join(file_part);
        return create_symlink(&link_path, target, flags);
    }

    match (unitname::classify(alias), unitname::type_of(alias), unitname::type_of(source_name)) {
        (Ok(_), Ok(alias_type), Ok(source_type)) if alias_type == source_type => {
            create_symlink(&config_path.join(alias), target, flags)
        }
        _ => vec![ChangeRecord::Error {
            path: PathBuf::from(alias),
            source: None,
            error: Error::InvalidName(unitname::Error::InvalidName(alias.to_owned())),
        }],
    }
}

pub(crate) fn install_dependency(
    lp: &LookupPaths,
    flags: Flags,
    target: &Path,
    info: &InstallInfo,
    dep_target: &str,
    suffix: &str,
) -> Vec<ChangeRecord> {
    let is_template = unitname::classify(&info.name).map(|k| k == Kind::Template).unwrap_or(false);

    let link_name = if is_template {
        match &info.default_instance {
            Some(instance) => match unitname::with_instance(&info.name, instance) {
                Ok(name) => name,
                Err(e) => return emit_template_error(flags, e.into()),
            },
            None => match unitname::classify(dep_target) {
                Ok(Kind::Instance) => {
                    let instance = unitname::instance_of(dep_target).expect("instance already classified");
                    match unitname::with_instance(&info.name, &instance) {
                        Ok(name) => name,
                        Err(e) => return emit_template_error(flags, e.into()),
                    }
                }
                _ => return emit_template_error(flags, Error::InvalidTemplateRef(dep_target.to_owned())),
            },
        }
    } else {
        info.name.clone()
    };

    let mut changes = Vec::new();
    if discover::probe(lp, dep_target).is_none() {
        changes.push(ChangeRecord::DestinationNotPresent { path: PathBuf::from(dep_target) });
    }

    let link_path = lp.config_path(flags).join(format!("{dep_target}.{suffix}")).join(&link_name);
    changes.extend(create_symlink(&link_path, target, flags));
    changes
}

/// Materialize every symlink `[Install]` calls for on one discovered unit:
/// aliases, `.wants`/`.requires` membership, and — if the unit's own file
/// lives outside the search path — a plain name link alongside them.
pub fn install_one(lp: &LookupPaths, flags: Flags, info: &InstallInfo) -> Vec<ChangeRecord> {
    if info.is_masked() {
        return vec![ChangeRecord::IsMasked { path: info.path.clone().unwrap_or_else(|| PathBuf::from(&info.name)) }];
    }

    let Some(path) = info.path.as_ref() else {
        return vec![ChangeRecord::Error { path: PathBuf::from(&info.name), source: None, error: Error::NotFound(info.name.clone()) }];
    };

    if lp.is_generator(path) || lp.is_transient(path) {
        return vec![ChangeRecord::Error { path: path.clone(), source: None, error: Error::TransientOrGenerated(path.clone()) }];
    }

    let target = match lp.skip_root(path) {
        Ok(t) => t,
        Err(e) => return vec![ChangeRecord::Error { path: path.clone(), source: None, error: Error::Paths(e) }],
    };

    let mut changes = Vec::new();

    for alias in &info.aliases {
        let alias = specifier::expand(alias, &info.name);
        changes.extend(install_alias(lp, flags, &target, &info.name, &alias));
    }

    for (list, suffix) in [(&info.wanted_by, "wants"), (&info.required_by, "requires")] {
        for dep_target in list {
            let dep_target = specifier::expand(dep_target, &info.name);
            changes.extend(install_dependency(lp, flags, &target, info, &dep_target, suffix));
        }
    }

    if !lp.is_in_search_path(path) {
        let link_path = lp.config_path(flags).join(&info.name);
        changes.extend(create_symlink(&link_path, &target, flags));
    }

    changes
}

fn walk_symlinks(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = fs::symlink_metadata(&path) else { continue };
        if meta.file_type().is_symlink() {
            out.push(path);
        } else if meta.is_dir() {
            walk_symlinks(&path, out);
        }
    }
}

fn prune_empty_dependency_dirs(config_path: &Path) {
    let Ok(entries) = fs::read_dir(config_path) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_dep_dir = matches!(path.extension().and_then(|e| e.to_str()), Some("wants") | Some("requires"));
        if is_dep_dir && fs::symlink_metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
            let _ = fs::remove_dir(&path);
        }
    }
}

/// Recursively unlink every symlink under `config_path` whose basename or
/// whose target's basename is in `names`, restarting until the mark set
/// stops growing.
pub fn remove_marked_symlinks(lp: &LookupPaths, config_path: &Path, flags: Flags, names: &HashSet<String>) -> Vec<ChangeRecord> {
    let mut marks = names.clone();
    let mut changes = Vec::new();

    loop {
        let mut links = Vec::new();
        walk_symlinks(config_path, &mut links);
        let mut newly_marked = Vec::new();

        for link in &links {
            let basename = link.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let target_matches = fs::read_link(link)
                .ok()
                .and_then(|t| t.file_name().and_then(|n| n.to_str().map(str::to_owned)))
                .map(|n| marks.contains(&n))
                .unwrap_or(false);

            if !marks.contains(basename) && !target_matches {
                continue;
            }

            changes.extend(remove_link(link, flags.dry_run));
            if let Ok(stripped) = lp.skip_root(link) {
                if let Some(name) = stripped.file_name().and_then(|n| n.to_str()) {
                    if !marks.contains(name) {
                        newly_marked.push(name.to_owned());
                    }
                }
            }
        }

        if newly_marked.is_empty() || flags.dry_run {
            break;
        }
        marks.extend(newly_marked);
    }

    prune_empty_dependency_dirs(config_path);
    changes
}
