// SPDX-License-Identifier: MPL-2.0

use std::{fs, path::Path};

use engine::{ChangeRecord, Error, Flags, LookupPaths, Scope, UnitFileState};

fn write_unit(root: &Path, dir: &str, name: &str, contents: &str) {
    let d = root.join(dir.trim_start_matches('/'));
    fs::create_dir_all(&d).unwrap();
    fs::write(d.join(name), contents).unwrap();
}

fn system_paths(root: &Path) -> LookupPaths {
    LookupPaths::new(Scope::System, Some(root.to_owned())).unwrap()
}

#[test]
fn template_with_default_instance_enables_the_default() {
    let tmp = tempfile::tempdir().unwrap();
    write_unit(
        tmp.path(),
        "/usr/lib/systemd/system",
        "getty@.service",
        "[Install]\nWantedBy=getty.target\nDefaultInstance=tty1\n",
    );
    let lp = system_paths(tmp.path());

    let outcome = engine::enable(&lp, Flags::default(), &["getty@.service".to_owned()]);

    assert_eq!(outcome.count, 1);
    assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/getty.target.wants/getty@tty1.service")).is_ok());
}

#[test]
fn template_instance_without_default_propagates_the_instance() {
    let tmp = tempfile::tempdir().unwrap();
    write_unit(
        tmp.path(),
        "/usr/lib/systemd/system",
        "getty@.service",
        "[Install]\nWantedBy=getty.target\n",
    );
    let lp = system_paths(tmp.path());

    let outcome = engine::enable(&lp, Flags::default(), &["getty@ttyS0.service".to_owned()]);

    assert_eq!(outcome.count, 1);
    assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/getty.target.wants/getty@ttyS0.service")).is_ok());
}

#[test]
fn template_without_default_or_instance_target_is_invalid_template_ref() {
    let tmp = tempfile::tempdir().unwrap();
    write_unit(tmp.path(), "/usr/lib/systemd/system", "worker@.service", "[Unit]\nDescription=x\n");
    let lp = system_paths(tmp.path());

    let outcome = engine::add_dependency(
        &lp,
        Flags::default(),
        &["worker@.service".to_owned()],
        "multi-user.target",
        engine::DependencyKind::Wants,
    );

    assert!(outcome.changes.iter().any(|c| matches!(c, ChangeRecord::Error { error: Error::InvalidTemplateRef(_), .. })));
}

#[test]
fn alias_into_non_dependency_dir_is_invalid_name() {
    let tmp = tempfile::tempdir().unwrap();
    write_unit(
        tmp.path(),
        "/usr/lib/systemd/system",
        "foo.service",
        "[Install]\nAlias=somedir/bar.service\n",
    );
    let lp = system_paths(tmp.path());

    let outcome = engine::enable(&lp, Flags::default(), &["foo.service".to_owned()]);

    assert!(outcome.changes.iter().any(|c| matches!(c, ChangeRecord::Error { error: Error::InvalidName(_), .. })));
}

#[test]
fn symlink_chain_of_depth_64_succeeds_and_65_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("usr/lib/systemd/system");
    fs::create_dir_all(&dir).unwrap();
    write_unit(tmp.path(), "/usr/lib/systemd/system", "real.service", "[Install]\nWantedBy=multi-user.target\n");
    let real = tmp.path().join("usr/lib/systemd/system/real.service");

    // chain[0] -> chain[1] -> ... -> chain[N-1] -> real.service, N hops total.
    let build_chain = |hops: usize| {
        for i in (0..hops).rev() {
            let name = format!("chain{i}.service");
            let target = if i + 1 == hops { real.clone() } else { dir.join(format!("chain{}.service", i + 1)) };
            let _ = fs::remove_file(dir.join(&name));
            std::os::unix::fs::symlink(target, dir.join(&name)).unwrap();
        }
    };

    build_chain(64);
    let lp = system_paths(tmp.path());
    assert!(engine::lookup_state(&lp, "chain0.service").is_ok());

    build_chain(65);
    let lp = system_paths(tmp.path());
    assert!(matches!(engine::lookup_state(&lp, "chain0.service"), Err(Error::SymlinkLoop(_))));
}

#[test]
fn set_default_then_get_default_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    write_unit(tmp.path(), "/usr/lib/systemd/system", "graphical.target", "[Unit]\nDescription=x\n");
    let lp = system_paths(tmp.path());

    let outcome = engine::set_default(&lp, Flags::default(), "graphical.target");
    assert_eq!(outcome.count, 1);
    assert_eq!(engine::get_default(&lp).unwrap(), "graphical.target");
}

#[test]
fn add_dependency_creates_requires_link_without_touching_wants() {
    let tmp = tempfile::tempdir().unwrap();
    write_unit(tmp.path(), "/usr/lib/systemd/system", "db.service", "[Unit]\nDescription=x\n");
    write_unit(tmp.path(), "/usr/lib/systemd/system", "app.service", "[Unit]\nDescription=x\n");
    let lp = system_paths(tmp.path());

    let outcome = engine::add_dependency(
        &lp,
        Flags::default(),
        &["app.service".to_owned()],
        "db.service",
        engine::DependencyKind::Requires,
    );

    assert_eq!(outcome.count, 1);
    assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/db.service.requires/app.service")).is_ok());
    assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/db.service.wants/app.service")).is_err());
}

#[test]
fn revert_removes_dropin_and_restores_disabled_state() {
    let tmp = tempfile::tempdir().unwrap();
    write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nWantedBy=multi-user.target\n");
    let lp = system_paths(tmp.path());

    engine::enable(&lp, Flags::default(), &["foo.service".to_owned()]);
    fs::create_dir_all(tmp.path().join("etc/systemd/system/foo.service.d")).unwrap();
    fs::write(
        tmp.path().join("etc/systemd/system/foo.service.d/override.conf"),
        "[Install]\nAlso=bar.service\n",
    )
    .unwrap();
    assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/foo.service.d")).is_ok());

    engine::revert(&lp, Flags::default(), &["foo.service".to_owned()]);

    assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/foo.service.d")).is_err());
    assert!(fs::symlink_metadata(tmp.path().join("etc/systemd/system/multi-user.target.wants/foo.service")).is_err());
    assert_eq!(engine::lookup_state(&lp, "foo.service").unwrap(), UnitFileState::Disabled);
}

#[test]
fn list_unit_files_filters_by_state_and_pattern() {
    let tmp = tempfile::tempdir().unwrap();
    write_unit(tmp.path(), "/usr/lib/systemd/system", "foo.service", "[Install]\nWantedBy=multi-user.target\n");
    write_unit(tmp.path(), "/usr/lib/systemd/system", "bar.socket", "[Unit]\nDescription=x\n");
    let lp = system_paths(tmp.path());
    engine::enable(&lp, Flags::default(), &["foo.service".to_owned()]);

    let enabled_services = [UnitFileState::Enabled];
    let pattern = [fnmatch::Pattern::new("*.service")];
    let rows = engine::get_list(&lp, Some(&enabled_services), Some(&pattern));

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "foo.service");
}
