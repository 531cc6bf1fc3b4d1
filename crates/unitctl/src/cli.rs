// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{ChangeRecord, Outcome, PresetMode, UnitFileState};
use paths::{Flags, LookupPaths, Scope};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "unitctl", about = "Manage unit-file [Install] symlinks")]
pub struct Command {
    #[command(flatten)]
    pub global: Global,
    #[command(subcommand)]
    pub verb: Verb,
}

#[derive(Debug, Args)]
pub struct Global {
    /// Treat this directory as the filesystem root.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    /// Act on user units instead of system units.
    #[arg(long, global = true, conflicts_with = "global_scope")]
    pub user: bool,
    /// Act on the global (all-users) unit tree.
    #[arg(long = "global", global = true, conflicts_with = "user")]
    pub global_scope: bool,
    /// Write into the runtime tree instead of the persistent one.
    #[arg(long, global = true)]
    pub runtime: bool,
    /// Write into the portable-attached tree instead of the regular one.
    #[arg(long, global = true)]
    pub portable: bool,
    /// Replace a conflicting symlink instead of reporting an error.
    #[arg(long, global = true)]
    pub force: bool,
    /// Report what would change without touching the filesystem.
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
    /// Log auxiliary (`Also=`) failures instead of surfacing them.
    #[arg(long = "ignore-auxiliary-failure", global = true)]
    pub ignore_auxiliary_failure: bool,
}

impl Global {
    fn scope(&self) -> Scope {
        if self.user {
            Scope::User
        } else if self.global_scope {
            Scope::Global
        } else {
            Scope::System
        }
    }

    fn flags(&self) -> Flags {
        Flags {
            runtime: self.runtime,
            force: self.force,
            portable: self.portable,
            dry_run: self.dry_run,
            ignore_auxiliary_failure: self.ignore_auxiliary_failure,
        }
    }

    fn lookup_paths(&self) -> Result<LookupPaths, Error> {
        LookupPaths::new(self.scope(), self.root.clone()).map_err(Error::Paths)
    }
}

#[derive(Debug, Subcommand)]
pub enum Verb {
    /// Create the symlinks a unit's [Install] section calls for.
    Enable(Names),
    /// Remove a unit's [Install] symlinks.
    Disable(Names),
    /// Disable then enable, picking up changes to [Install] rules.
    Reenable(Names),
    /// Point a unit at /dev/null so it can never be started.
    Mask(Names),
    /// Remove a mask symlink.
    Unmask(Names),
    /// Force a symlink for an arbitrary unit file path.
    Link(Paths),
    /// Erase a unit's config-scope drop-ins and vendor override.
    Revert(Names),
    /// Add a Wants= or Requires= edge from an existing unit.
    AddDependency(AddDependencyArgs),
    /// Point default.target at the named target unit.
    SetDefault(Name),
    /// Print the unit default.target currently points at.
    GetDefault,
    /// Apply distribution preset rules to the named units.
    Preset(PresetArgs),
    /// Apply distribution preset rules to every discoverable unit.
    PresetAll(PresetAllArgs),
    /// List discoverable units and their enablement state.
    ListUnitFiles(ListArgs),
    /// Print whether a unit is enabled; exit status mirrors the answer.
    IsEnabled(Name),
}

#[derive(Debug, Args)]
pub struct Names {
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Debug, Args)]
pub struct Paths {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct Name {
    pub name: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DependencyKindArg {
    Wants,
    Requires,
}

impl From<DependencyKindArg> for engine::DependencyKind {
    fn from(value: DependencyKindArg) -> Self {
        match value {
            DependencyKindArg::Wants => engine::DependencyKind::Wants,
            DependencyKindArg::Requires => engine::DependencyKind::Requires,
        }
    }
}

#[derive(Debug, Args)]
pub struct AddDependencyArgs {
    #[arg(required = true)]
    pub names: Vec<String>,
    /// The unit the dependency symlink is filed under.
    #[arg(long)]
    pub target: String,
    #[arg(long, value_enum, default_value = "wants")]
    pub kind: DependencyKindArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Full,
    EnableOnly,
    DisableOnly,
}

impl From<ModeArg> for PresetMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Full => PresetMode::Full,
            ModeArg::EnableOnly => PresetMode::EnableOnly,
            ModeArg::DisableOnly => PresetMode::DisableOnly,
        }
    }
}

#[derive(Debug, Args)]
pub struct PresetArgs {
    #[arg(required = true)]
    pub names: Vec<String>,
    #[arg(long, value_enum, default_value = "full")]
    pub mode: ModeArg,
}

#[derive(Debug, Args)]
pub struct PresetAllArgs {
    #[arg(long, value_enum, default_value = "full")]
    pub mode: ModeArg,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only list units matching this glob (may be repeated).
    #[arg(long = "pattern")]
    pub patterns: Vec<fnmatch::Pattern>,
    /// Only list units in this state (may be repeated).
    #[arg(long = "state", value_parser = parse_state)]
    pub states: Vec<UnitFileState>,
}

fn parse_state(raw: &str) -> Result<UnitFileState, String> {
    match raw {
        "enabled" => Ok(UnitFileState::Enabled),
        "enabled-runtime" => Ok(UnitFileState::EnabledRuntime),
        "linked" => Ok(UnitFileState::Linked),
        "linked-runtime" => Ok(UnitFileState::LinkedRuntime),
        "alias" => Ok(UnitFileState::Alias),
        "masked" => Ok(UnitFileState::Masked),
        "masked-runtime" => Ok(UnitFileState::MaskedRuntime),
        "static" => Ok(UnitFileState::Static),
        "disabled" => Ok(UnitFileState::Disabled),
        "indirect" => Ok(UnitFileState::Indirect),
        "generated" => Ok(UnitFileState::Generated),
        "transient" => Ok(UnitFileState::Transient),
        "bad" => Ok(UnitFileState::Bad),
        other => Err(format!("unknown unit file state {other:?}")),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("resolving lookup paths")]
    Paths(#[from] paths::Error),
    #[error("{0}")]
    Engine(#[from] engine::Error),
}

fn print_changes(changes: &[ChangeRecord]) {
    for change in changes {
        println!("{change}");
    }
}

/// Print an outcome's change records and report whether the call should
/// be treated as a success for the process exit code.
fn report(outcome: Outcome) -> bool {
    print_changes(&outcome.changes);
    outcome.count >= 0 && !outcome.changes.iter().any(ChangeRecord::is_error)
}

/// Run the parsed command. `Ok(false)` means the operation ran but should
/// make the process exit non-zero (a surfaced per-unit failure); `Err`
/// means the command could not even be attempted.
pub fn process() -> Result<bool, Error> {
    let Command { global, verb } = Command::parse();
    let lp = global.lookup_paths()?;
    let flags = global.flags();

    Ok(match verb {
        Verb::Enable(Names { names }) => report(engine::enable(&lp, flags, &names)),
        Verb::Disable(Names { names }) => report(engine::disable(&lp, flags, &names)),
        Verb::Reenable(Names { names }) => report(engine::reenable(&lp, flags, &names)),
        Verb::Mask(Names { names }) => report(engine::mask(&lp, flags, &names)),
        Verb::Unmask(Names { names }) => report(engine::unmask(&lp, flags, &names)),
        Verb::Link(Paths { paths }) => report(engine::link(&lp, flags, &paths)),
        Verb::Revert(Names { names }) => report(engine::revert(&lp, flags, &names)),
        Verb::AddDependency(AddDependencyArgs { names, target, kind }) => {
            report(engine::add_dependency(&lp, flags, &names, &target, kind.into()))
        }
        Verb::SetDefault(Name { name }) => report(engine::set_default(&lp, flags, &name)),
        Verb::GetDefault => {
            let name = engine::get_default(&lp)?;
            println!("{name}");
            true
        }
        Verb::Preset(PresetArgs { names, mode }) => report(engine::preset(&lp, flags, &names, mode.into())),
        Verb::PresetAll(PresetAllArgs { mode }) => report(engine::preset_all(&lp, flags, mode.into())),
        Verb::ListUnitFiles(ListArgs { patterns, states }) => {
            let states = (!states.is_empty()).then_some(states.as_slice());
            let patterns = (!patterns.is_empty()).then_some(patterns.as_slice());
            for (name, state, path) in engine::get_list(&lp, states, patterns) {
                match path {
                    Some(path) => println!("{name}\t{state}\t{path:?}"),
                    None => println!("{name}\t{state}"),
                }
            }
            true
        }
        Verb::IsEnabled(Name { name }) => {
            let state = engine::lookup_state(&lp, &name)?;
            println!("{state}");
            engine::exists(&lp, &name)
        }
    })
}
