// SPDX-License-Identifier: MPL-2.0

//! The unit-file installation engine: discovery, symlink materialization,
//! state classification and the high-level verbs built on top of them.

mod change;
mod discover;
mod error;
mod info;
mod ini;
mod materialize;
mod specifier;
mod state;
mod verbs;

pub use change::ChangeRecord;
pub use error::Error;
pub use info::{FileType, InstallContext, InstallInfo};
pub use state::UnitFileState;
pub use verbs::{
    add_dependency, disable, enable, exists, get_default, get_list, link, lookup_state, mask, preset, preset_all, reenable,
    revert, set_default, unmask, DependencyKind, Outcome,
};

pub use paths::{Flags, LookupPaths, Scope};
pub use presets::Mode as PresetMode;
