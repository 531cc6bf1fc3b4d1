// SPDX-License-Identifier: MPL-2.0

//! Minimal `[Install]`-section parser.
//!
//! Every other section in the unit file is accepted but discarded: this
//! engine only ever reads five keys, and never validates the rest of the
//! unit file's grammar.

use unitname::UnitType;

/// The parsed `[Install]` section of one unit file (plus any drop-ins
/// folded over it).
#[derive(Debug, Clone, Default)]
pub struct InstallSection {
    pub aliases: Vec<String>,
    pub wanted_by: Vec<String>,
    pub required_by: Vec<String>,
    pub also: Vec<String>,
    pub default_instance: Option<String>,
}

impl InstallSection {
    /// Fold a drop-in's section over this one: sequences append, and
    /// `DefaultInstance` takes the later non-empty value.
    pub fn merge(mut self, mut other: InstallSection) -> InstallSection {
        self.aliases.append(&mut other.aliases);
        self.wanted_by.append(&mut other.wanted_by);
        self.required_by.append(&mut other.required_by);
        self.also.append(&mut other.also);
        if other.default_instance.is_some() {
            self.default_instance = other.default_instance;
        }
        self
    }
}

/// Parse the `[Install]` section out of `text`. `unit_name` and
/// `unit_type` drive specifier expansion and the alias-on-`device`
/// warning.
pub fn parse(text: &str, unit_name: &str, unit_type: UnitType) -> InstallSection {
    let mut section = InstallSection::default();
    let mut in_install = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            in_install = name == "Install";
            continue;
        }
        if !in_install {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = crate::specifier::expand(value.trim(), unit_name);

        match key {
            "Alias" => {
                if unit_type.allows_alias() {
                    section.aliases.extend(value.split_whitespace().map(str::to_owned));
                } else {
                    log::warn!("Alias= is not permitted for unit type {unit_type}, dropping on {unit_name}");
                }
            }
            "WantedBy" => section.wanted_by.extend(value.split_whitespace().map(str::to_owned)),
            "RequiredBy" => section.required_by.extend(value.split_whitespace().map(str::to_owned)),
            "Also" => section.also.extend(value.split_whitespace().map(str::to_owned)),
            "DefaultInstance" => {
                if !value.is_empty() {
                    section.default_instance = Some(value);
                }
            }
            other => log::warn!("unknown key {other:?} in [Install] section of {unit_name}"),
        }
    }

    section
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wanted_by_and_alias() {
        let section = parse(
            "[Install]\nWantedBy=multi-user.target\nAlias=bar.service\n",
            "foo.service",
            UnitType::Service,
        );
        assert_eq!(section.wanted_by, vec!["multi-user.target"]);
        assert_eq!(section.aliases, vec!["bar.service"]);
    }

    #[test]
    fn drops_alias_on_device_units() {
        let section = parse("[Install]\nAlias=foo.device\n", "bar.device", UnitType::Device);
        assert!(section.aliases.is_empty());
    }

    #[test]
    fn ignores_non_install_sections() {
        let section = parse("[Unit]\nDescription=x\n[Install]\nAlias=a.service\n", "b.service", UnitType::Service);
        assert_eq!(section.aliases, vec!["a.service"]);
    }

    #[test]
    fn merge_appends_sequences_and_keeps_last_default_instance() {
        let base = parse("[Install]\nWantedBy=a.target\nDefaultInstance=x\n", "t@.service", UnitType::Service);
        let dropin = parse("[Install]\nWantedBy=b.target\nDefaultInstance=y\n", "t@.service", UnitType::Service);
        let merged = base.merge(dropin);
        assert_eq!(merged.wanted_by, vec!["a.target", "b.target"]);
        assert_eq!(merged.default_instance.as_deref(), Some("y"));
    }

    #[test]
    fn expands_specifiers_in_values() {
        let section = parse("[Install]\nAlias=%p-alias.service\n", "foo.service", UnitType::Service);
        assert_eq!(section.aliases, vec!["foo-alias.service"]);
    }
}
