// SPDX-License-Identifier: MPL-2.0

//! Preset file parsing and the `enable`/`disable` rule engine.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use fnmatch::Pattern;
use thiserror::Error;
use unitname::Kind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Enable,
    Disable,
}

/// One `enable`/`disable` line from a `.preset` file.
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Pattern,
    pub action: Action,
    /// Present only for `enable` rules on a template pattern; lists the
    /// concrete instances the rule expands to.
    pub instances: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}:{1}: unrecognized directive {2:?}")]
    UnknownDirective(PathBuf, usize, String),
    #[error("{0}:{1}: `disable` does not accept an instance list")]
    DisableWithInstances(PathBuf, usize),
    #[error("{0}:{1}: instance list given for a non-template pattern")]
    InstancesOnNonTemplate(PathBuf, usize),
    #[error("{0}:{1}: missing pattern")]
    MissingPattern(PathBuf, usize),
}

/// Parse the `enable`/`disable` directives out of one preset file's text.
/// Malformed lines are reported as [`ParseError`] and raised at parse
/// time rather than silently ignored, including `enable pattern instance`
/// given for a non-template pattern.
pub fn parse(path: &Path, text: &str) -> Result<Vec<Rule>, ParseError> {
    let mut rules = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let mut words = line.split_whitespace();
        let directive = words.next().unwrap();
        let pattern_str = words.next().ok_or_else(|| ParseError::MissingPattern(path.to_owned(), lineno))?;
        let rest: Vec<String> = words.map(str::to_owned).collect();

        let pattern = Pattern::new(pattern_str);
        let is_template_pattern = unitname::classify(pattern_str).map(|k| k == Kind::Template).unwrap_or(false) || !pattern.is_literal();

        let (action, instances) = match directive {
            "enable" => {
                if rest.is_empty() {
                    (Action::Enable, None)
                } else if is_template_pattern {
                    (Action::Enable, Some(rest))
                } else {
                    return Err(ParseError::InstancesOnNonTemplate(path.to_owned(), lineno));
                }
            }
            "disable" => {
                if !rest.is_empty() {
                    return Err(ParseError::DisableWithInstances(path.to_owned(), lineno));
                }
                (Action::Disable, None)
            }
            other => {
                return Err(ParseError::UnknownDirective(path.to_owned(), lineno, other.to_owned()));
            }
        };

        rules.push(Rule { pattern, action, instances });
    }

    Ok(rules)
}

/// Scan `dirs` (highest priority first) for `*.preset` files, keeping only
/// the highest-priority file for each basename, then returning the result
/// sorted by basename.
pub fn discover_files(dirs: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut by_basename: BTreeMap<std::ffi::OsString, PathBuf> = BTreeMap::new();

    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("preset") {
                continue;
            }
            let basename = path.file_name().unwrap().to_owned();
            by_basename.entry(basename).or_insert(path);
        }
    }

    Ok(by_basename.into_values().collect())
}

/// Load and concatenate the rules from every file `discover_files` finds,
/// in file-declaration order: rules are evaluated in file-declaration
/// order across all files in the preset search path, sorted by basename.
pub fn load(dirs: &[PathBuf]) -> Result<Vec<Rule>, LoadError> {
    let files = discover_files(dirs).map_err(LoadError::Io)?;
    let mut rules = Vec::new();
    for file in files {
        let text = fs::read_to_string(&file).map_err(LoadError::Io)?;
        match parse(&file, &text) {
            Ok(mut file_rules) => rules.append(&mut file_rules),
            Err(e) => {
                // A malformed line degrades the file, not the whole pass.
                log::warn!("skipping malformed preset file {file:?}: {e}");
            }
        }
    }
    Ok(rules)
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading preset files")]
    Io(#[source] io::Error),
}

/// The outcome of matching a unit name against the loaded rule set.
/// There is no "no rule matched" variant: a miss defaults to
/// `Enable([name])`, so `query` always resolves to one of these two
/// outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Enable(Vec<String>),
    Disable,
}

/// Evaluate `rules` against `name`. The first matching rule wins.
pub fn query(name: &str, rules: &[Rule]) -> Query {
    let template = unitname::template_of(name).ok();

    for rule in rules {
        let pattern_matches = rule.pattern.matches(name)
            || template.as_deref().is_some_and(|t| rule.pattern.as_str() == t);

        if !pattern_matches {
            continue;
        }

        // A rule on a template pattern with an explicit instance list only
        // matches names whose instance is in that list.
        if let Some(instances) = &rule.instances {
            let Ok(instance) = unitname::instance_of(name) else {
                continue;
            };
            if !instances.iter().any(|i| i == &instance) {
                continue;
            }
        }

        return match rule.action {
            Action::Disable => Query::Disable,
            Action::Enable => match &rule.instances {
                Some(instances) => Query::Enable(
                    instances
                        .iter()
                        .filter_map(|i| unitname::with_instance(&rule.pattern.as_str().to_owned(), i).ok())
                        .collect(),
                ),
                None => Query::Enable(vec![name.to_owned()]),
            },
        };
    }

    Query::Enable(vec![name.to_owned()])
}

/// Which half of a preset pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Full,
    EnableOnly,
    DisableOnly,
}

impl Mode {
    pub fn runs_disable(&self) -> bool {
        matches!(self, Mode::Full | Mode::DisableOnly)
    }

    pub fn runs_enable(&self) -> bool {
        matches!(self, Mode::Full | Mode::EnableOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_enable_and_disable() {
        let rules = parse(Path::new("10-test.preset"), "# comment\nenable bar.service\ndisable foo.service\n").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action, Action::Enable);
        assert_eq!(rules[1].action, Action::Disable);
    }

    #[test]
    fn rejects_instances_on_disable() {
        let err = parse(Path::new("x.preset"), "disable foo@.service bar\n").unwrap_err();
        assert!(matches!(err, ParseError::DisableWithInstances(..)));
    }

    #[test]
    fn rejects_instances_on_non_template_enable() {
        let err = parse(Path::new("x.preset"), "enable foo.service bar\n").unwrap_err();
        assert!(matches!(err, ParseError::InstancesOnNonTemplate(..)));
    }

    #[test]
    fn enable_with_instances_expands_template() {
        let rules = parse(Path::new("x.preset"), "enable getty@.service tty1 tty2\n").unwrap();
        let q = query("getty@tty1.service", &rules);
        assert_eq!(
            q,
            Query::Enable(vec!["getty@tty1.service".into(), "getty@tty2.service".into()])
        );
    }

    #[test]
    fn missing_rule_defaults_to_enable() {
        let q = query("foo.service", &[]);
        assert_eq!(q, Query::Enable(vec!["foo.service".into()]));
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = parse(Path::new("x.preset"), "disable *.service\nenable foo.service\n").unwrap();
        assert_eq!(query("foo.service", &rules), Query::Disable);
    }

    #[test]
    fn discover_files_prefers_higher_priority_dir_for_same_basename() {
        let high = tempfile::tempdir().unwrap();
        let low = tempfile::tempdir().unwrap();
        fs::write(high.path().join("10-test.preset"), "enable a.service\n").unwrap();
        fs::write(low.path().join("10-test.preset"), "disable a.service\n").unwrap();
        fs::write(low.path().join("20-test.preset"), "disable b.service\n").unwrap();

        let files = discover_files(&[high.path().to_owned(), low.path().to_owned()]).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(fs::read_to_string(&files[0]).unwrap(), "enable a.service\n");
    }
}
