// SPDX-License-Identifier: MPL-2.0

//! Unit name classification and the template/instance algebra.
//!
//! A unit name is `prefix.suffix`, `prefix@instance.suffix` (an instance)
//! or `prefix@.suffix` (a template). All operations here are pure string
//! manipulation; none of them touch the filesystem.

use thiserror::Error;

/// The eleven unit types `install.c` recognizes by suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    Service,
    Socket,
    Target,
    Timer,
    Mount,
    Automount,
    Path,
    Device,
    Slice,
    Scope,
    Swap,
}

impl UnitType {
    const ALL: &'static [(&'static str, UnitType)] = &[
        ("service", UnitType::Service),
        ("socket", UnitType::Socket),
        ("target", UnitType::Target),
        ("timer", UnitType::Timer),
        ("mount", UnitType::Mount),
        ("automount", UnitType::Automount),
        ("path", UnitType::Path),
        ("device", UnitType::Device),
        ("slice", UnitType::Slice),
        ("scope", UnitType::Scope),
        ("swap", UnitType::Swap),
    ];

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.iter().find(|(s, _)| *s == suffix).map(|(_, t)| *t)
    }

    pub fn as_str(&self) -> &'static str {
        Self::ALL.iter().find(|(_, t)| t == self).map(|(s, _)| *s).unwrap()
    }

    /// `Alias=` on a unit of this type is dropped with a warning.
    pub fn allows_alias(&self) -> bool {
        !matches!(self, UnitType::Device)
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the three shapes a name takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Plain,
    Instance,
    Template,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid unit name: {0}")]
    InvalidName(String),
    #[error("{0} is not a template or instance of a template")]
    NotATemplate(String),
}

fn validate_chars(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidName(name.to_owned()));
    }
    let at_count = name.matches('@').count();
    if at_count > 1 {
        return Err(Error::InvalidName(name.to_owned()));
    }
    let ok = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '.' | '-' | '@'));
    if !ok {
        return Err(Error::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Split off the trailing `.suffix`, validating it against the allow-list.
fn split_suffix(name: &str) -> Result<(&str, UnitType), Error> {
    let dot = name.rfind('.').ok_or_else(|| Error::InvalidName(name.to_owned()))?;
    let (body, suffix) = (&name[..dot], &name[dot + 1..]);
    if body.is_empty() {
        return Err(Error::InvalidName(name.to_owned()));
    }
    let unit_type = UnitType::from_suffix(suffix).ok_or_else(|| Error::InvalidName(name.to_owned()))?;
    Ok((body, unit_type))
}

/// Split `prefix@instance` (or a plain `prefix`) out of the pre-suffix body.
fn split_at_sign(body: &str) -> (&str, Option<&str>) {
    match body.find('@') {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    }
}

/// Classify a unit name into plain/instance/template.
pub fn classify(name: &str) -> Result<Kind, Error> {
    validate_chars(name)?;
    let (body, _) = split_suffix(name)?;
    match split_at_sign(body) {
        (prefix, None) => {
            if prefix.is_empty() {
                Err(Error::InvalidName(name.to_owned()))
            } else {
                Ok(Kind::Plain)
            }
        }
        (prefix, Some(instance)) => {
            if prefix.is_empty() {
                return Err(Error::InvalidName(name.to_owned()));
            }
            if instance.is_empty() {
                Ok(Kind::Template)
            } else {
                Ok(Kind::Instance)
            }
        }
    }
}

/// Mask of kinds accepted by [`valid`].
#[derive(Debug, Clone, Copy)]
pub struct KindMask {
    pub plain: bool,
    pub instance: bool,
    pub template: bool,
}

impl KindMask {
    pub const ANY: KindMask = KindMask {
        plain: true,
        instance: true,
        template: true,
    };

    pub fn accepts(&self, kind: Kind) -> bool {
        match kind {
            Kind::Plain => self.plain,
            Kind::Instance => self.instance,
            Kind::Template => self.template,
        }
    }
}

/// True iff `name` is grammatically valid and matches one of `mask`'s kinds.
pub fn valid(name: &str, mask: KindMask) -> bool {
    classify(name).map(|k| mask.accepts(k)).unwrap_or(false)
}

/// The unit's file-type suffix (`service`, `socket`, ...).
pub fn type_of(name: &str) -> Result<UnitType, Error> {
    split_suffix(name).map(|(_, t)| t)
}

/// The template that `instance` is an instantiation of.
///
/// `template_of("foo@bar.service") == "foo@.service"`. Also accepts an
/// already-template name (returned unchanged) so callers don't need to
/// branch on kind first.
pub fn template_of(name: &str) -> Result<String, Error> {
    let (body, unit_type) = split_suffix(name)?;
    let (prefix, instance) = split_at_sign(body);
    match instance {
        Some(_) => Ok(format!("{prefix}@.{unit_type}")),
        None => Err(Error::NotATemplate(name.to_owned())),
    }
}

/// The instance part of an instance name (empty string for a template).
pub fn instance_of(name: &str) -> Result<String, Error> {
    let (body, _) = split_suffix(name)?;
    match split_at_sign(body) {
        (_, Some(instance)) => Ok(instance.to_owned()),
        (_, None) => Err(Error::NotATemplate(name.to_owned())),
    }
}

/// Substitute `instance` into `template`, producing a concrete instance
/// name. `template` must classify as [`Kind::Template`].
pub fn with_instance(template: &str, instance: &str) -> Result<String, Error> {
    match classify(template)? {
        Kind::Template => {}
        _ => return Err(Error::NotATemplate(template.to_owned())),
    }
    let (body, unit_type) = split_suffix(template)?;
    let (prefix, _) = split_at_sign(body);
    let candidate = format!("{prefix}@{instance}.{unit_type}");
    validate_chars(&candidate)?;
    Ok(candidate)
}

/// The final `-`-separated component of a name's prefix (specifier `%j`).
pub fn prefix_last_component(name: &str) -> Result<String, Error> {
    let (body, _) = split_suffix(name)?;
    let (prefix, _) = split_at_sign(body);
    Ok(prefix.rsplit('-').next().unwrap_or(prefix).to_owned())
}

/// The prefix portion before `@` (or the whole name-without-suffix for a
/// plain unit) — specifier `%p`.
pub fn prefix(name: &str) -> Result<String, Error> {
    let (body, _) = split_suffix(name)?;
    let (prefix, _) = split_at_sign(body);
    Ok(prefix.to_owned())
}

/// The name without its suffix — specifier `%N`.
pub fn without_suffix(name: &str) -> Result<String, Error> {
    let (body, _) = split_suffix(name)?;
    Ok(body.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_plain_instance_template() {
        assert_eq!(classify("foo.service").unwrap(), Kind::Plain);
        assert_eq!(classify("foo@bar.service").unwrap(), Kind::Instance);
        assert_eq!(classify("foo@.service").unwrap(), Kind::Template);
    }

    #[test]
    fn rejects_unknown_suffix_and_bad_chars() {
        assert!(classify("foo.frobnicate").is_err());
        assert!(classify("foo!.service").is_err());
        assert!(classify("a@b@c.service").is_err());
        assert!(classify("").is_err());
    }

    #[test]
    fn template_and_instance_roundtrip() {
        assert_eq!(template_of("foo@bar.service").unwrap(), "foo@.service");
        assert_eq!(instance_of("foo@bar.service").unwrap(), "bar");
        assert_eq!(with_instance("foo@.service", "bar").unwrap(), "foo@bar.service");
    }

    #[test]
    fn template_of_rejects_plain_and_template_itself() {
        assert!(template_of("foo.service").is_err());
        assert!(template_of("foo@.service").is_err());
    }

    #[test]
    fn specifiers() {
        assert_eq!(prefix("getty@tty1.service").unwrap(), "getty");
        assert_eq!(without_suffix("getty@tty1.service").unwrap(), "getty@tty1");
        assert_eq!(prefix_last_component("foo-bar@x.service").unwrap(), "bar");
    }

    #[test]
    fn device_forbids_alias() {
        assert!(!UnitType::Device.allows_alias());
        assert!(UnitType::Service.allows_alias());
    }
}
