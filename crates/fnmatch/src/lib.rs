// SPDX-License-Identifier: MPL-2.0

//! Shell-glob matching over unit names.
//!
//! Implements `FNM_NOESCAPE` semantics: `?` matches exactly one character,
//! `*` matches zero or more characters, and backslash has no special
//! meaning — it is matched literally like any other character. Unit names
//! never contain a path separator, so unlike path-oriented glob crates
//! there is no separator-stop behavior for `*`.

mod token;

use token::{tokens, Matcher, Token};

/// A compiled glob pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pattern {
    tokens: Vec<Token>,
    source: String,
}

impl Pattern {
    /// Compile a pattern from its textual form.
    pub fn new(pattern: impl AsRef<str>) -> Self {
        let pattern = pattern.as_ref();
        Self {
            tokens: tokens(pattern),
            source: pattern.to_owned(),
        }
    }

    /// The pattern's original textual form.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True if this pattern has no `?`/`*` and can only ever match its own
    /// literal text. Used by the preset engine to decide whether a pattern
    /// can be a template reference at all.
    pub fn is_literal(&self) -> bool {
        !self.tokens.iter().any(|t| matches!(t, Token::Glob(_)))
    }

    /// Whole-string match, anchored at both ends.
    pub fn matches(&self, candidate: &str) -> bool {
        match_tokens(&self.tokens, candidate)
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Pattern {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

fn match_tokens(tokens: &[Token], candidate: &str) -> bool {
    match tokens.split_first() {
        None => candidate.is_empty(),
        Some((Token::Text(text), rest)) => match candidate.strip_prefix(text.as_str()) {
            Some(remainder) => match_tokens(rest, remainder),
            None => false,
        },
        Some((Token::Glob(Matcher::One), rest)) => match candidate.chars().next() {
            Some(c) => match_tokens(rest, &candidate[c.len_utf8()..]),
            None => false,
        },
        Some((Token::Glob(Matcher::Any), rest)) => {
            // Try the shortest expansion first; `*` is the only
            // backtracking construct so this stays linear in practice for
            // the single-`*`-heavy patterns preset files actually use.
            for (idx, _) in candidate.char_indices().chain(std::iter::once((candidate.len(), ' '))) {
                if match_tokens(rest, &candidate[idx..]) {
                    return true;
                }
            }
            false
        }
    }
}
