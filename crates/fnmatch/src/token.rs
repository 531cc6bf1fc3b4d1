// SPDX-License-Identifier: MPL-2.0

/// Components of a compiled pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Token {
    /// A literal run of text, matched byte-for-byte.
    Text(String),
    /// A `?` or `*` wildcard.
    Glob(Matcher),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Matcher {
    /// `?` — exactly one character.
    One,
    /// `*` — zero or more characters.
    Any,
}

/// Tokenize a pattern string. Under `FNM_NOESCAPE`, `\` is ordinary text.
pub(crate) fn tokens(pattern: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut text = String::new();

    for c in pattern.chars() {
        match c {
            '?' => {
                flush(&mut out, &mut text);
                out.push(Token::Glob(Matcher::One));
            }
            '*' => {
                flush(&mut out, &mut text);
                // Collapse consecutive `*` — they're equivalent to one.
                if !matches!(out.last(), Some(Token::Glob(Matcher::Any))) {
                    out.push(Token::Glob(Matcher::Any));
                }
            }
            _ => text.push(c),
        }
    }
    flush(&mut out, &mut text);
    out
}

fn flush(out: &mut Vec<Token>, text: &mut String) {
    if !text.is_empty() {
        out.push(Token::Text(std::mem::take(text)));
    }
}
