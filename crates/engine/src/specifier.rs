// SPDX-License-Identifier: MPL-2.0

//! `%`-specifier expansion.

/// Expand `%n`, `%N`, `%p`, `%i`, `%j` and `%%` in `value`, relative to
/// `unit_name`. Unknown specifiers pass through unchanged with a warning.
pub fn expand(value: &str, unit_name: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push_str(unit_name),
            Some('N') => out.push_str(&unitname::without_suffix(unit_name).unwrap_or_default()),
            Some('p') => out.push_str(&unitname::prefix(unit_name).unwrap_or_default()),
            Some('i') => out.push_str(&unitname::instance_of(unit_name).unwrap_or_default()),
            Some('j') => out.push_str(&unitname::prefix_last_component(unit_name).unwrap_or_default()),
            Some('%') => out.push('%'),
            Some(other) => {
                log::warn!("unknown specifier %{other} in {value:?}, passing through unchanged");
                out.push('%');
                out.push(other);
            }
            None => {
                log::warn!("trailing %% in {value:?}");
                out.push('%');
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::expand;

    #[test]
    fn expands_known_specifiers() {
        assert_eq!(expand("%n", "getty@tty1.service"), "getty@tty1.service");
        assert_eq!(expand("%N", "getty@tty1.service"), "getty@tty1");
        assert_eq!(expand("%p", "getty@tty1.service"), "getty");
        assert_eq!(expand("%i", "getty@tty1.service"), "tty1");
        assert_eq!(expand("%j", "foo-bar@tty1.service"), "bar");
        assert_eq!(expand("100%%", "foo.service"), "100%");
    }

    #[test]
    fn unknown_specifier_passes_through() {
        assert_eq!(expand("%Q", "foo.service"), "%Q");
    }

    #[test]
    fn plain_unit_has_empty_instance() {
        assert_eq!(expand("[%i]", "foo.service"), "[]");
    }
}
