//! Two-level escaping used by ffmpeg filtergraph descriptions.
//!
//! Level 1 protects a single option value (`'`, `\`, `:`); level 2 protects a whole filter
//! description inside a graph (`\`, `[`, `]`, `;`, `,`).

const VALUE_SPECIAL: &[char] = &['\'', '\\', ':'];
const VALUE_QUOTE_TRIGGER: &[char] = &['[', ']', ',', ';', '\'', '\\', ' '];
const DESCRIPTION_SPECIAL: &[char] = &['\\', '[', ']', ';', ','];

fn backslash_escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Level-1 escape of an option value, quoting it when it still carries structural characters.
pub fn escape_value(value: &str) -> String {
    let escaped = backslash_escape(value, VALUE_SPECIAL);
    if escaped.contains(VALUE_QUOTE_TRIGGER) {
        format!("'{escaped}'")
    } else {
        escaped
    }
}

/// Level-2 escape of a complete `name=arguments` description.
pub fn escape_description(desc: &str) -> String {
    backslash_escape(desc, DESCRIPTION_SPECIAL)
}

/// Undo [`escape_description`]. Backslashes in front of other characters are level-1 escapes
/// and are kept.
pub fn unescape_description(desc: &str) -> String {
    let mut out = String::with_capacity(desc.len());
    let mut chars = desc.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && DESCRIPTION_SPECIAL.contains(&next)
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

/// Strip quotes and resolve backslash escapes of a level-1 value.
pub fn unquote_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Split `s` on `sep` wherever `sep` is not backslash-escaped.
pub fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split `s` on `sep` outside single quotes and backslash escapes.
pub(crate) fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut escaped = false;
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '\'' {
            quoted = !quoted;
        } else if c == sep && !quoted {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// `true` when the byte at `idx` is preceded by an odd run of backslashes.
pub(crate) fn is_escaped_at(s: &str, idx: usize) -> bool {
    s.as_bytes()[..idx]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count()
        % 2
        == 1
}

#[cfg(test)]
#[path = "../../tests/unit/filtergraph/escape.rs"]
mod tests;
