//! Distinguished name composition.
//!
//! DNs are never stored independently; they are derived from an entity's naming attribute and
//! a configured base path. Values are escaped per RFC 4514 so identifiers containing special
//! characters still produce a single RDN.

use std::fmt;

/// Distinguished name derived from a naming attribute and a base DN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DistinguishedName(String);

impl DistinguishedName {
    /// Qualifies `attribute=value` under `base`.
    #[must_use]
    pub fn under(base: &str, attribute: &str, value: &str) -> Self {
        if base.is_empty() {
            return Self(format!("{attribute}={}", escape_value(value)));
        }
        Self(format!("{attribute}={},{base}", escape_value(value)))
    }

    /// Borrows the DN string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DistinguishedName> for String {
    fn from(value: DistinguishedName) -> Self {
        value.0
    }
}

/// Splits a DN into its comma-separated components, honouring `\` escapes.
#[must_use]
pub fn components(dn: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escape = false;

    for ch in dn.chars() {
        if escape {
            current.push('\\');
            current.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            ',' => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Returns the unescaped value of the component at `index`, stripping an `attribute=` prefix
/// when the component carries it.
#[must_use]
pub fn component_value(dn: &str, index: usize, attribute: &str) -> Option<String> {
    let component = components(dn).into_iter().nth(index)?;
    let value = match component.split_once('=') {
        Some((name, value)) if name.trim().eq_ignore_ascii_case(attribute) => value.trim(),
        _ => component.as_str(),
    };
    Some(unescape_value(value))
}

/// Escapes an attribute value for use inside an RDN.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in chars.iter().enumerate() {
        let is_first = idx == 0;
        let is_last = idx + 1 == chars.len();
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (is_first && (*ch == ' ' || *ch == '#'))
            || (is_last && *ch == ' ');

        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(*ch);
    }

    escaped
}

fn unescape_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(ch);
        }
    }
    result
}
