use std::fmt;

use crate::filtergraph::escape::{
    escape_description, escape_value, split_unquoted, unescape_description, unquote_value,
};
use crate::foundation::error::{FfpipeError, FfpipeResult};

/// A single filter option value.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean, rendered `true`/`false`.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String, subject to value-level escaping.
    Str(String),
    /// List of values, joined with `|`.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Unescaped textual form, as ffmpeg sees it after parsing.
    pub fn to_arg_string(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::to_arg_string)
                .collect::<Vec<_>>()
                .join("|"),
        }
    }

    /// Value-level (level 1) rendering. Numbers and booleans skip backslash escaping.
    fn finalize(&self) -> String {
        match self {
            Self::Str(_) | Self::List(_) => escape_value(&self.to_arg_string()),
            _ => self.to_arg_string(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for FilterValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// One filter instance: `name[@id][=args]`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Filter {
    /// Filter class name, e.g. `scale`.
    pub name: String,
    /// Optional instance id, appended as `@id`.
    pub id: Option<String>,
    /// Option values in declaration order.
    pub positional: Vec<FilterValue>,
    /// `key=value` options, emitted after the positional ones in insertion order.
    pub keyed: Vec<(String, FilterValue)>,
}

impl Filter {
    /// Filter without options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the instance id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Append a positional option.
    pub fn arg(mut self, value: impl Into<FilterValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a `key=value` option.
    pub fn opt(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.keyed.push((key.into(), value.into()));
        self
    }

    /// Look up a keyed option by name.
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.keyed.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Render with both escaping levels applied.
    pub fn compose(&self) -> String {
        compose_filter(&self.name, &self.positional, self.id.as_deref(), &self.keyed)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compose())
    }
}

/// Compose a filter expression `name[@id][=arg1:...:key=val:...]`.
///
/// Values get value-level escaping, then the whole description gets description-level
/// escaping so it can be embedded in a filtergraph.
pub fn compose_filter(
    name: &str,
    positional: &[FilterValue],
    id: Option<&str>,
    keyed: &[(String, FilterValue)],
) -> String {
    let name = match id {
        Some(id) => format!("{name}@{id}"),
        None => name.to_string(),
    };

    if positional.is_empty() && keyed.is_empty() {
        return name;
    }

    let args = positional
        .iter()
        .map(FilterValue::finalize)
        .chain(keyed.iter().map(|(k, v)| format!("{k}={}", v.finalize())))
        .collect::<Vec<_>>()
        .join(":");

    escape_description(&format!("{name}={args}"))
}

/// Decompose a filter expression produced by [`compose_filter`].
///
/// Option values come back as [`FilterValue::Str`]; an option is keyed when the text before its
/// first `=` is an identifier.
pub fn parse_filter(expr: &str) -> FfpipeResult<Filter> {
    let desc = unescape_description(expr.trim());
    let (head, args) = match desc.split_once('=') {
        Some((head, args)) => (head, Some(args)),
        None => (desc.as_str(), None),
    };

    let (name, id) = match head.split_once('@') {
        Some((name, id)) => (name, Some(id.to_string())),
        None => (head, None),
    };
    if name.is_empty() {
        return Err(FfpipeError::graph(format!(
            "filter expression '{expr}' has no filter name"
        )));
    }

    let mut filter = Filter {
        name: name.to_string(),
        id,
        ..Filter::default()
    };

    let Some(args) = args else {
        return Ok(filter);
    };

    for arg in split_unquoted(args, ':') {
        match arg.split_once('=') {
            Some((key, value)) if is_option_key(key) => {
                filter
                    .keyed
                    .push((key.to_string(), FilterValue::Str(unquote_value(value))));
            }
            _ => {
                if !filter.keyed.is_empty() {
                    return Err(FfpipeError::graph(format!(
                        "positional option '{arg}' follows keyed options in '{expr}'"
                    )));
                }
                filter.positional.push(FilterValue::Str(unquote_value(arg)));
            }
        }
    }

    Ok(filter)
}

fn is_option_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[path = "../../tests/unit/filtergraph/filter.rs"]
mod tests;
