use std::fmt;

use crate::filtergraph::escape::split_unescaped;
use crate::filtergraph::filter::{Filter, parse_filter};
use crate::foundation::error::FfpipeResult;

/// One element of a filter chain: either a pre-rendered expression or a structured [`Filter`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    /// Literal expression, emitted verbatim.
    Expr(String),
    /// Structured filter, composed with escaping.
    Filter(Filter),
}

impl FilterSpec {
    /// Render this element.
    pub fn compose(&self) -> String {
        match self {
            Self::Expr(s) => s.clone(),
            Self::Filter(f) => f.compose(),
        }
    }

    /// Structured view of this element, decomposing literal expressions.
    pub fn to_filter(&self) -> FfpipeResult<Filter> {
        match self {
            Self::Expr(s) => parse_filter(s),
            Self::Filter(f) => Ok(f.clone()),
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compose())
    }
}

impl From<&str> for FilterSpec {
    fn from(v: &str) -> Self {
        Self::Expr(v.to_string())
    }
}

impl From<String> for FilterSpec {
    fn from(v: String) -> Self {
        Self::Expr(v)
    }
}

impl From<Filter> for FilterSpec {
    fn from(v: Filter) -> Self {
        Self::Filter(v)
    }
}

/// Compose a filter chain: `[in0][in1]f1,f2,...[out0][out1]`.
///
/// Empty labels render as `[]`, reserving the pad slot.
pub fn compose_chain<L: AsRef<str>>(
    filters: &[FilterSpec],
    head_labels: &[L],
    tail_labels: &[L],
) -> String {
    let mut out = String::new();
    for label in head_labels {
        push_label(&mut out, label.as_ref());
    }
    out.push_str(
        &filters
            .iter()
            .map(FilterSpec::compose)
            .collect::<Vec<_>>()
            .join(","),
    );
    for label in tail_labels {
        push_label(&mut out, label.as_ref());
    }
    out
}

fn push_label(out: &mut String, label: &str) {
    out.push('[');
    out.push_str(label);
    out.push(']');
}

/// Split the filter section of a chain (labels already removed) on unescaped commas.
pub fn split_chain(body: &str) -> Vec<FilterSpec> {
    let body = body.trim();
    if body.is_empty() {
        return Vec::new();
    }
    split_unescaped(body, ',')
        .into_iter()
        .map(|f| FilterSpec::Expr(f.trim().to_string()))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/filtergraph/chain.rs"]
mod tests;
