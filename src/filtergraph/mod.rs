//! Composition and parsing of ffmpeg filter expressions and filtergraphs.
//!
//! A filtergraph is a `;`-separated list of chains; each chain is a `,`-separated list of
//! filters, bracketed by `[label]` groups naming its input and output pads.

/// Filter chains.
pub mod chain;
/// Two-level escaping helpers.
pub mod escape;
/// Single filter expressions.
pub mod filter;
/// Complex filtergraphs and pad-label bookkeeping.
pub mod graph;
