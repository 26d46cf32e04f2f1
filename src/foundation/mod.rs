//! Shared error taxonomy and core value types.

pub mod core;
pub mod error;
