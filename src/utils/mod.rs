//! Utility functions for working with A2A types.

pub mod text;

pub use text::*;
