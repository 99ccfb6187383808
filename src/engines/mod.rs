//! Speech synthesis engines.
//!
//! This module contains implementations of text-to-speech engines.
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `concat` - Syllable-concatenation engine for Ukrainian (enabled by default)

#[cfg(feature = "concat")]
pub mod concat;
