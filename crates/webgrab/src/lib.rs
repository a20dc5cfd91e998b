//! Public facade crate for `webgrab`.
//!
//! This crate intentionally contains no IO or strategy-specific logic.
//! It re-exports the backend-agnostic types from `webgrab-core`; the
//! extraction engine itself lives in `webgrab-extract`.

pub use webgrab_core::*;
