//! Report renderers for manifest analysis results.
//!
//! - [`terminal`]: colored summary box, conflict list and component tables;
//!   respects `--verbose` / `--quiet`.

pub mod terminal;
