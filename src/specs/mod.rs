// src/specs/mod.rs
//! # Page readers
//!
//! Each reader knows *how to read one page* and returns
//! typed rows; it never fetches, caches, persists or decides when to run.
//!
//! ## Typical call chain
//! ```text
//! runner → source::Source::fetch(url) → specs::<page>::parse(doc)
//!                                   ↘  Vec<RankedEntry>
//!          store::Store::save (outside of specs)
//! ```
//!
//! ## Conventions
//! - Tolerant of markup noise, whitespace and stray lines; strict on the
//!   shape of the rows it accepts.
//! - Testable offline against captured text.
pub mod clans;
