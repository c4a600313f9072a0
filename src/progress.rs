// src/progress.rs
use crate::runner::{CycleReport, Stage};

/// Lightweight progress reporting for a collection cycle.
/// Frontends implement this to surface status to users.
pub trait Progress {
    /// Called at the start with the number of stages the cycle may run.
    fn begin(&mut self, _stages: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// Called when a stage finishes; `ok` is false if it recorded any failure.
    fn stage_done(&mut self, _stage: Stage, _ok: bool) {}

    /// Called once at the end, successful or not.
    fn finish(&mut self, _report: &CycleReport) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}
