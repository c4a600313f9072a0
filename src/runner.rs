// src/runner.rs
//! One collection cycle: fetch → persist → render → notify.
//!
//! Only a fetch failure ends the cycle early, and then nothing is written or
//! sent. Every later failure is logged, recorded in the [`CycleReport`] and
//! confined to its own stage (and band): a broken store still gets charts
//! drawn from the in-memory history, a corrupt history is set aside and
//! restarted, a broken chart does not stop the other band, a failed delivery
//! never re-renders.
//!
//! Callers must not run two cycles against the same artifact at once.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use crate::{
    chart::{Renderer, legend},
    config::{RetentionMode, RunOptions},
    data::{Observation, ObservationSet, RankedEntry, stamp_batch, truncate_to_secs},
    error::CycleError,
    notify::Notifier,
    progress::Progress,
    source::Source,
    specs::clans,
    store::{Store, append},
    window::{self, Band},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Persisting,
    Rendering,
    Notifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Stage::Fetching => "FETCHING",
            Stage::Persisting => "PERSISTING",
            Stage::Rendering => "RENDERING",
            Stage::Notifying => "NOTIFYING",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    Fetching,
    Persisting,
    Rendering,
    Notifying,
    Done,
    Failed(Stage),
}

#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub band: Option<Band>,
    pub error: CycleError,
}

#[derive(Debug)]
pub struct ChartOutcome {
    pub band: Band,
    pub path: PathBuf,
    pub caption: String,
    pub rendered: bool,
    pub notified: bool,
}

#[derive(Debug)]
pub struct CycleReport {
    pub state: CycleState,
    pub timestamp: NaiveDateTime,
    pub fetched: usize,
    pub expired: bool,
    pub persisted: bool,
    /// Where a corrupt history was moved this cycle.
    pub quarantined: Option<PathBuf>,
    pub observations: usize,
    pub charts: Vec<ChartOutcome>,
    pub failures: Vec<StageFailure>,
}

impl CycleReport {
    fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            state: CycleState::Fetching,
            timestamp,
            fetched: 0,
            expired: false,
            persisted: false,
            quarantined: None,
            observations: 0,
            charts: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, stage: Stage, band: Option<Band>, error: impl Into<CycleError>) {
        self.failures.push(StageFailure { stage, band, error: error.into() });
    }

    pub fn is_done(&self) -> bool { self.state == CycleState::Done }

    pub fn failures_in(&self, stage: Stage) -> impl Iterator<Item = &StageFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }

    fn stage_ok(&self, stage: Stage) -> bool { self.failures_in(stage).next().is_none() }

    /// 0 once the cycle reached DONE, whatever failed after fetching.
    pub fn exit_code(&self) -> i32 {
        match self.state {
            CycleState::Done => 0,
            _ => 1,
        }
    }
}

/// Everything a cycle talks to.
pub struct Collaborators<'a> {
    pub source: &'a dyn Source,
    pub store: &'a mut dyn Store,
    pub renderer: &'a dyn Renderer,
    pub notifier: &'a dyn Notifier,
}

/// Run one full cycle stamped at `now`.
/// `progress` can be None (no UI updates) or Some(&mut impl Progress).
pub fn run_cycle(
    deps: Collaborators<'_>,
    opts: &RunOptions,
    now: NaiveDateTime,
    mut progress: Option<&mut dyn Progress>,
) -> CycleReport {
    let now = truncate_to_secs(now);
    let mut report = CycleReport::new(now);

    if let Some(p) = progress.as_deref_mut() {
        p.begin(4);
    }

    /* ---------------- FETCHING ---------------- */
    let entries = match fetch_entries(deps.source, opts) {
        Ok(entries) => entries,
        Err(e) => {
            error!(stage = %Stage::Fetching, url = %opts.source_url, error = %e, "cycle aborted");
            report.fail(Stage::Fetching, None, e);
            report.state = CycleState::Failed(Stage::Fetching);
            if let Some(p) = progress.as_deref_mut() {
                p.stage_done(Stage::Fetching, false);
                p.finish(&report);
            }
            return report;
        }
    };
    report.fetched = entries.len();
    info!(stage = %Stage::Fetching, entries = entries.len(), "leaderboard fetched");
    if let Some(p) = progress.as_deref_mut() {
        p.stage_done(Stage::Fetching, true);
    }

    /* ---------------- PERSISTING ---------------- */
    report.state = CycleState::Persisting;
    let batch = stamp_batch(entries, now);
    let combined = persist(deps.store, opts, now, &batch, &mut report);
    report.observations = combined.len();
    if let Some(p) = progress.as_deref_mut() {
        p.stage_done(Stage::Persisting, report.stage_ok(Stage::Persisting));
    }

    /* ---------------- RENDERING ---------------- */
    report.state = CycleState::Rendering;
    for chart in &opts.charts {
        let series = window::band_series(&combined, now, opts.window, chart.band);
        let path = opts.out_dir.join(&chart.file_name);
        let text = caption(&opts.caption, chart.band, &legend(&series));

        let rendered = match deps.renderer.render(&series, &chart.title, &path) {
            Ok(()) => {
                info!(stage = %Stage::Rendering, band = %chart.band, clans = series.len(),
                    path = %path.display(), "chart rendered");
                true
            }
            Err(e) => {
                warn!(stage = %Stage::Rendering, band = %chart.band, error = %e, "chart skipped");
                report.fail(Stage::Rendering, Some(chart.band), e);
                false
            }
        };
        report.charts.push(ChartOutcome { band: chart.band, path, caption: text, rendered, notified: false });
    }
    if let Some(p) = progress.as_deref_mut() {
        p.stage_done(Stage::Rendering, report.stage_ok(Stage::Rendering));
    }

    /* ---------------- NOTIFYING ---------------- */
    report.state = CycleState::Notifying;
    let mut notify_failures = Vec::new();
    for chart in report.charts.iter_mut().filter(|c| c.rendered) {
        match deps.notifier.notify(&chart.path, &chart.caption) {
            Ok(()) => {
                info!(stage = %Stage::Notifying, band = %chart.band, "chart sent");
                chart.notified = true;
            }
            Err(e) => {
                warn!(stage = %Stage::Notifying, band = %chart.band, error = %e, "chart not sent");
                notify_failures.push((chart.band, e));
            }
        }
    }
    for (band, e) in notify_failures {
        report.fail(Stage::Notifying, Some(band), e);
    }
    if let Some(p) = progress.as_deref_mut() {
        p.stage_done(Stage::Notifying, report.stage_ok(Stage::Notifying));
    }

    report.state = CycleState::Done;
    info!(
        observations = report.observations,
        persisted = report.persisted,
        failures = report.failures.len(),
        "cycle done"
    );
    if let Some(p) = progress.as_deref_mut() {
        p.finish(&report);
    }
    report
}

fn fetch_entries(source: &dyn Source, opts: &RunOptions) -> Result<Vec<RankedEntry>, CycleError> {
    let doc = source.fetch(&opts.source_url)?;
    Ok(clans::parse(&doc, opts.max_entries)?)
}

/// Expire, load, append, save. Returns the combined set even when the store
/// misbehaves, so charts can still be drawn this cycle.
fn persist(
    store: &mut dyn Store,
    opts: &RunOptions,
    now: NaiveDateTime,
    batch: &[Observation],
    report: &mut CycleReport,
) -> ObservationSet {
    if opts.retention_mode == RetentionMode::Wholesale {
        match store.expire_if_stale(now) {
            Ok(expired) => report.expired = expired,
            Err(e) => {
                warn!(stage = %Stage::Persisting, error = %e, "retention check failed");
                report.fail(Stage::Persisting, None, e);
            }
        }
    }

    let (existing, readable) = match store.load() {
        Ok(Some(set)) => (set, true),
        Ok(None) => (ObservationSet::new(), true),
        Err(e) if e.is_corrupt() => {
            error!(stage = %Stage::Persisting, error = %e, "history corrupt; starting a fresh one");
            report.fail(Stage::Persisting, None, e);
            match store.quarantine() {
                Ok(moved) => {
                    report.quarantined = Some(moved);
                    (ObservationSet::new(), true)
                }
                Err(e) => {
                    error!(stage = %Stage::Persisting, error = %e,
                        "corrupt history could not be moved aside; charting this cycle only");
                    report.fail(Stage::Persisting, None, e);
                    (ObservationSet::new(), false)
                }
            }
        }
        Err(e) => {
            error!(stage = %Stage::Persisting, error = %e,
                "history unreadable; charting this cycle only and leaving the artifact untouched");
            report.fail(Stage::Persisting, None, e);
            (ObservationSet::new(), false)
        }
    };

    let existing = match opts.retention_mode {
        RetentionMode::Wholesale => existing,
        RetentionMode::PerEntry => prune(existing, now, opts),
    };

    let combined = append(&existing, batch);
    if readable {
        match store.save(&combined) {
            Ok(()) => report.persisted = true,
            Err(e) => {
                error!(stage = %Stage::Persisting, error = %e, "history not saved; charting from memory");
                report.fail(Stage::Persisting, None, e);
            }
        }
    }
    combined
}

fn prune(existing: ObservationSet, now: NaiveDateTime, opts: &RunOptions) -> ObservationSet {
    let before = existing.len();
    let kept: Vec<Observation> = window::recent_window(&existing, now, opts.retention)
        .into_iter()
        .cloned()
        .collect();
    if kept.len() < before {
        info!(dropped = before - kept.len(), "pruned observations past retention");
    }
    ObservationSet::from(kept)
}

fn caption(base: &str, band: Band, legend: &[(String, &'static str)]) -> String {
    let mut out = format!("{base} (ranks {band})");
    for (name, colour) in legend {
        out.push('\n');
        out.push_str(colour);
        out.push_str(": ");
        out.push_str(name);
    }
    out
}
