// tests/cycle.rs
//
// Whole cycles against in-memory collaborators: what gets written, drawn
// and sent when each stage succeeds or fails.
//
use std::cell::RefCell;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use clan_watch::chart::Renderer;
use clan_watch::config::{RetentionMode, RunOptions};
use clan_watch::data::{Observation, ObservationSet};
use clan_watch::error::{CycleError, FetchError, NotifyError, RenderError};
use clan_watch::notify::Notifier;
use clan_watch::progress::{NullProgress, Progress};
use clan_watch::runner::{run_cycle, Collaborators, CycleReport, CycleState, Stage};
use clan_watch::source::Source;
use clan_watch::store::{MemoryStore, Store};
use clan_watch::window::{Band, Series};

/* ---------------- Fakes ---------------- */

struct FakeSource {
    doc: Option<String>,
}

impl FakeSource {
    fn page(doc: impl Into<String>) -> Self { Self { doc: Some(doc.into()) } }
    fn down() -> Self { Self { doc: None } }
}

impl Source for FakeSource {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.doc.clone().ok_or_else(|| FetchError::Status { url: url.to_string(), status: 503 })
    }
}

#[derive(Default)]
struct FakeRenderer {
    fail_file: Option<&'static str>,
    calls: RefCell<Vec<(String, Vec<String>)>>,
}

impl Renderer for FakeRenderer {
    fn render(&self, series: &Series, _title: &str, out: &Path) -> Result<(), RenderError> {
        let file = out.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.borrow_mut().push((file.clone(), series.keys().cloned().collect()));
        if self.fail_file == Some(file.as_str()) {
            return Err(RenderError::NoData);
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeNotifier {
    fail: bool,
    sent: RefCell<Vec<(PathBuf, String)>>,
}

impl Notifier for FakeNotifier {
    fn notify(&self, image: &Path, caption: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Status { status: 500, body: "boom".into() });
        }
        self.sent.borrow_mut().push((image.to_path_buf(), caption.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct StageLog {
    begun: Option<usize>,
    stages: Vec<(Stage, bool)>,
    finished: bool,
}

impl Progress for StageLog {
    fn begin(&mut self, stages: usize) { self.begun = Some(stages); }
    fn stage_done(&mut self, stage: Stage, ok: bool) { self.stages.push((stage, ok)); }
    fn finish(&mut self, _report: &CycleReport) { self.finished = true; }
}

/* ---------------- Helpers ---------------- */

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 3).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

fn leaderboard(n: u32) -> String {
    let mut doc = String::from("<h1>Top Clans</h1>\nrank,name,points\n");
    for r in 1..=n {
        doc.push_str(&format!("{r},Clan{r:02},{}<br>\n", 5000 - r * 100));
    }
    doc
}

fn opts() -> RunOptions {
    RunOptions { out_dir: PathBuf::from("charts"), ..RunOptions::default() }
}

fn history(entries: &[(u32, &str, f64, NaiveDateTime)]) -> ObservationSet {
    ObservationSet::from(
        entries
            .iter()
            .map(|&(rank, name, points, ts)| Observation::new(rank, name, points, ts))
            .collect::<Vec<_>>(),
    )
}

fn run(
    source: &FakeSource,
    store: &mut MemoryStore,
    renderer: &FakeRenderer,
    notifier: &FakeNotifier,
    opts: &RunOptions,
) -> CycleReport {
    run_at(source, store, renderer, notifier, opts, now())
}

fn run_at(
    source: &FakeSource,
    store: &mut MemoryStore,
    renderer: &FakeRenderer,
    notifier: &FakeNotifier,
    opts: &RunOptions,
    at: NaiveDateTime,
) -> CycleReport {
    run_cycle(
        Collaborators { source, store, renderer, notifier },
        opts,
        at,
        Some(&mut NullProgress),
    )
}

fn stored(store: &MemoryStore) -> ObservationSet {
    store.load().unwrap().unwrap()
}

/* ---------------- Scenarios ---------------- */

#[test]
fn first_cycle_stores_and_sends_both_bands() {
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());
    let mut store = MemoryStore::new();

    let report = run(&FakeSource::page(leaderboard(12)), &mut store, &renderer, &notifier, &opts());

    assert_eq!(report.state, CycleState::Done);
    assert_eq!(report.exit_code(), 0);
    assert!(report.failures.is_empty());
    assert_eq!(report.fetched, 10);
    assert!(report.persisted);

    let set = stored(&store);
    assert_eq!(set.len(), 10);
    assert!(set.iter().all(|o| o.timestamp == now()));

    let calls = renderer.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "top_5_clans_rankings.png");
    assert_eq!(calls[0].1, ["Clan01", "Clan02", "Clan03", "Clan04", "Clan05"]);
    assert_eq!(calls[1].0, "top_6_to_10_clans_rankings.png");
    assert_eq!(calls[1].1, ["Clan06", "Clan07", "Clan08", "Clan09", "Clan10"]);

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, PathBuf::from("charts").join("top_5_clans_rankings.png"));
    assert!(sent[0].1.starts_with("Top Clans Rankings over Past Day (ranks 1-5)"));
    assert!(sent[0].1.contains("blue: Clan01"));
    assert!(sent[1].1.contains("(ranks 6-10)"));
}

#[test]
fn fetch_failure_writes_nothing_and_sends_nothing() {
    let old = history(&[(1, "Alpha", 900.0, now() - TimeDelta::hours(1))]);
    let mut store = MemoryStore::with_set(&old, now() - TimeDelta::days(2)).unwrap();
    let before = store.raw().map(str::to_owned);
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());

    let report = run(&FakeSource::down(), &mut store, &renderer, &notifier, &opts());

    assert_eq!(report.state, CycleState::Failed(Stage::Fetching));
    assert_ne!(report.exit_code(), 0);
    assert!(matches!(report.failures[0].error, CycleError::Fetch(FetchError::Status { status: 503, .. })));
    assert_eq!(store.raw().map(str::to_owned), before);
    assert_eq!(store.save_count(), 0);
    assert!(renderer.calls.borrow().is_empty());
    assert!(notifier.sent.borrow().is_empty());
}

#[test]
fn page_without_entries_is_a_fetch_stage_failure() {
    let mut store = MemoryStore::new();
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());

    let report = run(&FakeSource::page("<p>maintenance</p>"), &mut store, &renderer, &notifier, &opts());

    assert_eq!(report.state, CycleState::Failed(Stage::Fetching));
    assert!(matches!(report.failures[0].error, CycleError::Parse(_)));
    assert!(store.raw().is_none());
    assert!(notifier.sent.borrow().is_empty());
}

#[test]
fn write_failure_still_renders_and_sends_from_memory() {
    let old = history(&[(3, "Veteran", 700.0, now() - TimeDelta::hours(2))]);
    let mut store = MemoryStore::with_set(&old, now() - TimeDelta::days(1)).unwrap().failing_writes();
    let before = store.raw().map(str::to_owned);
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());

    let report = run(&FakeSource::page(leaderboard(10)), &mut store, &renderer, &notifier, &opts());

    assert_eq!(report.state, CycleState::Done);
    assert_eq!(report.exit_code(), 0);
    assert!(!report.persisted);
    assert_eq!(report.observations, 11);
    assert_eq!(report.failures_in(Stage::Persisting).count(), 1);
    assert_eq!(store.raw().map(str::to_owned), before);

    let calls = renderer.calls.borrow();
    assert!(calls[0].1.contains(&"Veteran".to_string()));
    assert_eq!(notifier.sent.borrow().len(), 2);
}

const BROKEN: &str = "[{\"rank\": 1, \"na";

#[test]
fn corrupt_history_is_moved_aside_and_restarted() {
    let mut store = MemoryStore::with_raw(BROKEN, now() - TimeDelta::days(1));
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());

    let report = run(&FakeSource::page(leaderboard(10)), &mut store, &renderer, &notifier, &opts());

    assert_eq!(report.state, CycleState::Done);
    let failure = report.failures_in(Stage::Persisting).next().unwrap();
    assert!(matches!(&failure.error, CycleError::Store(e) if e.is_corrupt()));
    assert!(report.quarantined.is_some());
    assert!(report.persisted);
    assert_eq!(store.quarantined(), Some(BROKEN));
    assert_eq!(store.save_count(), 1);
    assert_eq!(stored(&store).len(), 10);
    assert_eq!(report.observations, 10);
    assert_eq!(notifier.sent.borrow().len(), 2);
}

#[test]
fn corrupt_history_recovers_under_per_entry_retention() {
    let mut store = MemoryStore::with_raw(BROKEN, now());
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());
    let opts = RunOptions { retention_mode: RetentionMode::PerEntry, ..opts() };
    let source = FakeSource::page(leaderboard(10));

    let mut sizes = Vec::new();
    for days in [1, 2, 40] {
        let report = run_at(&source, &mut store, &renderer, &notifier, &opts, now() + TimeDelta::days(days));
        assert!(report.persisted, "cycle at +{days}d did not persist");
        sizes.push(stored(&store).len());
    }

    // Day 40 prunes the first two batches.
    assert_eq!(sizes, [10, 20, 10]);
    assert_eq!(store.save_count(), 3);
    assert_eq!(store.quarantined(), Some(BROKEN));
}

#[test]
fn render_failure_only_skips_its_own_band() {
    let renderer = FakeRenderer { fail_file: Some("top_5_clans_rankings.png"), ..FakeRenderer::default() };
    let notifier = FakeNotifier::default();
    let mut store = MemoryStore::new();

    let report = run(&FakeSource::page(leaderboard(10)), &mut store, &renderer, &notifier, &opts());

    assert_eq!(report.state, CycleState::Done);
    let failures: Vec<_> = report.failures_in(Stage::Rendering).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].band, Some(Band::new(1, 5)));

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.ends_with("top_6_to_10_clans_rankings.png"));
    assert!(report.persisted);
}

#[test]
fn notify_failure_is_recorded_per_band_without_rerendering() {
    let renderer = FakeRenderer::default();
    let notifier = FakeNotifier { fail: true, ..FakeNotifier::default() };
    let mut store = MemoryStore::new();

    let report = run(&FakeSource::page(leaderboard(10)), &mut store, &renderer, &notifier, &opts());

    assert_eq!(report.state, CycleState::Done);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.failures_in(Stage::Notifying).count(), 2);
    assert_eq!(renderer.calls.borrow().len(), 2);
    assert!(report.charts.iter().all(|c| c.rendered && !c.notified));
}

#[test]
fn stale_artifact_is_reset_before_appending() {
    let old = history(&[
        (1, "Ancient", 100.0, now() - TimeDelta::days(31)),
        (2, "Recent", 200.0, now() - TimeDelta::hours(3)),
    ]);
    let mut store = MemoryStore::with_set(&old, now() - TimeDelta::days(31)).unwrap();
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());

    let report = run(&FakeSource::page(leaderboard(10)), &mut store, &renderer, &notifier, &opts());

    assert!(report.expired);
    let set = stored(&store);
    assert_eq!(set.len(), 10);
    assert!(set.iter().all(|o| o.name != "Recent"));
}

#[test]
fn artifact_at_exactly_retention_age_is_kept() {
    let old = history(&[(2, "Recent", 200.0, now() - TimeDelta::hours(3))]);
    let mut store = MemoryStore::with_set(&old, now() - TimeDelta::days(30)).unwrap();
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());

    let report = run(&FakeSource::page(leaderboard(10)), &mut store, &renderer, &notifier, &opts());

    assert!(!report.expired);
    assert_eq!(stored(&store).len(), 11);
}

#[test]
fn per_entry_retention_drops_only_old_observations() {
    let old = history(&[
        (1, "Ancient", 100.0, now() - TimeDelta::days(40)),
        (2, "Recent", 200.0, now() - TimeDelta::days(1)),
    ]);
    let mut store = MemoryStore::with_set(&old, now() - TimeDelta::days(60)).unwrap();
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());
    let opts = RunOptions { retention_mode: RetentionMode::PerEntry, ..opts() };

    let report = run(&FakeSource::page(leaderboard(10)), &mut store, &renderer, &notifier, &opts);

    assert!(!report.expired);
    let set = stored(&store);
    assert_eq!(set.len(), 11);
    assert_eq!(set.as_slice()[0].name, "Recent");
    assert!(set.iter().all(|o| o.name != "Ancient"));
}

#[test]
fn legacy_string_history_charts_alongside_new_batch() {
    let raw = format!(
        r#"[{{"rank": "2", "name": "Clan02", "points": "4700.0", "timestamp": "{}"}}]"#,
        (now() - TimeDelta::hours(6)).format("%Y-%m-%d %H:%M:%S")
    );
    let mut store = MemoryStore::with_raw(raw, now() - TimeDelta::days(3));
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());

    let report = run(&FakeSource::page(leaderboard(10)), &mut store, &renderer, &notifier, &opts());

    assert!(report.failures.is_empty());
    let set = stored(&store);
    assert_eq!(set.len(), 11);
    assert_eq!(set.as_slice()[0].score, 4700.0);
}

#[test]
fn progress_sees_every_stage() {
    let (renderer, notifier) = (FakeRenderer::default(), FakeNotifier::default());
    let mut store = MemoryStore::new();
    let mut log = StageLog::default();

    run_cycle(
        Collaborators {
            source: &FakeSource::page(leaderboard(10)),
            store: &mut store,
            renderer: &renderer,
            notifier: &notifier,
        },
        &opts(),
        now(),
        Some(&mut log),
    );

    assert_eq!(log.begun, Some(4));
    assert_eq!(
        log.stages,
        [
            (Stage::Fetching, true),
            (Stage::Persisting, true),
            (Stage::Rendering, true),
            (Stage::Notifying, true),
        ]
    );
    assert!(log.finished);
}
