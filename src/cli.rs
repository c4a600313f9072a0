// src/cli.rs
use color_eyre::eyre::{Result, WrapErr};

use crate::chart::PngChart;
use crate::config::RunOptions;
use crate::config::consts::WEBHOOK_ENV;
use crate::data::now_stamp;
use crate::notify::DiscordWebhook;
use crate::progress::Progress;
use crate::runner::{self, Collaborators, CycleReport, Stage};
use crate::source::HttpSource;
use crate::store::JsonFileStore;

/// Prints one line per stage to stdout.
struct StageLines;

impl Progress for StageLines {
    fn log(&mut self, msg: &str) {
        println!("{msg}");
    }

    fn stage_done(&mut self, stage: Stage, ok: bool) {
        println!("{stage:<10} {}", if ok { "ok" } else { "FAILED" });
    }

    fn finish(&mut self, report: &CycleReport) {
        let sent = report.charts.iter().filter(|c| c.notified).count();
        println!(
            "{:?}: {} fetched, {} stored, {}/{} charts sent, {} failure(s)",
            report.state,
            report.fetched,
            report.observations,
            sent,
            report.charts.len(),
            report.failures.len()
        );
    }
}

/// Run one cycle with the production collaborators; returns the exit code.
/// Configuration comes from the environment only (see [`RunOptions::from_env`]).
pub fn run() -> Result<i32> {
    let opts = RunOptions::from_env().wrap_err("invalid configuration")?;
    crate::log::init(&opts.store_path);

    let source = HttpSource::new(&opts)?;
    let mut store = JsonFileStore::new(opts.store_path.clone()).with_max_age(opts.retention);
    let renderer = PngChart::default();
    let notifier = DiscordWebhook::new(&opts)?;

    let mut progress = StageLines;
    if !notifier.is_configured() {
        progress.log(&format!("{WEBHOOK_ENV} is not set; charts will be rendered but not sent"));
    }

    let report = runner::run_cycle(
        Collaborators {
            source: &source,
            store: &mut store,
            renderer: &renderer,
            notifier: &notifier,
        },
        &opts,
        now_stamp(),
        Some(&mut progress),
    );
    Ok(report.exit_code())
}
