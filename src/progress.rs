//! Progress reporting
//!
//! The orchestrator samples the run counters once per tick and hands the
//! sample, together with the alerts drained since the previous tick, to a
//! [`Reporter`]. Reporters only ever run on the orchestrating task, never on
//! a worker thread, so they may block briefly on their output without
//! slowing down the comparison itself.
//!
//! Three reporters are provided:
//!
//! - [`TerminalReporter`]: spinner while collecting, progress bar while
//!   verifying, alerts printed above the bar as they arrive
//! - [`JsonReporter`]: one JSON object per line for each alert and for the
//!   final summary
//! - [`SilentReporter`]: discards everything

use crate::types::{Alert, Phase, ProgressInfo, RunSummary, Severity};
use crate::utils::{format_bytes, format_count};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;
use tracing::warn;

/// Receives progress samples and alerts from a running pipeline
pub trait Reporter: Send + Sync {
    /// A phase is about to start its worker
    fn phase_started(&self, _phase: Phase, _info: &ProgressInfo) {}

    /// Periodic sample, with the alerts raised since the previous tick
    fn tick(&self, info: &ProgressInfo, alerts: &[Alert]);

    /// The phase worker has finished and the trailing tick was delivered
    fn phase_finished(&self, _phase: Phase, _info: &ProgressInfo) {}

    /// The run is over
    fn finished(&self, summary: &RunSummary);
}

/// Reporter that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn tick(&self, _info: &ProgressInfo, _alerts: &[Alert]) {}

    fn finished(&self, _summary: &RunSummary) {}
}

/// Interactive reporter for a terminal
///
/// Progress widgets are drawn on stderr and disappear when it is not a
/// terminal. Alerts and the final summary always go to stdout.
#[derive(Default)]
pub struct TerminalReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    /// Create a terminal reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Print a line without tearing the active progress widget
    fn emit(&self, line: &str) {
        match self.bar.lock().as_ref() {
            Some(pb) if !pb.is_hidden() => pb.println(line),
            _ => println!("{}", line),
        }
    }

    fn collecting_message(info: &ProgressInfo) -> String {
        format!(
            "Approximately {} files ({}) to analyze",
            format_count(info.processed),
            format_bytes(info.total_bytes)
        )
    }

    fn verifying_message(info: &ProgressInfo) -> String {
        format!(
            "{} {}",
            "Current File:".bold(),
            info.current_item.as_deref().unwrap_or("")
        )
    }
}

/// Render one alert for the terminal
pub fn render_alert(alert: &Alert) -> String {
    let tag = match alert.severity {
        Severity::Critical => "!!! CRITICAL !!!".white().on_red().bold(),
        Severity::Warning => "WARNING".yellow().bold(),
        Severity::Notice => "NOTICE".cyan(),
    };
    format!(
        "{} {} {}",
        tag,
        alert.path.display().to_string().blue(),
        alert.message
    )
}

impl Reporter for TerminalReporter {
    fn phase_started(&self, phase: Phase, info: &ProgressInfo) {
        let pb = match phase {
            Phase::Collecting => {
                println!("{}", "Collecting the live inventory...".bold());
                let pb = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
                    pb.set_style(style);
                }
                pb.set_message(Self::collecting_message(info));
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            }
            Phase::Verifying => {
                println!("{}", "Verifying the backup...".bold());
                let pb = ProgressBar::new(info.total.unwrap_or(0));
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{msg}\n{bar:40.cyan/blue} {percent:>3}% ({human_pos}/{human_len}) {elapsed_precise}")
                {
                    pb.set_style(style.progress_chars("#>-"));
                }
                pb
            }
        };

        *self.bar.lock() = Some(pb);
    }

    fn tick(&self, info: &ProgressInfo, alerts: &[Alert]) {
        for alert in alerts {
            self.emit(&render_alert(alert));
        }

        if let Some(pb) = self.bar.lock().as_ref() {
            match info.phase {
                Phase::Collecting => pb.set_message(Self::collecting_message(info)),
                Phase::Verifying => {
                    if let Some(total) = info.total {
                        pb.set_length(total);
                    }
                    pb.set_position(info.processed);
                    pb.set_message(Self::verifying_message(info));
                }
            }
        }
    }

    fn phase_finished(&self, phase: Phase, info: &ProgressInfo) {
        if let Some(pb) = self.bar.lock().take() {
            pb.finish_and_clear();
        }

        match phase {
            Phase::Collecting => println!(
                "  Found {} files ({}) to analyze",
                format_count(info.processed).green(),
                format_bytes(info.total_bytes).green()
            ),
            Phase::Verifying => println!(
                "  Verified {} of {} files",
                format_count(info.processed).green(),
                format_count(info.total.unwrap_or(info.processed))
            ),
        }
    }

    fn finished(&self, summary: &RunSummary) {
        println!("{}", "=".repeat(50));

        let headline = if summary.cancelled {
            "Interrupted!".yellow().bold()
        } else {
            "Done!".green().bold()
        };
        println!(
            "{} Checked the integrity of {} files. There are {} alerts.",
            headline,
            format_count(summary.files_checked),
            format_count(summary.total_alerts())
        );

        if summary.total_alerts() > 0 {
            println!(
                "  {} critical, {} warnings, {} notices",
                summary.alerts.critical.to_string().red().bold(),
                summary.alerts.warning.to_string().yellow(),
                summary.alerts.notice
            );
        }

        println!(
            "  Time: {}",
            format_duration(Duration::from_millis(summary.elapsed_ms)).to_string().cyan()
        );
    }
}

/// One line of [`JsonReporter`] output
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonEvent<'a> {
    Alert(&'a Alert),
    Summary(&'a RunSummary),
}

/// Machine-readable reporter writing JSON lines
///
/// Progress samples are not written; only alerts and the final summary are.
pub struct JsonReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonReporter<io::Stdout> {
    /// Reporter writing to standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    /// Reporter writing to `out`
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write_event(&self, event: &JsonEvent<'_>) {
        let mut out = self.out.lock();
        let result = serde_json::to_writer(&mut *out, event)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(out))
            .and_then(|()| out.flush());
        if let Err(e) = result {
            warn!("Failed to write JSON event: {}", e);
        }
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn tick(&self, _info: &ProgressInfo, alerts: &[Alert]) {
        for alert in alerts {
            self.write_event(&JsonEvent::Alert(alert));
        }
    }

    fn finished(&self, summary: &RunSummary) {
        self.write_event(&JsonEvent::Summary(summary));
    }
}
