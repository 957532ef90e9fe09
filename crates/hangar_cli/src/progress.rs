//! Progress reporting for sync runs.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): one spinner per category plus an overall bar, using indicatif
//! - Logging mode (non-TTY): Structured logging using tracing

mod logging;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use console::Term;
use hangar::sync::{Category, ProgressCallback, SyncProgress};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub use logging::LoggingReporter;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Interactive progress bars for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the engine.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| reporter.handle(event))
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct ProgressState {
    /// Overall bar, one step per category.
    run_bar: Option<ProgressBar>,
    categories: BTreeMap<Category, ProgressBar>,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match event {
            SyncProgress::RunStarted {
                scope, categories, ..
            } => {
                let bar = self.multi.add(ProgressBar::new(categories.len() as u64));
                bar.set_style(Self::bar_style());
                bar.set_prefix(format!("{:14}", "sync"));
                bar.set_message(format!("scope: {scope}"));
                state.run_bar = Some(bar);
            }

            SyncProgress::CategoryStarted { category, source } => {
                let bar = self.category_bar(&mut state, category);
                bar.set_message(format!("Fetching from {source}..."));
            }

            SyncProgress::CategoryFetched {
                category,
                records,
                skipped,
            } => {
                let bar = self.category_bar(&mut state, category);
                let msg = if skipped > 0 {
                    format!("Writing {records} records ({skipped} malformed)...")
                } else {
                    format!("Writing {records} records...")
                };
                bar.set_message(msg);
            }

            SyncProgress::CategoryFinished { category, counts } => {
                let bar = self.category_bar(&mut state, category);
                let mut msg = format!("✓ {} records", counts.records);
                if counts.unmatched > 0 {
                    msg.push_str(&format!(", {} unmatched", counts.unmatched));
                }
                if counts.skipped > 0 {
                    msg.push_str(&format!(", {} skipped", counts.skipped));
                }
                bar.finish_with_message(msg);
                Self::step(&state);
            }

            SyncProgress::CategorySkipped {
                category,
                dependency,
            } => {
                let bar = self.category_bar(&mut state, category);
                bar.finish_with_message(format!("- skipped ({dependency} did not succeed)"));
                Self::step(&state);
            }

            SyncProgress::CategoryFailed {
                category,
                error,
                best_effort,
            } => {
                let bar = self.category_bar(&mut state, category);
                let marker = if best_effort { "!" } else { "✗" };
                bar.finish_with_message(format!("{marker} {error}"));
                Self::step(&state);
            }

            SyncProgress::RunFinished {
                succeeded,
                failed,
                skipped,
                cancelled,
                ..
            } => {
                if let Some(ref bar) = state.run_bar {
                    let mut msg = format!("{succeeded} succeeded, {failed} failed, {skipped} skipped");
                    if cancelled {
                        msg.push_str(" (cancelled)");
                    }
                    bar.finish_with_message(msg);
                }
            }

            _ => {}
        }
    }

    /// Finish any bar still spinning, e.g. after a cancelled run.
    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for bar in state.categories.values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
        if let Some(ref bar) = state.run_bar
            && !bar.is_finished()
        {
            bar.abandon();
        }
    }

    fn category_bar(&self, state: &mut ProgressState, category: Category) -> ProgressBar {
        state
            .categories
            .entry(category)
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::spinner_style());
                bar.set_prefix(format!("{:14}", category.as_str()));
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            })
            .clone()
    }

    fn step(state: &ProgressState) {
        if let Some(ref bar) = state.run_bar {
            bar.inc(1);
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS)
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
