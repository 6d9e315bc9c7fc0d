//! Shared progress counters and the interval status reporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Entries discovered vs. entries fully processed.
///
/// The only memory shared across pipeline threads outside of channels; both
/// counters are monotonic and touched exclusively through atomic ops.
#[derive(Debug, Default)]
pub(crate) struct Stats {
    discovered: AtomicU64,
    completed: AtomicU64,
}

impl Stats {
    pub(crate) fn inc_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn discovered(&self) -> u64 {
        self.discovered.load(Ordering::Relaxed)
    }

    pub(crate) fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

/// Spawn the status line reporter, sampling `stats` on `interval`.
///
/// Informational only: the thread is detached and runs until the process
/// exits. The returned bar lets the orchestrator clear the line at the end.
pub(crate) fn spawn_reporter(stats: Arc<Stats>, interval: Duration) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let reporter = bar.clone();
    thread::spawn(move || {
        loop {
            reporter.set_message(format!(
                "Progress: {}/{}",
                stats.completed(),
                stats.discovered()
            ));
            reporter.tick();
            thread::sleep(interval);
        }
    });
    bar
}
