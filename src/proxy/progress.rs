//! Run counters and live progress rendering

use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::warn;

/// Reporters currently owning a terminal line
static LIVE_STATUS_LINES: AtomicUsize = AtomicUsize::new(0);

const VALID_SHIFT: u32 = 32;
const INVALID_MASK: u64 = u32::MAX as u64;

/// Counters for one run.
///
/// `valid` and `invalid` share a single atomic word (valid in the high half),
/// so every snapshot is taken with one load and can never be torn.
/// `processed` is derived as `valid + invalid`.
#[derive(Debug)]
pub struct RunCounters {
    total: u64,
    outcomes: AtomicU64,
}

/// Point-in-time copy of [`RunCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub processed: u64,
    pub valid: u64,
    pub invalid: u64,
}

impl RunCounters {
    pub fn new(total: usize) -> Self {
        Self {
            total: total as u64,
            outcomes: AtomicU64::new(0),
        }
    }

    pub fn record_valid(&self) {
        self.outcomes.fetch_add(1 << VALID_SHIFT, Ordering::AcqRel);
    }

    pub fn record_invalid(&self) {
        self.outcomes.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record(&self, succeeded: bool) {
        if succeeded {
            self.record_valid();
        } else {
            self.record_invalid();
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let word = self.outcomes.load(Ordering::Acquire);
        let valid = word >> VALID_SHIFT;
        let invalid = word & INVALID_MASK;
        ProgressSnapshot {
            total: self.total,
            processed: valid + invalid,
            valid,
            invalid,
        }
    }
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }

    /// Final line printed once the run is over
    pub fn summary_line(&self) -> String {
        format!(
            "Done. Total: {} | Valid: {} | Invalid: {}",
            self.total, self.valid, self.invalid
        )
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percentage = if self.total > 0 {
            self.processed * 100 / self.total
        } else {
            100
        };
        write!(
            f,
            "Checking... {}% ({}/{}) | Valid: {} / Invalid: {}",
            percentage, self.processed, self.total, self.valid, self.invalid
        )
    }
}

/// Periodically redraws a one-line status from a [`RunCounters`]
pub struct ProgressReporter {
    counters: Arc<RunCounters>,
    interval: Duration,
}

/// Handle to a running reporter; [`ProgressHandle::finish`] stops it
pub struct ProgressHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<ProgressSnapshot>,
}

impl ProgressReporter {
    pub fn new(counters: Arc<RunCounters>, interval: Duration) -> Self {
        Self { counters, interval }
    }

    /// Start rendering to `out` on a background task.
    ///
    /// The task only reads snapshots; it never holds anything the workers need.
    pub fn spawn<W>(self, mut out: W) -> ProgressHandle
    where
        W: Write + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let live = LiveLine::acquire();
        let task = tokio::spawn(async move {
            let _live = live;
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let snapshot = self.counters.snapshot();
                        if let Err(e) = render_line(&mut out, &snapshot.to_string()) {
                            warn!("Failed to render progress: {}", e);
                        }
                    }
                }
            }

            let snapshot = self.counters.snapshot();
            if let Err(e) = render_line(&mut out, &snapshot.summary_line())
                .and_then(|_| writeln!(out))
                .and_then(|_| out.flush())
            {
                warn!("Failed to render summary: {}", e);
            }
            snapshot
        });

        ProgressHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

impl ProgressHandle {
    /// Stop rendering, print the summary line and return the final snapshot
    pub async fn finish(mut self) -> Option<ProgressSnapshot> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.ok()
    }
}

/// Whether a reporter is drawing a status line right now
pub fn status_line_live() -> bool {
    LIVE_STATUS_LINES.load(Ordering::Acquire) > 0
}

/// Wipe the current terminal line so the next write starts at column 0.
/// The reporter redraws its status on the following tick.
pub fn clear_status_line<W: Write>(out: &mut W) -> std::io::Result<()> {
    queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    out.flush()
}

/// Marks a status line as live until dropped
struct LiveLine;

impl LiveLine {
    fn acquire() -> Self {
        LIVE_STATUS_LINES.fetch_add(1, Ordering::AcqRel);
        LiveLine
    }
}

impl Drop for LiveLine {
    fn drop(&mut self) {
        LIVE_STATUS_LINES.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Overwrite the current terminal line
fn render_line<W: Write>(out: &mut W, line: &str) -> std::io::Result<()> {
    queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line))?;
    out.flush()
}
