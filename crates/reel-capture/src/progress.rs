//! Capture progress reporting.

use indicatif::{ProgressBar, ProgressStyle};

/// Observer of frame-loop progress.
pub trait ProgressReporter: Send + Sync {
    /// The frame loop is about to start.
    fn started(&self, total: u32);
    /// `done` of `total` frames have been written.
    fn advanced(&self, done: u32, total: u32);
    /// The frame loop ended, successfully or not.
    fn finished(&self);
}

/// Reporter that does nothing, for non-interactive runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn started(&self, _total: u32) {}
    fn advanced(&self, _done: u32, _total: u32) {}
    fn finished(&self) {}
}

/// Terminal progress bar: `[####----] 42% (42/100)`.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    /// Create a hidden bar; it is sized and shown on [`ProgressReporter::started`].
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::with_template("[{bar:40}] {percent:>3}% ({pos}/{len})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#-");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarReporter {
    fn started(&self, total: u32) {
        self.bar.set_length(u64::from(total));
        self.bar.set_position(0);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn advanced(&self, done: u32, _total: u32) {
        self.bar.set_position(u64::from(done));
    }

    fn finished(&self) {
        self.bar.finish();
    }
}
