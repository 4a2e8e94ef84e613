//! Per-section spinners drawn on stderr while a search runs.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::VecDeque;
use std::time::Duration;

/// One spinner per pending section, cleared as each section is printed.
///
/// Sections are printed in their configured order, so the oldest spinner
/// always belongs to the next section to arrive.
pub struct SectionProgress {
    multi: MultiProgress,
    pending: VecDeque<ProgressBar>,
}

impl SectionProgress {
    /// Start a spinner for every title. Nothing is drawn unless `visible`.
    pub fn new<'a>(titles: impl IntoIterator<Item = &'a str>, visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let multi = MultiProgress::with_draw_target(target);
        let pending = titles
            .into_iter()
            .map(|title| multi.add(create_spinner(&format!("Searching {title}"), visible)))
            .collect();
        Self { multi, pending }
    }

    /// Clear the oldest spinner and run `print` while the rest are hidden.
    pub fn complete<R>(&mut self, print: impl FnOnce() -> R) -> R {
        if let Some(spinner) = self.pending.pop_front() {
            spinner.finish_and_clear();
        }
        self.multi.suspend(print)
    }

    /// Spinners still running.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether the spinners are drawn at all.
    pub fn is_hidden(&self) -> bool {
        self.multi.is_hidden()
    }
}

impl Drop for SectionProgress {
    fn drop(&mut self) {
        for spinner in self.pending.drain(..) {
            spinner.finish_and_clear();
        }
    }
}

fn create_spinner(message: &str, animate: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("static template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    if animate {
        pb.enable_steady_tick(Duration::from_millis(80));
    }
    pb
}
