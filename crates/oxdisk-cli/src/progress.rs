//! Live progress display while the queue drains.
//!
//! One spinner per running job, fed by the worker's progress statuses. When
//! the job's terminal status arrives the spinner is replaced by a summary line:
//!
//! ```text
//!   ✓ [1/7] seq-write   812.44 MB/s over 5 passes
//!   ⠋ [2/7] seq-read    Pass 3/5: 1904.10 MB/s
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use oxdisk_core::{JobId, Status};
use std::time::Duration;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub struct LiveProgress {
    color: bool,
    total: usize,
    finished: usize,
    current: Option<(JobId, ProgressBar)>,
}

impl LiveProgress {
    pub fn new(total: usize, color: bool) -> Self {
        Self {
            color,
            total,
            finished: 0,
            current: None,
        }
    }

    /// Show a progress status on the running job's spinner.
    pub fn update(&mut self, status: &Status) {
        let position = self.finished + 1;
        let total = self.total;
        let message = format!("[{position}/{total}] {:<11} {}", status.test_type.name(), status.text);
        self.spinner_for(status.job_id).set_message(message);
    }

    /// Replace the job's spinner with its summary line.
    pub fn finish(&mut self, status: &Status) {
        if let Some((_, bar)) = self.current.take() {
            bar.finish_and_clear();
        }
        self.finished += 1;
        println!("{}", status_line(status, self.finished, self.total, self.color));
    }

    /// Note that Ctrl+C discarded the queued jobs.
    pub fn interrupted(&mut self, discarded: usize) {
        self.total = self.total.saturating_sub(discarded);
        let text = format!("Interrupted: {discarded} queued benchmark(s) discarded, finishing current one");
        match &self.current {
            Some((_, bar)) => bar.println(text),
            None => eprintln!("{text}"),
        }
    }

    fn spinner_for(&mut self, job_id: JobId) -> &ProgressBar {
        if self.current.as_ref().is_some_and(|(id, _)| *id != job_id)
            && let Some((_, stale)) = self.current.take()
        {
            stale.finish_and_clear();
        }
        let color = self.color;
        let (_, bar) = self.current.get_or_insert_with(|| (job_id, new_spinner(color)));
        bar
    }
}

impl Drop for LiveProgress {
    fn drop(&mut self) {
        if let Some((_, bar)) = self.current.take() {
            bar.finish_and_clear();
        }
    }
}

fn new_spinner(color: bool) -> ProgressBar {
    let template = if color { "  {spinner:.cyan} {msg}" } else { "  {spinner} {msg}" };
    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);
    let bar = ProgressBar::new_spinner();
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Summary line for a finished job.
pub fn status_line(status: &Status, position: usize, total: usize, color: bool) -> String {
    let name = format!("{:<11}", status.test_type.name());
    let counter = format!("[{position}/{total}]");
    if color {
        if status.success {
            format!("  {} {} {} {}", "✓".green(), counter.dimmed(), name.bold(), status.text)
        } else {
            format!("  {} {} {} {}", "✗".red(), counter.dimmed(), name.bold(), status.text.red())
        }
    } else {
        let mark = if status.success { "✓" } else { "✗" };
        format!("  {mark} {counter} {name} {}", status.text)
    }
}
