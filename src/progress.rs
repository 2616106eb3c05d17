//! Progress reporting on stderr using indicatif.
//!
//! The run has three sequential phases, each shown as one spinner:
//!
//! - `walking`: files registered so far
//! - `matching`: digests computed so far and bytes read
//! - `linking`: duplicate groups processed so far
//!
//! With `--quiet` nothing is drawn.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::actions::link::{BatchLinkResult, LinkOutcome, LinkProgressCallback};

/// Progress callback for the phases of a run.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase ("walking", "matching", "linking")
    /// * `total` - Number of items known up front, 0 if unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Items processed so far in this phase
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called after bytes were read for an item.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Spinner-based progress reporter.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    phase: Mutex<String>,
    bytes: AtomicU64,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupelink::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            phase: Mutex::new(String::new()),
            bytes: AtomicU64::new(0),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix} [{elapsed_precise}] {pos} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref bar) = *guard {
                f(bar);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        if self.quiet {
            return;
        }

        let label = match phase {
            "walking" => "Walking",
            "matching" => "Matching",
            "linking" => "Linking",
            other => other,
        };
        let bar = ProgressBar::new_spinner();
        bar.set_style(Self::style());
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        self.bytes.store(0, Ordering::Relaxed);
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.to_string();
        }
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        let bytes = self.bytes.load(Ordering::Relaxed);
        let message = if bytes > 0 {
            format!("({}) {}", ByteSize(bytes), truncate_path(path, 40))
        } else {
            truncate_path(path, 40)
        };
        self.with_bar(|bar| {
            bar.set_position(current as u64);
            bar.set_message(message);
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        let is_current = self.phase.lock().is_ok_and(|current| *current == phase);
        if !is_current {
            return;
        }
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl LinkProgressCallback for Progress {
    fn on_group(&self, original: &Path, index: usize) {
        self.on_progress(index + 1, original.to_string_lossy().as_ref());
    }

    fn on_link_success(&self, _duplicate: &Path, _outcome: LinkOutcome) {}

    fn on_link_failure(&self, _duplicate: &Path, _error: &str) {}

    fn on_complete(&self, _result: &BatchLinkResult) {
        self.on_phase_end("linking");
    }
}

/// Truncate a path for display in the spinner line.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
