//! Console progress for extraction runs

use indicatif::{ProgressBar, ProgressStyle};

const WINDOW_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} windows [{elapsed_precise}, eta {eta}]";

/// Progress bar counting processed patch windows of one product
pub struct ProgressTracker {
    bar: ProgressBar,
}

impl ProgressTracker {
    /// Visible tracker
    ///
    /// # Arguments
    /// * `windows` - Number of patch windows to process
    /// * `product_name` - Shown next to the bar
    pub fn new(windows: u64, product_name: &str) -> Self {
        let bar = ProgressBar::new(windows);
        let style = ProgressStyle::default_bar()
            .template(WINDOW_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(product_name.to_string());
        ProgressTracker { bar }
    }

    /// Tracker drawing nothing, for library callers and tests
    pub fn hidden() -> Self {
        ProgressTracker { bar: ProgressBar::hidden() }
    }

    pub fn increment(&self, windows: u64) {
        self.bar.inc(windows);
    }

    pub fn finish(&self, written: usize) {
        self.bar.finish_with_message(format!("{} patch(es) written", written));
    }
}
