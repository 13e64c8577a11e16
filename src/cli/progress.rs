//! Progress reporting for batch builds
//!
//! Provides the progress bar shown while `build-all` works through users.

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} users ({percent}%) ETA: {eta} {msg}";

/// Creates a progress bar counting users
pub fn create_progress_bar(total_users: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_users);
    let style = ProgressStyle::default_bar()
        .template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Progress manager for a batch build
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_users: u64, message: &str) -> Self {
        let pb = create_progress_bar(total_users);

        // Print initial message to stderr
        eprintln!("{message}");

        Self { pb }
    }

    /// Record one finished user
    pub fn user_done(&self, user_id: &str) {
        self.pb.set_message(user_id.to_string());
        self.pb.inc(1);
    }

    pub fn finish(&self, built: usize, failed: usize) {
        self.pb
            .finish_with_message(format!("{built} built, {failed} failed"));
    }
}
