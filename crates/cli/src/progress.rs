//! Terminal spinner for source tarball extraction.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use bootkit_tools_archive::ProgressFn;

const TEMPLATE: &str = "{spinner} {msg} [{elapsed}]";

/// Spinner updated from the extraction thread.
#[derive(Debug, Clone)]
pub struct ExtractionSpinner {
    bar: ProgressBar,
}

impl ExtractionSpinner {
    /// A visible spinner on stderr, or a hidden one when `quiet`.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        if quiet {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
            bar.set_style(style);
        }
        Self { bar }
    }

    /// Callback for [`bootkit_tools_archive::ArchiveFetcher::with_progress`].
    #[must_use]
    pub fn callback(&self) -> ProgressFn {
        let bar = self.bar.clone();
        Arc::new(move |entries: u64| {
            if bar.is_hidden() {
                return;
            }
            if bar.message().is_empty() {
                bar.enable_steady_tick(Duration::from_millis(120));
            }
            bar.set_message(format!("{entries} files extracted"));
        })
    }

    /// Remove the spinner from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_spinner_ignores_updates() {
        let spinner = ExtractionSpinner::new(true);
        let callback = spinner.callback();
        callback(5000);
        assert!(spinner.bar.message().is_empty());
        spinner.finish();
    }
}
