// src/progress.rs
//! Spinner shown while a selection runs

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner on stderr; a no-op when disabled
pub struct QuerySpinner {
    spinner: Option<ProgressBar>,
}

impl QuerySpinner {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { spinner: None };
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
            spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner: Some(spinner),
        }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(msg.into());
        }
    }

    /// Stop and clear the spinner
    pub fn finish(&self) {
        if let Some(ref spinner) = self.spinner {
            spinner.finish_and_clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.spinner.is_some()
    }
}

impl Drop for QuerySpinner {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_disabled() {
        let spinner = QuerySpinner::new(false);
        assert!(!spinner.is_enabled());

        spinner.set_message("Selecting");
        spinner.finish();
    }

    #[test]
    fn test_spinner_enabled() {
        let spinner = QuerySpinner::new(true);
        assert!(spinner.is_enabled());

        spinner.set_message("Selecting certificates of CA 52410");
        spinner.finish();
        // Finishing twice is harmless
        drop(spinner);
    }
}
