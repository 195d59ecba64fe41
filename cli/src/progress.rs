use std::{collections::HashMap, time::Duration};

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use ojudge_core::testing::{CaseResult, CaseResultExt, Observer, Testcase};

use crate::style;

/// Shows a spinner for each running testcase, replaced by its verdict when finished.
pub struct ProgressReporter {
    container: MultiProgress,
    style: ProgressStyle,
    bars: HashMap<String, ProgressBar>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            container: MultiProgress::new(),
            style: ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            bars: HashMap::new(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for ProgressReporter {
    fn on_start(&mut self, testcase: &Testcase) {
        let bar = self
            .container
            .add(ProgressBar::new_spinner())
            .with_style(self.style.clone())
            .with_message(format!("Testcase {} ...", testcase.name()));
        bar.enable_steady_tick(Duration::from_millis(80));
        self.bars.insert(testcase.name().to_owned(), bar);
    }

    fn on_finish(&mut self, result: &CaseResult) {
        let msg = match result {
            Ok(outcome) => style::outcome_line(outcome).cyan().to_string(),
            Err(e) => style::error_line(e),
        };
        match self.bars.remove(result.testcase().name()) {
            Some(bar) => bar.finish_with_message(msg),
            None => self.container.println(msg).unwrap_or_default(),
        }
    }
}
