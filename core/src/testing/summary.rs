use std::collections::BTreeMap;

use strum::IntoEnumIterator;

use super::result::{CaseResult, RunOutcome};
use crate::judge::JudgeStatus;

/// Aggregates over the results of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary<'a> {
    counts: BTreeMap<JudgeStatus, usize>,
    num_errors: usize,
    slowest: Option<&'a RunOutcome>,
    max_memory: Option<&'a RunOutcome>,
}

impl<'a> Summary<'a> {
    pub fn new(results: &'a [CaseResult]) -> Self {
        let mut counts: BTreeMap<_, _> = JudgeStatus::iter().map(|j| (j, 0)).collect();
        let mut num_errors = 0;
        let mut slowest: Option<&RunOutcome> = None;
        let mut max_memory: Option<&RunOutcome> = None;

        for res in results {
            let Ok(outcome) = res else {
                num_errors += 1;
                continue
            };
            *counts.entry(outcome.status).or_default() += 1;

            // On ties, the later one wins.
            if slowest.map_or(true, |s| outcome.elapsed >= s.elapsed) {
                slowest = Some(outcome);
            }
            if let Some(mem) = outcome.peak_memory_mb {
                if max_memory
                    .and_then(|m| m.peak_memory_mb)
                    .map_or(true, |max| mem >= max)
                {
                    max_memory = Some(outcome);
                }
            }
        }

        Self {
            counts,
            num_errors,
            slowest,
            max_memory,
        }
    }

    pub fn count(&self, status: JudgeStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    /// Per-status counts in the order AC, WA, RE, TLE, MLE.
    pub fn counts(&self) -> impl Iterator<Item = (JudgeStatus, usize)> + '_ {
        self.counts.iter().map(|(&j, &n)| (j, n))
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum::<usize>() + self.num_errors
    }

    pub fn slowest(&self) -> Option<&'a RunOutcome> {
        self.slowest
    }

    /// `None` if memory was never measured.
    pub fn max_memory(&self) -> Option<&'a RunOutcome> {
        self.max_memory
    }

    /// False for an empty batch.
    pub fn is_all_accepted(&self) -> bool {
        self.total() > 0 && self.count(JudgeStatus::AC) == self.total()
    }
}
