use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::mpsc;

use super::{
    meter::ResourceMeter,
    result::{CaseError, CaseResult, RunOutcome},
    runner::{RunInput, TestCommand, TestRunner},
    testcase::Testcase,
};
use crate::{
    compare::{self, Comparator},
    error::{ConfigError, ExecutionError},
    judge,
};

/// Limits shared by every testcase of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Limits {
    pub time_limit: Option<Duration>,
    pub memory_limit_mb: Option<f64>,
    pub tolerance: Option<f64>,
}

impl Limits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tl) = self.time_limit {
            if tl.is_zero() {
                return Err(ConfigError::InvalidTimeLimit(0.0));
            }
        }
        if let Some(ml) = self.memory_limit_mb {
            if !(ml.is_finite() && ml > 0.0) {
                return Err(ConfigError::InvalidMemoryLimit(ml));
            }
        }
        if let Some(tol) = self.tolerance {
            compare::validate_tolerance(tol)?;
        }
        Ok(())
    }
}

/// Receives progress of a batch.
///
/// Called only from the task that awaits [`Orchestrator::run`],
/// never from the workers.
pub trait Observer {
    fn on_start(&mut self, _testcase: &Testcase) {}
    fn on_finish(&mut self, _result: &CaseResult) {}
}

impl Observer for () {}

#[derive(Debug)]
enum Event {
    Started(usize),
    Finished(usize, CaseResult),
}

#[derive(Debug)]
struct Judge {
    runner: TestRunner,
    comparator: Comparator,
    memory_limit_mb: Option<f64>,
}

/// Runs a batch of testcases and judges each of them.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    judge: Arc<Judge>,
    concurrency: Option<NonZeroUsize>,
}

impl Orchestrator {
    /// Fails if a memory limit is set but memory cannot be measured with `time_command`.
    /// `time_command = None` disables memory measurement.
    pub async fn new(
        command: TestCommand,
        comparator: Comparator,
        limits: &Limits,
        time_command: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        limits.validate()?;

        let meter = match time_command {
            Some(path) => ResourceMeter::probe(path).await,
            None => None,
        };
        if limits.memory_limit_mb.is_some() && meter.is_none() {
            let path = time_command.map_or_else(PathBuf::new, Path::to_path_buf);
            return Err(ConfigError::MemoryMeasurementUnavailable(path));
        }

        let runner = TestRunner::new(command)
            .time_limit(limits.time_limit)
            .resource_meter(meter);
        Ok(Self {
            judge: Arc::new(Judge {
                runner,
                comparator,
                memory_limit_mb: limits.memory_limit_mb,
            }),
            concurrency: None,
        })
    }

    /// `None` runs testcases one by one.
    pub fn concurrency(mut self, k: Option<NonZeroUsize>) -> Self {
        self.concurrency = k;
        self
    }

    pub fn runner(&self) -> &TestRunner {
        &self.judge.runner
    }

    pub fn comparator(&self) -> &Comparator {
        &self.judge.comparator
    }

    /// Judges all of `testcases`; the results are sorted by testcase name.
    pub async fn run(
        &self,
        mut testcases: Vec<Testcase>,
        observer: &mut impl Observer,
    ) -> Vec<CaseResult> {
        testcases.sort_by(|a, b| a.name().cmp(b.name()));

        match self.concurrency {
            Some(k) if testcases.len() > 1 => self.run_parallel(testcases, k, observer).await,
            _ => self.run_sequential(testcases, observer).await,
        }
    }

    async fn run_sequential(
        &self,
        testcases: Vec<Testcase>,
        observer: &mut impl Observer,
    ) -> Vec<CaseResult> {
        let mut results = Vec::with_capacity(testcases.len());
        for t in &testcases {
            observer.on_start(t);
            let res = self.judge.judge(t).await;
            observer.on_finish(&res);
            results.push(res);
        }
        results
    }

    async fn run_parallel(
        &self,
        testcases: Vec<Testcase>,
        k: NonZeroUsize,
        observer: &mut impl Observer,
    ) -> Vec<CaseResult> {
        let testcases: Arc<[Testcase]> = testcases.into();
        let next = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let num_workers = k.get().min(testcases.len());
        log::debug!("Spawning {} workers", num_workers);

        let mut workers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let judge = self.judge.clone();
            let testcases = testcases.clone();
            let next = next.clone();
            let tx = tx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(t) = testcases.get(i) else {
                        break
                    };
                    if tx.send(Event::Started(i)).is_err() {
                        break;
                    }
                    let res = judge.judge(t).await;
                    if tx.send(Event::Finished(i, res)).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let mut results: Vec<Option<CaseResult>> = std::iter::repeat_with(|| None)
            .take(testcases.len())
            .collect();
        while let Some(event) = rx.recv().await {
            match event {
                Event::Started(i) => observer.on_start(&testcases[i]),
                Event::Finished(i, res) => {
                    observer.on_finish(&res);
                    results[i] = Some(res);
                }
            }
        }

        for w in workers {
            if let Err(e) = w.await {
                log::error!("Worker terminated abnormally: {}", e);
            }
        }

        results.into_iter().flatten().collect()
    }
}

impl Judge {
    async fn judge(&self, testcase: &Testcase) -> CaseResult {
        log::debug!("Running testcase '{}'", testcase.name());
        let res = self.try_judge(testcase).await.map_err(|error| CaseError {
            testcase: testcase.clone(),
            error,
        });
        match &res {
            Ok(outcome) => log::debug!(
                "Testcase '{}': {} [{:.0}ms]",
                testcase.name(),
                outcome.status,
                outcome.elapsed_ms()
            ),
            Err(e) => log::debug!("{}", e),
        }
        res
    }

    async fn try_judge(&self, testcase: &Testcase) -> Result<RunOutcome, ExecutionError> {
        let exec = self
            .runner
            .run(RunInput::File(testcase.input_path()))
            .await?;

        let comparison = match exec.exit_code {
            Some(0) => self.check_output(testcase, &exec.stdout).await?,
            _ => None,
        };
        let status = judge::classify(
            exec.exit_code,
            exec.peak_memory_mb,
            self.memory_limit_mb,
            comparison,
        );

        Ok(RunOutcome {
            status,
            testcase: testcase.clone(),
            output: exec.stdout,
            stderr: exec.stderr,
            exit_code: exec.exit_code,
            elapsed: exec.elapsed,
            peak_memory_mb: exec.peak_memory_mb,
        })
    }

    /// `None` if there is nothing to compare against.
    async fn check_output(
        &self,
        testcase: &Testcase,
        actual: &[u8],
    ) -> Result<Option<bool>, ExecutionError> {
        if let Comparator::SpecialJudge(checker) = &self.comparator {
            let ok = checker
                .check(testcase.input_path(), actual, testcase.expected_output_path())
                .await?;
            return Ok(Some(ok));
        }

        let Some(path) = testcase.expected_output_path() else {
            return Ok(None)
        };
        let expected = tokio::fs::read(path)
            .await
            .map_err(|e| ExecutionError::ReadExpected(path.to_owned(), e))?;
        Ok(Some(self.comparator.compare(actual, &expected)))
    }
}
