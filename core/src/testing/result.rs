use std::time::Duration;

use serde::{Serialize, Serializer};

use super::testcase::Testcase;
use crate::{error::ExecutionError, judge::JudgeStatus};

/// The judged result of running one testcase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub status: JudgeStatus,
    pub testcase: Testcase,
    #[serde(serialize_with = "serialize_lossy")]
    pub output: Vec<u8>,
    #[serde(serialize_with = "serialize_lossy")]
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub peak_memory_mb: Option<f64>,
}

impl RunOutcome {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// A testcase that could not be judged at all.
#[derive(Debug, thiserror::Error)]
#[error("{name}: {error}", name = .testcase.name())]
pub struct CaseError {
    pub testcase: Testcase,
    #[source]
    pub error: ExecutionError,
}

pub type CaseResult = Result<RunOutcome, CaseError>;

pub trait CaseResultExt {
    fn testcase(&self) -> &Testcase;
    fn status(&self) -> Option<JudgeStatus>;
}

impl CaseResultExt for CaseResult {
    fn testcase(&self) -> &Testcase {
        match self {
            Ok(outcome) => &outcome.testcase,
            Err(e) => &e.testcase,
        }
    }

    fn status(&self) -> Option<JudgeStatus> {
        self.as_ref().ok().map(|outcome| outcome.status)
    }
}

fn serialize_lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

fn serialize_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64() * 1000.0)
}
