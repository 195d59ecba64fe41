use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::process::Command;

/// Measures peak memory of a process by running it under GNU time.
///
/// GNU time writes `<elapsed seconds>\n<max RSS in KB>` to a report file
/// given by `-o`, so the measured program's own stdout and stderr stay untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMeter {
    time_command: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub elapsed: Duration,
    pub peak_memory_mb: f64,
    /// Set if the measured program was killed by a signal.
    /// GNU time itself then exits with `128 + signal`.
    pub terminated_by_signal: Option<i32>,
}

impl ResourceMeter {
    pub const DEFAULT_TIME_COMMAND: &'static str = "/usr/bin/time";
    const REPORT_FORMAT: &'static str = "%e\n%M";

    /// Runs `true` under `time_command` once and checks the report is readable.
    /// Returns `None` if memory measurement is unavailable.
    pub async fn probe(time_command: impl Into<PathBuf>) -> Option<Self> {
        let meter = Self {
            time_command: time_command.into(),
        };
        match meter.self_test().await {
            Ok(()) => Some(meter),
            Err(e) => {
                log::debug!(
                    "Memory measurement with {:?} is unavailable: {:#}",
                    meter.time_command,
                    e
                );
                None
            }
        }
    }

    async fn self_test(&self) -> anyhow::Result<()> {
        let report = tempfile::NamedTempFile::new()?;
        let status = self
            .wrap(OsStr::new("true"), &[] as &[&str], report.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        anyhow::ensure!(status.success(), "exited with {}", status);
        Self::read_report(report.path())
            .await
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("unparsable report"))
    }

    pub fn time_command(&self) -> &Path {
        &self.time_command
    }

    /// Builds `time -f FORMAT -o REPORT -- PROGRAM ARGS...`.
    pub fn wrap<S: AsRef<OsStr>>(
        &self,
        program: impl AsRef<OsStr>,
        args: &[S],
        report_path: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.time_command);
        cmd.args(["-f", Self::REPORT_FORMAT, "-o"])
            .arg(report_path)
            .arg("--")
            .arg(program)
            .args(args);
        cmd
    }

    pub async fn read_report(path: &Path) -> Option<ResourceUsage> {
        let report = tokio::fs::read_to_string(path).await.ok()?;
        Self::parse_report(&report)
    }

    /// Parses the last two lines of a report.
    /// GNU time may put a line like "Command exited with non-zero status 1" before them.
    pub fn parse_report(report: &str) -> Option<ResourceUsage> {
        let lines: Vec<&str> = report.lines().filter(|l| !l.trim().is_empty()).collect();
        let [header @ .., elapsed, memory] = lines.as_slice() else {
            return None
        };
        let elapsed: f64 = elapsed.trim().parse().ok()?;
        let memory_kb: f64 = memory.trim().parse().ok()?;
        if !elapsed.is_finite() || elapsed < 0.0 || !memory_kb.is_finite() {
            return None;
        }
        let terminated_by_signal = header.iter().find_map(|line| {
            line.trim()
                .strip_prefix("Command terminated by signal ")?
                .parse::<i32>()
                .ok()
        });
        Some(ResourceUsage {
            elapsed: Duration::from_secs_f64(elapsed),
            peak_memory_mb: memory_kb / 1000.0,
            terminated_by_signal,
        })
    }
}
