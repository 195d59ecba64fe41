use std::{
    ffi::OsString,
    fmt, io,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use nix::{
    errno::Errno,
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::Command,
};

use super::meter::ResourceMeter;
use crate::error::ExecutionError;

/// A program and its arguments. Run directly, without a shell in between,
/// unless built with [`TestCommand::shell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl TestCommand {
    pub const DEFAULT_SHELL: &'static str = "/bin/sh";

    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `<shell> -c <script>`
    pub fn shell(shell: impl Into<OsString>, script: &str) -> Self {
        Self::new(shell).arg("-c").arg(script)
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for TestCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RunInput<'a> {
    File(&'a Path),
    Bytes(&'a [u8]),
}

/// What happened to one process.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// `None` if killed by the time limit.
    /// A process terminated by a signal reports the negated signal number.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Wall time from spawn until exit, or until it was killed.
    pub elapsed: Duration,
    pub peak_memory_mb: Option<f64>,
}

impl Execution {
    pub fn is_timed_out(&self) -> bool {
        self.exit_code.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct TestRunner {
    cmd: TestCommand,
    time_limit: Option<Duration>,
    meter: Option<ResourceMeter>,
}

impl TestRunner {
    pub fn new(cmd: TestCommand) -> Self {
        Self {
            cmd,
            time_limit: None,
            meter: None,
        }
    }

    pub fn time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn resource_meter(mut self, meter: Option<ResourceMeter>) -> Self {
        self.meter = meter;
        self
    }

    pub fn get_command(&self) -> &TestCommand {
        &self.cmd
    }

    pub fn get_time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    pub fn is_measuring_memory(&self) -> bool {
        self.meter.is_some()
    }

    /// Runs the command once with `input` as stdin.
    ///
    /// stdout and stderr are captured separately; only stdout is meant to be judged.
    /// The child runs in its own process group, which is killed as a whole on timeout.
    pub async fn run(&self, input: RunInput<'_>) -> Result<Execution, ExecutionError> {
        let report = match self.meter {
            Some(_) => Some(tempfile::NamedTempFile::new().map_err(ExecutionError::TempFile)?),
            None => None,
        };
        let mut command = match (&self.meter, &report) {
            (Some(meter), Some(report)) => {
                meter.wrap(self.cmd.program(), self.cmd.get_args(), report.path())
            }
            _ => self.cmd.to_command(),
        };

        let stdin = match input {
            RunInput::File(path) => tokio::fs::File::open(path)
                .await
                .map_err(|e| ExecutionError::OpenInput(path.to_owned(), e))?
                .into_std()
                .await
                .into(),
            RunInput::Bytes(_) => Stdio::piped(),
        };

        let start_at = tokio::time::Instant::now();

        let mut proc = command
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::Spawn {
                command: self.cmd.to_string(),
                source: e,
            })?;
        let pid = proc.id();

        let missing_pipe = |name: &str| {
            ExecutionError::Communicate(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("Failed to open {}", name),
            ))
        };
        let stdin = proc.stdin.take();
        let mut stdout = proc.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let mut stderr = proc.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let res = {
            let fut_stdin = self::feed_stdin(stdin, input);
            let fut_stdout = stdout.read_to_end(&mut stdout_buf);
            let fut_stderr = stderr.read_to_end(&mut stderr_buf);
            let fut_exit_status = proc.wait();
            let fut = async {
                tokio::try_join!(fut_stdin, fut_stdout, fut_stderr, fut_exit_status)
                    .map(|(_, _, _, exit_status)| exit_status)
            };
            match self.time_limit {
                Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
                None => Some(fut.await),
            }
        };

        let exit_status = match res {
            Some(Ok(exit_status)) => Some(exit_status),
            Some(Err(e)) => {
                self::kill_process_group(pid);
                return Err(ExecutionError::Communicate(e));
            }
            None => {
                self::kill_process_group(pid);
                if let Err(e) = proc.wait().await {
                    log::warn!("Failed to wait killed process: {:#}", e);
                }
                None
            }
        };
        let elapsed = start_at.elapsed();

        let usage = match (&report, exit_status) {
            (Some(report), Some(_)) => ResourceMeter::read_report(report.path()).await,
            _ => None,
        };
        // Under the meter, the status is that of GNU time.
        let exit_code = exit_status.map(|status| {
            match usage.and_then(|u| u.terminated_by_signal) {
                Some(sig) => -sig,
                None => self::exit_code(status),
            }
        });

        Ok(Execution {
            exit_code,
            stdout: stdout_buf,
            stderr: stderr_buf,
            elapsed,
            peak_memory_mb: usage.map(|u| u.peak_memory_mb),
        })
    }
}

async fn feed_stdin(
    stdin: Option<tokio::process::ChildStdin>,
    input: RunInput<'_>,
) -> io::Result<()> {
    let (Some(mut stdin), RunInput::Bytes(data)) = (stdin, input) else {
        return Ok(())
    };
    match stdin.write_all(data).await {
        // The program does not have to read all of its input.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        res => res,
    }
    // stdin is dropped here, which sends EOF
}

fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => (),
        Err(e) => log::warn!("Failed to kill process group {}: {}", pid, e),
    }
}
