use std::{ffi::OsString, path::Path, process::Stdio};

use super::runner::TestCommand;
use crate::error::ExecutionError;

/// An external checker deciding whether an output is accepted.
///
/// Invoked as `<command> <input> <actual> <expected>`, where `<actual>` is a
/// temporary file holding the program's output and `<expected>` is an empty
/// string if the testcase has no expected output. Exit status 0 means accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialJudge {
    command: TestCommand,
}

impl SpecialJudge {
    pub fn new(command: TestCommand) -> Self {
        Self { command }
    }

    /// Runs `script` by `shell`, passing the three paths as positional parameters.
    pub fn shell(shell: impl Into<OsString>, script: &str) -> Self {
        let script = format!("{} \"$@\"", script);
        Self::new(TestCommand::shell(shell, &script).arg("ojudge-checker"))
    }

    pub fn command(&self) -> &TestCommand {
        &self.command
    }

    pub async fn check(
        &self,
        input_path: &Path,
        actual: &[u8],
        expected_path: Option<&Path>,
    ) -> Result<bool, ExecutionError> {
        let actual_file = tempfile::Builder::new()
            .prefix("actual")
            .suffix(".out")
            .tempfile()
            .map_err(ExecutionError::TempFile)?;
        tokio::fs::write(actual_file.path(), actual)
            .await
            .map_err(ExecutionError::TempFile)?;

        let output = self
            .command
            .to_command()
            .arg(input_path)
            .arg(actual_file.path())
            .arg(expected_path.map(Path::as_os_str).unwrap_or_default())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecutionError::SpecialJudge {
                command: self.command.to_string(),
                source: e,
            })?;

        if !output.stderr.is_empty() {
            log::debug!(
                "Special judge for {:?} said: {}",
                input_path,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(output.status.success())
    }
}
