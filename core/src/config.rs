use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    result::Result as StdResult,
    time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;

use crate::{
    compare::{self, CompareMode, Comparator},
    error::ConfigError,
    testing::{Limits, NamingFormat, ResourceMeter, SpecialJudge, TestCommand},
};

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    #[serde(default)]
    pub test: JudgeConfig,
}

/// Everything needed to judge one batch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JudgeConfig {
    pub shell: PathBuf,
    pub format: String,
    /// One of the [`CompareMode`] names, checked by [`JudgeConfig::validate`].
    pub mode: String,
    pub tolerance: Option<f64>,
    pub time_limit_ms: Option<f64>,
    pub memory_limit_mb: Option<f64>,
    pub jobs: Option<usize>,
    pub time_command: PathBuf,
    pub judge: Option<String>,
    pub measure_memory: bool,
    pub ignore_backup: bool,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            shell: TestCommand::DEFAULT_SHELL.into(),
            format: NamingFormat::DEFAULT.to_owned(),
            mode: CompareMode::default().to_string(),
            tolerance: None,
            time_limit_ms: Some(2000.0),
            memory_limit_mb: None,
            jobs: None,
            time_command: ResourceMeter::DEFAULT_TIME_COMMAND.into(),
            judge: None,
            measure_memory: true,
            ignore_backup: true,
        }
    }
}

impl Config {
    pub const FILENAME: &'static str = "judge.toml";

    pub fn example_toml() -> &'static str {
        include_str!("../assets/judge.toml")
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Loads the nearest config file in `cur_dir` or its ancestors.
    /// Falls back to the defaults if there is none.
    pub fn load(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        match fsutil::find_file_in_ancestors(cur_dir, Self::FILENAME) {
            Some(filepath) => {
                log::debug!("Loading config from {:?}", filepath);
                Self::from_toml_file(filepath)
            }
            None => {
                log::debug!("No '{}' found; using defaults", Self::FILENAME);
                Ok(Self::default())
            }
        }
    }
}

impl JudgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.naming_format()?;
        self.compare_mode()?;
        if let Some(ms) = self.time_limit_ms {
            if !(ms.is_finite() && ms > 0.0) {
                return Err(ConfigError::InvalidTimeLimit(ms));
            }
        }
        if self.jobs == Some(0) {
            return Err(ConfigError::ZeroJobs);
        }
        if self.memory_limit_mb.is_some() && !self.measure_memory {
            return Err(ConfigError::MemoryMeasurementUnavailable(
                self.time_command.clone(),
            ));
        }
        if let Some(tol) = self.tolerance {
            compare::validate_tolerance(tol)?;
        }
        self.limits().validate()
    }

    pub fn naming_format(&self) -> Result<NamingFormat, ConfigError> {
        NamingFormat::parse(&self.format)
    }

    pub fn compare_mode(&self) -> Result<CompareMode, ConfigError> {
        CompareMode::parse(&self.mode)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            time_limit: self
                .time_limit_ms
                .filter(|ms| ms.is_finite() && *ms > 0.0)
                .map(|ms| Duration::from_secs_f64(ms / 1000.0)),
            memory_limit_mb: self.memory_limit_mb,
            tolerance: self.tolerance,
        }
    }

    pub fn concurrency(&self) -> Option<NonZeroUsize> {
        self.jobs.and_then(NonZeroUsize::new)
    }

    /// `None` if memory should not be measured.
    pub fn time_command(&self) -> Option<&Path> {
        self.measure_memory.then_some(self.time_command.as_path())
    }

    /// The special judge takes precedence over the compare mode.
    pub fn comparator(&self) -> Result<Comparator, ConfigError> {
        match &self.judge {
            Some(script) => Ok(Comparator::SpecialJudge(SpecialJudge::shell(
                &self.shell,
                script,
            ))),
            None => self.compare_mode()?.comparator(self.tolerance),
        }
    }

    pub fn test_command(&self, script: &str) -> TestCommand {
        TestCommand::shell(&self.shell, script)
    }
}
