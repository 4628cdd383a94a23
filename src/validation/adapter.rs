//! Subprocess adapter for the concerto CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::outcome::{ValidationMode, ValidationOutcome, ValidatorError};

/// Exit status shells use for "command not found"
const EXIT_NOT_FOUND: i32 = 127;

/// Anything that can check model source text
#[async_trait]
pub trait Validator: Send + Sync {
    /// Run one check over `source`. Content errors come back as an `Ok`
    /// outcome; only infrastructure failures are `Err`.
    async fn validate(&self, source: &str, mode: &ValidationMode) -> Result<ValidationOutcome, ValidatorError>;

    /// Short name for logs
    fn name(&self) -> &str {
        "validator"
    }
}

/// How to invoke the validator executable
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Executable to run
    pub program: String,
    /// Arguments placed before the subcommand
    pub args: Vec<String>,
    /// Working directory for the process; inherits ours when unset
    pub working_dir: Option<PathBuf>,
    /// Wall-clock bound for one invocation
    pub timeout: Duration,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec!["concerto".to_string()],
            working_dir: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CliConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            ..Default::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Printable form of the base command
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Validator backed by the `concerto` command line tool
#[derive(Debug, Clone, Default)]
pub struct ConcertoCli {
    config: CliConfig,
}

impl ConcertoCli {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Validate a model file that already exists on disk
    pub async fn validate_file(&self, path: &Path, mode: &ValidationMode) -> Result<ValidationOutcome, ValidatorError> {
        if !path.is_file() {
            return Err(ValidatorError::Environment(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        self.run_on(path, mode).await
    }

    /// Report the tool's version string
    pub async fn version(&self) -> Result<String, ValidatorError> {
        let output = self.execute(&["--version".to_string()]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            Ok(String::from_utf8_lossy(&output.stderr).trim().to_string())
        } else {
            Ok(stdout)
        }
    }

    async fn run_on(&self, model: &Path, mode: &ValidationMode) -> Result<ValidationOutcome, ValidatorError> {
        let model_arg = model.display().to_string();

        // Held until the process finishes so compile output lands somewhere disposable
        let mut output_dir = None;

        let args = match mode {
            ValidationMode::Parse => vec!["parse".to_string(), "--model".to_string(), model_arg],
            ValidationMode::Compile { target } => {
                let dir = tempfile::Builder::new()
                    .prefix("accordo-out-")
                    .tempdir()
                    .map_err(|e| ValidatorError::Environment(format!("cannot create output directory: {}", e)))?;
                let args = vec![
                    "compile".to_string(),
                    "--model".to_string(),
                    model_arg,
                    "--target".to_string(),
                    target.clone(),
                    "--output".to_string(),
                    dir.path().display().to_string(),
                ];
                output_dir = Some(dir);
                args
            }
        };

        let output = self.execute(&args).await?;
        let exit_code = output.status.code();
        let artifact_produced = output_dir.as_ref().is_some_and(|dir| has_entries(dir.path()));

        if exit_code == Some(EXIT_NOT_FOUND) {
            return Err(ValidatorError::Environment(format!(
                "'{}' exited with {}: {}",
                self.config.command_line(),
                EXIT_NOT_FOUND,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(ValidationOutcome::from_output(
            mode.clone(),
            exit_code,
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        )
        .with_artifact(artifact_produced))
    }

    async fn execute(&self, extra: &[String]) -> Result<std::process::Output, ValidatorError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Running validator: {} {}", self.config.command_line(), extra.join(" "));

        let child = cmd.spawn().map_err(|e| {
            ValidatorError::Environment(format!("failed to start '{}': {}", self.config.command_line(), e))
        })?;
        let pid = child.id();

        match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ValidatorError::Environment(format!("failed waiting for validator: {}", e))),
            Err(_) => {
                kill_process_group(pid);
                warn!(
                    "[validator-timeout] '{}' exceeded {:?}, process group killed",
                    self.config.command_line(),
                    self.config.timeout
                );
                Err(ValidatorError::Timeout(self.config.timeout))
            }
        }
    }
}

#[async_trait]
impl Validator for ConcertoCli {
    async fn validate(&self, source: &str, mode: &ValidationMode) -> Result<ValidationOutcome, ValidatorError> {
        let temp = tempfile::Builder::new()
            .prefix("accordo-")
            .suffix(".cto")
            .tempfile()
            .map_err(|e| ValidatorError::Environment(format!("cannot create temp model file: {}", e)))?;

        let mut file = tokio::fs::File::create(temp.path())
            .await
            .map_err(|e| ValidatorError::Environment(format!("cannot open temp model file: {}", e)))?;
        file.write_all(source.as_bytes())
            .await
            .map_err(|e| ValidatorError::Environment(format!("cannot write temp model file: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| ValidatorError::Environment(format!("cannot write temp model file: {}", e)))?;
        drop(file);

        self.run_on(temp.path(), mode).await
    }

    fn name(&self) -> &str {
        "concerto"
    }
}

/// Whether compile left anything in its output directory
fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut entries| entries.next().is_some()).unwrap_or(false)
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let Ok(pgid) = i32::try_from(pid) else { return };

    // The child leads its own group, so this cannot reach our process
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
