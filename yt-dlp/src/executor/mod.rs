//! A tool for executing commands.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Represents a command executor.
///
/// # Example
///
/// ```rust,no_run
/// # use pawtag_ytdlp::utils;
/// # use std::path::PathBuf;
/// # use std::time::Duration;
/// # use pawtag_ytdlp::executor::Executor;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = Executor {
///     executable_path: PathBuf::from("yt-dlp"),
///     timeout: Duration::from_secs(30),
///     args: utils::to_owned(["--version"]),
/// };
///
/// let output = executor.execute().await?;
/// println!("yt-dlp {}", output.stdout.trim());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Executor {
    /// The path to the command executable.
    pub executable_path: PathBuf,
    /// The timeout for the process.
    pub timeout: Duration,

    /// The arguments to pass to the command.
    pub args: Vec<String>,
}

/// Represents the output of a process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    /// The stdout of the process.
    pub stdout: String,
    /// The stderr of the process.
    pub stderr: String,
    /// The exit code of the process, -1 when killed by a signal.
    pub code: i32,
}

impl ProcessOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// The last non-empty stderr line, which is where 'yt-dlp' puts its `ERROR:` diagnostic.
    pub fn diagnostic(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("no diagnostic output")
    }
}

impl Executor {
    /// Executes the command and returns the output, failing on a non-zero exit code.
    ///
    /// # Errors
    ///
    /// This function will return an error if the command could not be executed, if the process
    /// timed out, or if it exited unsuccessfully.
    pub async fn execute(&self) -> Result<ProcessOutput> {
        let output = self.execute_unchecked().await?;
        if output.success() {
            return Ok(output);
        }

        Err(Error::Command(format!(
            "Process failed with code {}: {}",
            output.code,
            output.diagnostic()
        )))
    }

    /// Executes the command and returns the output whatever the exit code.
    ///
    /// Batched invocations with `--ignore-errors` exit non-zero as soon as one item fails,
    /// while stdout still holds every item that succeeded.
    ///
    /// # Errors
    ///
    /// This function will return an error if the command could not be spawned, or if the
    /// process timed out.
    pub async fn execute_unchecked(&self) -> Result<ProcessOutput> {
        #[cfg(feature = "tracing")]
        tracing::debug!("Executing command: {:?}", self);

        let mut command = tokio::process::Command::new(&self.executable_path);
        command.stdin(std::process::Stdio::null());
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::piped());
        command.kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(0x08000000);
        }

        command.args(&self.args);
        let mut child = command.spawn().map_err(|e| {
            Error::Command(format!(
                "Could not start {}: {}",
                self.executable_path.display(),
                e
            ))
        })?;

        // Both pipes are drained concurrently, a playlist dump easily exceeds the pipe buffer.
        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| Error::Command("Failed to capture stdout".to_string()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| Error::Command("Failed to capture stderr".to_string()))?;

        let stdout_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            tokio::io::copy(&mut tokio::io::BufReader::new(stdout_handle), &mut buffer).await?;
            Ok::<Vec<u8>, std::io::Error>(buffer)
        });

        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            tokio::io::copy(&mut tokio::io::BufReader::new(stderr_handle), &mut buffer).await?;
            Ok::<Vec<u8>, std::io::Error>(buffer)
        });

        let exit_status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(result) => result?,
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Process timed out after {:?}, killing it", self.timeout);

                if let Err(_e) = child.kill().await {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Failed to kill process after timeout: {}", _e);
                }

                return Err(Error::Timeout(self.timeout));
            }
        };

        let stdout = stdout_task.await??;
        let stderr = stderr_task.await??;

        // Titles are user supplied, a stray invalid byte must not fail the whole listing.
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            code: exit_status.code().unwrap_or(-1),
        })
    }
}
