//! Running OS utilities.
//!
//! Every child process the crate spawns goes through a [`CommandRunner`].
//! Platform adapters never call [`std::process`] or [`tokio::process`]
//! themselves, which is what lets them be driven by a scripted runner in
//! tests.

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use log::{debug, info};
use tokio::{process::Command, time::timeout};
use which::which;

use crate::error::SwitchError;

/// Default bound on a single OS command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Captured result of a finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
	/// Exit code, `None` if the process was killed by a signal.
	pub status: Option<i32>,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput {
	/// A successful output with the given stdout.
	pub fn ok(stdout: impl Into<String>) -> Self {
		Self {
			status: Some(0),
			stdout: stdout.into(),
			stderr: String::new(),
		}
	}

	/// A failed output with the given exit code and stderr.
	pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
		Self {
			status: Some(status),
			stdout: String::new(),
			stderr: stderr.into(),
		}
	}

	pub fn success(&self) -> bool {
		self.status == Some(0)
	}

	/// Turns a non-zero exit into [`SwitchError::Command`].
	pub fn check(self, program: &str) -> Result<Self, SwitchError> {
		if self.success() {
			Ok(self)
		} else {
			Err(SwitchError::Command {
				program: program.into(),
				status: self
					.status
					.map_or_else(|| "killed".into(), |c| format!("exit {}", c)),
				stderr: self.diagnostic(),
			})
		}
	}

	/// Whatever the command said about itself, preferring stderr.
	pub fn diagnostic(&self) -> String {
		let err = self.stderr.trim();
		if err.is_empty() {
			self.stdout.trim().into()
		} else {
			err.into()
		}
	}
}

/// Executes external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
	/// Runs `program` with `args` to completion and captures its output.
	///
	/// A non-zero exit is not an error here; callers decide what it means.
	/// Errors are reserved for the program being absent
	/// ([`SwitchError::MissingTool`]), not finishing in time
	/// ([`SwitchError::Timeout`]), or failing to spawn.
	async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, SwitchError>;

	/// Whether `program` can be found at all.
	fn available(&self, program: &str) -> bool;
}

/// Runs commands on the host through tokio, with a timeout.
#[derive(Clone, Debug)]
pub struct SystemRunner {
	timeout: Duration,
}

impl SystemRunner {
	pub fn new(timeout: Duration) -> Self {
		Self { timeout }
	}
}

impl Default for SystemRunner {
	fn default() -> Self {
		Self::new(DEFAULT_TIMEOUT)
	}
}

#[async_trait]
impl CommandRunner for SystemRunner {
	async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, SwitchError> {
		let path = which(program).map_err(|err| {
			debug!("which {}: {}", program, err);
			SwitchError::MissingTool(program.into())
		})?;

		info!("running {} {}", program, args.join(" "));
		let child = Command::new(&path)
			.args(args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()?;

		debug!("awaiting {} (pid {:?})", program, child.id());
		let output = timeout(self.timeout, child.wait_with_output())
			.await
			.map_err(|_| SwitchError::Timeout {
				program: program.into(),
				after: self.timeout,
			})??;

		let output = CommandOutput {
			status: output.status.code(),
			stdout: String::from_utf8_lossy(&output.stdout).into(),
			stderr: String::from_utf8_lossy(&output.stderr).into(),
		};
		debug!(
			"{} returned {:?}; stdout bytes={} stderr bytes={}",
			program,
			output.status,
			output.stdout.len(),
			output.stderr.len()
		);
		Ok(output)
	}

	fn available(&self, program: &str) -> bool {
		which(program).is_ok()
	}
}

/// Builds an owned argument vector from string slices.
pub(crate) fn args<I, S>(parts: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	parts.into_iter().map(Into::into).collect()
}

#[test]
fn test_check_prefers_stderr() {
	let out = CommandOutput {
		status: Some(4),
		stdout: "ignored\n".into(),
		stderr: "  Error: no such device\n".into(),
	};
	let err = out.check("nmcli").unwrap_err();
	assert_eq!(err.to_string(), "nmcli failed (exit 4): Error: no such device");
}

#[test]
fn test_check_passes_success_through() {
	let out = CommandOutput::ok("fine");
	assert_eq!(out.clone().check("ipconfig").unwrap(), out);
}
