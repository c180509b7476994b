use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::reply::OperationResult;

#[derive(Debug, Error)]
pub enum SwitchError {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error("administrative privileges required: {0}")]
	PermissionDenied(String),

	#[error("config source {path}: {reason}")]
	ConfigSource { path: PathBuf, reason: String },

	#[error("could not apply DNS to {interface}: {reason}")]
	Apply { interface: String, reason: String },

	#[error("could not flush DNS cache: {0}")]
	Flush(String),

	#[error("a snapshot already exists at {0}")]
	SnapshotExists(PathBuf),

	#[error("nothing to restore")]
	NotFound,

	#[error("snapshot store {path}: {reason}")]
	Store { path: PathBuf, reason: String },

	#[error("command not found: {0}")]
	MissingTool(String),

	#[error("{program} timed out after {after:?}")]
	Timeout { program: String, after: Duration },

	#[error("{program} failed ({status}): {stderr}")]
	Command {
		program: String,
		status: String,
		stderr: String,
	},

	#[error("invalid IPv4 address: {0:?}")]
	InvalidAddress(String),

	#[error("invalid settings in {path}: {err}")]
	Settings {
		path: PathBuf,
		#[source]
		err: serde_json::Error,
	},

	#[error("unknown log level: {0:?}")]
	InvalidLogLevel(String),

	#[error("cannot install logger: {0}")]
	Logger(#[from] log::SetLoggerError),

	#[error("unsupported platform: {0}")]
	Unsupported(String),
}

impl SwitchError {
	/// Folds any error into a failed operation result.
	///
	/// This is the boundary between the orchestrator and its callers: nothing
	/// past it sees a `SwitchError`.
	pub fn into_reply(self) -> OperationResult {
		match self {
			Self::NotFound => OperationResult::failure("nothing to restore"),
			e => OperationResult::failure(e.to_string()),
		}
	}

	pub(crate) fn apply(interface: impl Into<String>, reason: impl ToString) -> Self {
		Self::Apply {
			interface: interface.into(),
			reason: reason.to_string(),
		}
	}

	pub(crate) fn store(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
		Self::Store {
			path: path.into(),
			reason: reason.to_string(),
		}
	}
}
