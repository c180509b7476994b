use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::{command::CommandRunner, error::SwitchError};

/// Checks that the process may mutate host network settings.
#[async_trait]
pub trait Guard: Send + Sync {
	async fn ensure_elevated(&self) -> Result<(), SwitchError>;
}

/// Checks the real privileges of the current process.
///
/// On Unix this is an effective uid of 0. On Windows, `net session` only
/// succeeds from an elevated token.
pub struct SystemGuard {
	#[cfg_attr(not(windows), allow(dead_code))]
	runner: Arc<dyn CommandRunner>,
}

impl SystemGuard {
	pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
		Self { runner }
	}
}

#[async_trait]
impl Guard for SystemGuard {
	#[cfg(unix)]
	async fn ensure_elevated(&self) -> Result<(), SwitchError> {
		// SAFETY: geteuid has no preconditions and cannot fail
		let euid = unsafe { libc::geteuid() };
		debug!("effective uid {}", euid);
		if euid == 0 {
			Ok(())
		} else {
			Err(SwitchError::PermissionDenied(
				"run as root (for example with sudo)".into(),
			))
		}
	}

	#[cfg(windows)]
	async fn ensure_elevated(&self) -> Result<(), SwitchError> {
		let out = self
			.runner
			.run("net", &crate::command::args(["session"]))
			.await?;
		debug!("net session returned {:?}", out.status);
		if out.success() {
			Ok(())
		} else {
			Err(SwitchError::PermissionDenied(
				"run from an Administrator prompt".into(),
			))
		}
	}

	#[cfg(not(any(unix, windows)))]
	async fn ensure_elevated(&self) -> Result<(), SwitchError> {
		Err(SwitchError::Unsupported(std::env::consts::OS.into()))
	}
}
