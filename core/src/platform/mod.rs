//! Per-OS drivers for the host's DNS settings.
//!
//! Each variant wraps the utilities its OS ships with; the orchestrator only
//! ever sees the [`Platform`] trait. [`detect`] is the single place where the
//! running OS is looked at.

use std::{fmt, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
	command::CommandRunner,
	dns::{Interface, ResolverFlags, ServerList},
	error::SwitchError,
};

pub use linux::{Linux, DEFAULT_RESOLV_CONF, EDIT_WARNING};
pub use macos::Macos;
pub use windows::Windows;

mod linux;
mod macos;
mod windows;

/// Which platform variant is in use.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
	Windows,
	Linux,
	Macos,
}

impl fmt::Display for PlatformKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Windows => "windows",
			Self::Linux => "linux",
			Self::Macos => "macos",
		})
	}
}

/// How servers ended up applied to an interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied {
	/// Name of the mechanism that reported success.
	pub method: &'static str,

	/// Something the operator should know even though it worked.
	pub warning: Option<String>,
}

impl Applied {
	pub fn by(method: &'static str) -> Self {
		Self {
			method,
			warning: None,
		}
	}
}

/// Driver for one OS's DNS settings.
///
/// Success of a mutating call is whatever the underlying tool reports; the
/// result is never re-read to verify it.
#[async_trait]
pub trait Platform: Send + Sync {
	fn kind(&self) -> PlatformKind;

	/// Interfaces in OS enumeration order, with their up/down state.
	///
	/// The order is not guaranteed stable between calls, so an operation should
	/// enumerate once and reuse the result.
	async fn list_active_interfaces(&self) -> Result<Vec<Interface>, SwitchError>;

	/// Statically configured servers; empty means automatic.
	///
	/// This is what a snapshot records, so that replaying it gives back the
	/// same configuration.
	async fn current_servers(&self, iface: &Interface) -> Result<ServerList, SwitchError>;

	/// Servers the interface resolves through right now, whatever set them.
	async fn effective_servers(&self, iface: &Interface) -> Result<ServerList, SwitchError> {
		self.current_servers(iface).await
	}

	async fn apply_servers(
		&self,
		iface: &Interface,
		servers: &ServerList,
	) -> Result<Applied, SwitchError>;

	/// Puts back servers recorded by a snapshot.
	async fn restore_servers(
		&self,
		iface: &Interface,
		servers: &ServerList,
	) -> Result<Applied, SwitchError> {
		self.apply_servers(iface, servers).await
	}

	/// Returns the interface to automatic (DHCP) assignment.
	async fn reset_servers(&self, iface: &Interface) -> Result<Applied, SwitchError>;

	/// Flushes resolver caches, returning the mechanism that worked.
	async fn flush_cache(&self) -> Result<&'static str, SwitchError>;

	/// Whether this platform has host-wide resolver flags at all.
	fn has_flags(&self) -> bool {
		false
	}

	async fn read_flags(&self) -> Result<ResolverFlags, SwitchError> {
		Ok(ResolverFlags::default())
	}

	/// Turns off secure resolution and name-resolution matching.
	async fn disable_flags(&self) -> Result<(), SwitchError> {
		Ok(())
	}

	/// Puts flags back as captured; `None` removes the override.
	async fn restore_flags(&self, _flags: &ResolverFlags) -> Result<(), SwitchError> {
		Ok(())
	}
}

/// Picks the variant for the OS this binary was built for.
pub fn detect(
	runner: Arc<dyn CommandRunner>,
	resolv_conf: Option<PathBuf>,
) -> Result<Box<dyn Platform>, SwitchError> {
	if cfg!(target_os = "windows") {
		Ok(Box::new(Windows::new(runner)))
	} else if cfg!(target_os = "macos") {
		Ok(Box::new(Macos::new(runner)))
	} else if cfg!(target_os = "linux") {
		Ok(Box::new(Linux::new(
			runner,
			resolv_conf.unwrap_or_else(|| PathBuf::from(DEFAULT_RESOLV_CONF)),
		)))
	} else {
		Err(SwitchError::Unsupported(std::env::consts::OS.into()))
	}
}
