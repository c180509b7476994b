//! Runtime settings.
//!
//! You’ll want to start with [`Settings`].

use std::{
	fs,
	net::{Ipv4Addr, SocketAddr, SocketAddrV4},
	path::{Path, PathBuf},
	str::FromStr,
	time::Duration,
};

use log::{debug, LevelFilter};
use serde::{Deserialize, Serialize};

use crate::{command::DEFAULT_TIMEOUT, error::SwitchError, snapshot::DEFAULT_SNAPSHOT_FILE};

/// Default config source file, relative to the working directory.
pub const DEFAULT_SOURCE_FILE: &str = "dnsConf.txt";

/// Default listen address of the local API.
pub const DEFAULT_LISTEN: SocketAddr =
	SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8053));

/// Everything that can be tuned without rebuilding.
///
/// Read from an optional JSON file, in which every field may be omitted:
///
/// ```json
/// {
///   "listen": "127.0.0.1:8053",
///   "source": "dnsConf.txt",
///   "snapshot": "original_dns_config.json",
///   "resolvConf": "/etc/resolv.conf",
///   "commandTimeoutSecs": 15,
///   "logLevel": "info"
/// }
/// ```
///
/// Command-line flags and `DNS_SWITCH_*` environment variables are applied on
/// top by the binary.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
	/// Address the local API binds to.
	pub listen: SocketAddr,

	/// The `Name=IPAddress` file servers are read from.
	pub source: PathBuf,

	/// Where the original configuration is kept between apply and restore.
	pub snapshot: PathBuf,

	/// Resolver file edited as a last resort on Linux.
	///
	/// `None` means `/etc/resolv.conf`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolv_conf: Option<PathBuf>,

	/// Bound on each OS command, in seconds.
	pub command_timeout_secs: u64,

	/// Level of the terminal logger: `off`, `error`, `warn`, `info`, `debug`
	/// or `trace`.
	pub log_level: String,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			listen: DEFAULT_LISTEN,
			source: DEFAULT_SOURCE_FILE.into(),
			snapshot: DEFAULT_SNAPSHOT_FILE.into(),
			resolv_conf: None,
			command_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
			log_level: "info".into(),
		}
	}
}

impl Settings {
	/// Reads settings from `path`, or returns the defaults if there is none.
	pub fn load(path: Option<&Path>) -> Result<Self, SwitchError> {
		let path = match path {
			Some(p) => p,
			None => return Ok(Self::default()),
		};

		debug!("reading settings from {}", path.display());
		let text = fs::read_to_string(path)?;
		let settings: Self = serde_json::from_str(&text).map_err(|err| SwitchError::Settings {
			path: path.to_path_buf(),
			err,
		})?;

		settings.level_filter()?;
		Ok(settings)
	}

	pub fn command_timeout(&self) -> Duration {
		Duration::from_secs(self.command_timeout_secs)
	}

	pub fn level_filter(&self) -> Result<LevelFilter, SwitchError> {
		LevelFilter::from_str(&self.log_level)
			.map_err(|_| SwitchError::InvalidLogLevel(self.log_level.clone()))
	}
}
