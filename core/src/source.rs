//! The human-edited list of resolvers.
//!
//! One `Name=IPAddress` pair per line, for example:
//!
//! ```text
//! # Cloudflare first
//! Cloudflare=1.1.1.1
//! Google=8.8.8.8
//! ```

use std::{
	fs,
	io::ErrorKind,
	net::Ipv4Addr,
	path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{dns::ServerList, error::SwitchError};

/// One `Name=IPAddress` line, as written.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DnsEntry {
	pub name: String,
	pub address: String,
}

/// A loaded config source file.
#[derive(Clone, Debug)]
pub struct DnsSource {
	path: PathBuf,
	entries: Vec<DnsEntry>,
}

impl DnsSource {
	/// Reads every entry from the file, unfiltered.
	///
	/// Blank lines and `#` comments are skipped, as are lines without an `=`
	/// (with a warning). Addresses are not validated here.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, SwitchError> {
		let path = path.as_ref().to_path_buf();
		let text = fs::read_to_string(&path).map_err(|err| SwitchError::ConfigSource {
			path: path.clone(),
			reason: if err.kind() == ErrorKind::NotFound {
				"file not found".into()
			} else {
				err.to_string()
			},
		})?;

		if text.trim().is_empty() {
			return Err(SwitchError::ConfigSource {
				path,
				reason: "file is empty".into(),
			});
		}

		let mut entries = Vec::new();
		for (n, line) in text.lines().enumerate() {
			let line = line.trim();
			if line.is_empty() || line.starts_with('#') {
				continue;
			}

			match line.split_once('=') {
				Some((name, address)) => entries.push(DnsEntry {
					name: name.trim().into(),
					address: address.trim().into(),
				}),
				None => warn!("{}:{}: missing '=', skipped: {}", path.display(), n + 1, line),
			}
		}

		debug!("read {} entries from {}", entries.len(), path.display());
		Ok(Self { path, entries })
	}

	pub fn entries(&self) -> &[DnsEntry] {
		&self.entries
	}

	/// The first three entries that are valid IPv4 addresses.
	pub fn servers(&self) -> Result<ServerList, SwitchError> {
		let valid = self.entries.iter().filter_map(|e| match e.address.parse::<Ipv4Addr>() {
			Ok(ip) => Some(ip),
			Err(_) => {
				warn!("{}: not an IPv4 address, skipped: {}", e.name, e.address);
				None
			}
		});

		let servers = ServerList::truncated(valid);
		if servers.is_automatic() {
			Err(SwitchError::ConfigSource {
				path: self.path.clone(),
				reason: "no valid IPv4 address found".into(),
			})
		} else {
			Ok(servers)
		}
	}
}
