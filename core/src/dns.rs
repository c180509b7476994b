use std::{fmt, net::Ipv4Addr, ops::Deref, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SwitchError;

/// Maximum number of resolvers applied to an interface.
pub const MAX_SERVERS: usize = 3;

/// Ordered list of DNS resolvers, at most [`MAX_SERVERS`] long.
///
/// The first entry is the primary resolver. Entries past the third are
/// discarded on construction; duplicates are kept as given. An empty list
/// means the interface uses automatic (DHCP) assignment.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ServerList(Vec<Ipv4Addr>);

impl ServerList {
	/// Keeps the first three servers, in order.
	pub fn truncated(servers: impl IntoIterator<Item = Ipv4Addr>) -> Self {
		Self(servers.into_iter().take(MAX_SERVERS).collect())
	}

	/// Parses the first three dotted-quad strings.
	///
	/// Anything past the third is ignored without being looked at.
	pub fn parse<S: AsRef<str>>(addrs: &[S]) -> Result<Self, SwitchError> {
		addrs
			.iter()
			.take(MAX_SERVERS)
			.map(|a| {
				let a = a.as_ref().trim();
				Ipv4Addr::from_str(a).map_err(|_| SwitchError::InvalidAddress(a.into()))
			})
			.collect::<Result<Vec<_>, _>>()
			.map(Self::truncated)
	}

	pub fn is_automatic(&self) -> bool {
		self.0.is_empty()
	}

	pub fn to_strings(&self) -> Vec<String> {
		self.0.iter().map(ToString::to_string).collect()
	}
}

impl Deref for ServerList {
	type Target = [Ipv4Addr];

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl fmt::Display for ServerList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.0.is_empty() {
			return f.write_str("automatic");
		}

		f.write_str(&self.to_strings().join(", "))
	}
}

impl<'de> Deserialize<'de> for ServerList {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Vec::<Ipv4Addr>::deserialize(deserializer).map(Self::truncated)
	}
}

/// One network interface (or macOS network service) on the host.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub struct Interface {
	/// Device name, interface alias, or service name.
	pub id: String,

	/// Operationally up; only these receive servers.
	pub up: bool,
}

impl Interface {
	pub fn new(id: impl Into<String>, up: bool) -> Self {
		Self { id: id.into(), up }
	}
}

impl fmt::Display for Interface {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.id)
	}
}

/// Host-wide resolver feature flags.
///
/// `None` means the host carries no override for that flag and runs with the
/// OS default; `Some(false)` is an override that explicitly disables it. The
/// two are restored differently, so they are never conflated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverFlags {
	/// Automatic upgrade of resolver queries to an encrypted transport.
	#[serde(default)]
	pub secure_resolution: Option<bool>,

	/// Sending queries to all interfaces and taking the fastest answer.
	#[serde(default)]
	pub name_resolution_matching: Option<bool>,
}
