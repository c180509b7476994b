use std::{net::Ipv4Addr, sync::Arc};

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;

use super::{Applied, Platform, PlatformKind};
use crate::{
	command::{args, CommandOutput, CommandRunner},
	dns::{Interface, ResolverFlags, ServerList},
	error::SwitchError,
};

/// A DWORD registry value backing one resolver flag.
struct RegistryFlag {
	key: &'static str,
	value: &'static str,
	on: u32,
	off: u32,
}

impl RegistryFlag {
	fn decode(&self, raw: u32) -> bool {
		raw == self.on
	}

	fn encode(&self, enabled: bool) -> u32 {
		if enabled {
			self.on
		} else {
			self.off
		}
	}
}

const SECURE_RESOLUTION: RegistryFlag = RegistryFlag {
	key: r"HKLM\SYSTEM\CurrentControlSet\Services\Dnscache\Parameters",
	value: "EnableAutoDoh",
	on: 2,
	off: 0,
};

const NAME_RESOLUTION_MATCHING: RegistryFlag = RegistryFlag {
	key: r"HKLM\SOFTWARE\Policies\Microsoft\Windows NT\DNSClient",
	value: "DisableSmartNameResolution",
	on: 0,
	off: 1,
};

/// Windows driver, over `netsh`, `ipconfig` and `reg`.
pub struct Windows {
	runner: Arc<dyn CommandRunner>,
}

impl Windows {
	pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
		Self { runner }
	}

	async fn netsh(&self, argv: Vec<String>) -> Result<CommandOutput, SwitchError> {
		self.runner.run("netsh", &argv).await?.check("netsh")
	}

	async fn query(&self, flag: &RegistryFlag) -> Result<Option<bool>, SwitchError> {
		let out = self
			.runner
			.run("reg", &args(["query", flag.key, "/v", flag.value]))
			.await?;

		if !out.success() {
			// reg exits 1 both for a missing key and a missing value
			debug!("reg: {}\\{} is not set", flag.key, flag.value);
			return Ok(None);
		}

		let raw = parse_dword(&out.stdout, flag.value).ok_or_else(|| SwitchError::Command {
			program: "reg".into(),
			status: "exit 0".into(),
			stderr: format!("unreadable {} value: {}", flag.value, out.stdout.trim()),
		})?;
		Ok(Some(flag.decode(raw)))
	}

	async fn write(&self, flag: &RegistryFlag, enabled: bool) -> Result<(), SwitchError> {
		let data = flag.encode(enabled).to_string();
		info!("reg: {}\\{} = {}", flag.key, flag.value, data);
		self.runner
			.run(
				"reg",
				&args([
					"add",
					flag.key,
					"/v",
					flag.value,
					"/t",
					"REG_DWORD",
					"/d",
					data.as_str(),
					"/f",
				]),
			)
			.await?
			.check("reg")
			.map(drop)
	}

	async fn remove(&self, flag: &RegistryFlag) -> Result<(), SwitchError> {
		let present = self
			.runner
			.run("reg", &args(["query", flag.key, "/v", flag.value]))
			.await?
			.success();
		if !present {
			debug!("reg: {} already absent", flag.value);
			return Ok(());
		}

		self.runner
			.run("reg", &args(["delete", flag.key, "/v", flag.value, "/f"]))
			.await?
			.check("reg")?;
		info!("reg: removed {}\\{}", flag.key, flag.value);
		Ok(())
	}

	async fn put_back(&self, flag: &RegistryFlag, state: Option<bool>) -> Result<(), SwitchError> {
		match state {
			Some(enabled) => self.write(flag, enabled).await,
			None => self.remove(flag).await,
		}
	}
}

/// Rows of `netsh interface show interface`.
fn parse_interfaces(table: &str) -> Vec<Interface> {
	// UNWRAP: literal pattern
	let re = Regex::new(r"^(Enabled|Disabled)\s+(\S+)\s+\S+\s+(\S.*?)\s*$").unwrap();
	table
		.lines()
		.filter_map(|line| re.captures(line))
		.map(|c| Interface::new(&c[3], &c[1] == "Enabled" && &c[2] == "Connected"))
		.collect()
}

/// Statically configured servers out of `netsh ... show dnsservers`.
fn parse_dns_servers(output: &str) -> ServerList {
	if output.to_lowercase().contains("dhcp") {
		return ServerList::default();
	}

	// UNWRAP: literal pattern
	let re = Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3})\b").unwrap();
	ServerList::truncated(
		re.captures_iter(output)
			.filter_map(|c| c[1].parse::<Ipv4Addr>().ok()),
	)
}

/// The data of a REG_DWORD line of `reg query`.
fn parse_dword(output: &str, value: &str) -> Option<u32> {
	output.lines().find_map(|line| {
		let mut words = line.split_whitespace();
		match (words.next(), words.next(), words.next()) {
			(Some(name), Some("REG_DWORD"), Some(data)) if name == value => {
				u32::from_str_radix(data.trim_start_matches("0x"), 16).ok()
			}
			_ => None,
		}
	})
}

#[async_trait]
impl Platform for Windows {
	fn kind(&self) -> PlatformKind {
		PlatformKind::Windows
	}

	async fn list_active_interfaces(&self) -> Result<Vec<Interface>, SwitchError> {
		let out = self
			.netsh(args(["interface", "show", "interface"]))
			.await?;
		Ok(parse_interfaces(&out.stdout))
	}

	async fn current_servers(&self, iface: &Interface) -> Result<ServerList, SwitchError> {
		let out = self
			.netsh(args([
				"interface".to_string(),
				"ipv4".into(),
				"show".into(),
				"dnsservers".into(),
				format!("name={}", iface.id),
			]))
			.await?;
		Ok(parse_dns_servers(&out.stdout))
	}

	async fn apply_servers(
		&self,
		iface: &Interface,
		servers: &ServerList,
	) -> Result<Applied, SwitchError> {
		let name = format!("name={}", iface.id);
		let addrs = servers.to_strings();
		let (first, rest) = addrs
			.split_first()
			.ok_or_else(|| SwitchError::apply(&iface.id, "no servers given"))?;

		self.netsh(args([
			"interface",
			"ipv4",
			"set",
			"dnsservers",
			name.as_str(),
			"static",
			first.as_str(),
			"primary",
			"validate=no",
		]))
		.await
		.map_err(|err| SwitchError::apply(&iface.id, err))?;

		for (i, addr) in rest.iter().enumerate() {
			let index = format!("index={}", i + 2);
			self.netsh(args([
				"interface",
				"ipv4",
				"add",
				"dnsservers",
				name.as_str(),
				addr.as_str(),
				index.as_str(),
				"validate=no",
			]))
			.await
			.map_err(|err| SwitchError::apply(&iface.id, err))?;
		}

		info!("netsh: set {} on {}", servers, iface);
		Ok(Applied::by("netsh"))
	}

	async fn reset_servers(&self, iface: &Interface) -> Result<Applied, SwitchError> {
		let name = format!("name={}", iface.id);
		self.netsh(args([
			"interface",
			"ipv4",
			"set",
			"dnsservers",
			name.as_str(),
			"source=dhcp",
		]))
		.await
		.map_err(|err| SwitchError::apply(&iface.id, err))?;

		info!("netsh: {} back on DHCP", iface);
		Ok(Applied::by("netsh"))
	}

	async fn flush_cache(&self) -> Result<&'static str, SwitchError> {
		self.runner
			.run("ipconfig", &args(["/flushdns"]))
			.await
			.and_then(|out| out.check("ipconfig"))
			.map(|_| "ipconfig")
			.map_err(|err| SwitchError::Flush(err.to_string()))
	}

	fn has_flags(&self) -> bool {
		true
	}

	async fn read_flags(&self) -> Result<ResolverFlags, SwitchError> {
		Ok(ResolverFlags {
			secure_resolution: self.query(&SECURE_RESOLUTION).await?,
			name_resolution_matching: self.query(&NAME_RESOLUTION_MATCHING).await?,
		})
	}

	async fn disable_flags(&self) -> Result<(), SwitchError> {
		self.write(&SECURE_RESOLUTION, false).await?;
		self.write(&NAME_RESOLUTION_MATCHING, false).await
	}

	async fn restore_flags(&self, flags: &ResolverFlags) -> Result<(), SwitchError> {
		let secure = self
			.put_back(&SECURE_RESOLUTION, flags.secure_resolution)
			.await;
		if let Err(err) = &secure {
			warn!("reg: could not restore {}: {}", SECURE_RESOLUTION.value, err);
		}

		self.put_back(&NAME_RESOLUTION_MATCHING, flags.name_resolution_matching)
			.await?;
		secure
	}
}
