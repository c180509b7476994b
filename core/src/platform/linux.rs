use std::{
	fs,
	io::{ErrorKind, Write},
	net::Ipv4Addr,
	path::{Path, PathBuf},
	sync::Arc,
};

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use tempfile::NamedTempFile;

use super::{Applied, Platform, PlatformKind};
use crate::{
	command::{args, CommandOutput, CommandRunner},
	dns::{Interface, ServerList},
	error::SwitchError,
};

pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Symlink targets meaning the resolver file belongs to a running manager.
const MANAGED_TARGETS: &[&str] = &["systemd/resolve", "NetworkManager", "resolvconf"];

/// Banners that managers write at the top of a generated resolver file.
const GENERATOR_BANNERS: &[&str] = &[
	"# Generated by NetworkManager",
	"# Generated by resolvconf",
	"# Generated by systemd-resolved",
	"generated by resolvconf(8)",
	"DO NOT EDIT THIS FILE BY HAND",
];

const HEADER: &str = "# Written by dns-switch; undo with `dns-switch restore`";

pub const EDIT_WARNING: &str = "resolver file was edited directly; \
	a network manager or DHCP client may overwrite it";

/// Linux driver.
///
/// Tries NetworkManager, then systemd-resolved, then a direct edit of the
/// resolver file, stopping at the first that reports success.
pub struct Linux {
	runner: Arc<dyn CommandRunner>,
	resolv_conf: PathBuf,
	backup: PathBuf,
}

impl Linux {
	pub fn new(runner: Arc<dyn CommandRunner>, resolv_conf: PathBuf) -> Self {
		let mut backup = resolv_conf.clone().into_os_string();
		backup.push(".dns-switch.bak");
		Self {
			runner,
			resolv_conf,
			backup: backup.into(),
		}
	}

	async fn run(&self, program: &str, argv: Vec<String>) -> Result<CommandOutput, SwitchError> {
		self.runner.run(program, &argv).await?.check(program)
	}

	async fn nmcli_devices(&self) -> Result<Vec<Interface>, SwitchError> {
		let out = self
			.run("nmcli", args(["-t", "-f", "DEVICE,STATE", "device"]))
			.await?;

		Ok(out
			.stdout
			.lines()
			.filter_map(|line| line.rsplit_once(':'))
			.filter(|(device, _)| !device.is_empty() && *device != "lo")
			.map(|(device, state)| Interface::new(device.replace("\\:", ":"), state == "connected"))
			.collect())
	}

	async fn ip_links(&self) -> Result<Vec<Interface>, SwitchError> {
		let out = self.run("ip", args(["-o", "link", "show"])).await?;

		// UNWRAP: literal pattern
		let re = Regex::new(
			r"^\d+:\s+(?P<name>[^:@\s]+)(?:@[^:\s]*)?:\s+<(?P<flags>[^>]*)>.*?\bstate\s+(?P<state>\S+)",
		)
		.unwrap();

		Ok(out
			.stdout
			.lines()
			.filter_map(|line| re.captures(line))
			.filter(|c| &c["name"] != "lo")
			.map(|c| {
				let flags: Vec<&str> = c["flags"].split(',').collect();
				let up = match &c["state"] {
					"UP" => true,
					// tunnels and some virtual devices never report a state
					"UNKNOWN" => flags.contains(&"UP") && flags.contains(&"LOWER_UP"),
					_ => false,
				};
				Interface::new(&c["name"], up)
			})
			.collect())
	}

	async fn nmcli_modify(
		&self,
		iface: &Interface,
		dns: String,
		ignore_auto: &str,
	) -> Result<(), SwitchError> {
		self.run(
			"nmcli",
			args([
				"device",
				"modify",
				iface.id.as_str(),
				"ipv4.dns",
				dns.as_str(),
				"ipv4.ignore-auto-dns",
				ignore_auto,
			]),
		)
		.await
		.map(drop)
	}

	async fn nmcli_servers(&self, iface: &Interface) -> Result<Option<ServerList>, SwitchError> {
		let conn = self
			.run(
				"nmcli",
				args(["-g", "GENERAL.CONNECTION", "device", "show", iface.id.as_str()]),
			)
			.await?;
		let conn = conn.stdout.trim();
		if conn.is_empty() {
			debug!("nmcli: {} has no active connection", iface);
			return Ok(None);
		}

		let dns = self
			.run("nmcli", args(["-g", "ipv4.dns", "connection", "show", conn]))
			.await?;
		Ok(Some(ipv4s(&dns.stdout)))
	}

	/// Runtime servers of the device, including any `device modify` override.
	async fn nmcli_effective(&self, iface: &Interface) -> Result<ServerList, SwitchError> {
		let out = self
			.run(
				"nmcli",
				args(["-g", "IP4.DNS", "device", "show", iface.id.as_str()]),
			)
			.await?;
		Ok(ipv4s(&out.stdout))
	}

	async fn resolvectl_effective(&self, iface: &Interface) -> Result<ServerList, SwitchError> {
		let out = self
			.run("resolvectl", args(["dns", iface.id.as_str()]))
			.await?;

		// Link 2 (eth0): 1.1.1.1 8.8.8.8
		Ok(ServerList::truncated(out.stdout.lines().flat_map(|line| {
			let servers = line
				.split_once("): ")
				.or_else(|| line.split_once(':'))
				.map_or("", |(_, servers)| servers);
			ipv4s(servers).to_vec()
		})))
	}

	/// nmcli, then resolvectl; `None` if neither took the servers.
	async fn apply_via_tools(
		&self,
		iface: &Interface,
		servers: &ServerList,
		failures: &mut Vec<String>,
	) -> Option<&'static str> {
		match self
			.nmcli_modify(iface, servers.to_strings().join(","), "yes")
			.await
		{
			Ok(()) => {
				info!("nmcli: set {} on {}", servers, iface);
				return Some("nmcli");
			}
			Err(err) => {
				warn!("nmcli: {}", err);
				failures.push(format!("nmcli: {}", err));
			}
		}

		let mut argv = args(["dns", iface.id.as_str()]);
		argv.extend(servers.to_strings());
		match self.run("resolvectl", argv).await {
			Ok(_) => {
				info!("resolvectl: set {} on {}", servers, iface);
				Some("resolvectl")
			}
			Err(err) => {
				warn!("resolvectl: {}", err);
				failures.push(format!("resolvectl: {}", err));
				None
			}
		}
	}

	/// Moves a leftover backup back, so a tool-based restore does not leave
	/// an earlier direct edit behind.
	fn discard_edit(&self) {
		if !self.backup.exists() {
			return;
		}

		if let Err(err) = self.restore_resolv_conf() {
			warn!("resolv.conf: cannot put {} back: {}", self.backup.display(), err);
		}
	}

	/// Why the resolver file must not be edited, if it must not.
	fn managed_by(&self, content: &str) -> Option<String> {
		if let Ok(target) = fs::read_link(&self.resolv_conf) {
			let target = target.to_string_lossy();
			if MANAGED_TARGETS.iter().any(|t| target.contains(t)) {
				return Some(format!(
					"{} is a symlink to {}, which a live service maintains",
					self.resolv_conf.display(),
					target
				));
			}
		}

		GENERATOR_BANNERS
			.iter()
			.find(|b| content.contains(*b))
			.map(|b| {
				format!(
					"{} is generated by another service ({:?})",
					self.resolv_conf.display(),
					b
				)
			})
	}

	fn read_resolv_conf(&self) -> Result<String, SwitchError> {
		match fs::read_to_string(&self.resolv_conf) {
			Ok(s) => Ok(s),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
			Err(err) => Err(err.into()),
		}
	}

	fn write_resolv_conf(&self, servers: &ServerList) -> Result<(), SwitchError> {
		let current = self.read_resolv_conf()?;
		if let Some(reason) = self.managed_by(&current) {
			return Err(SwitchError::apply("resolv.conf", reason));
		}

		if !self.backup.exists() && self.resolv_conf.exists() {
			info!(
				"backing up {} to {}",
				self.resolv_conf.display(),
				self.backup.display()
			);
			fs::copy(&self.resolv_conf, &self.backup)?;
		}

		let mut content = format!("{}\n", HEADER);
		for server in servers.iter() {
			content.push_str(&format!("nameserver {}\n", server));
		}
		for line in current.lines() {
			let kept = line.trim();
			if kept.is_empty() || kept == HEADER || kept.starts_with("nameserver") {
				continue;
			}
			content.push_str(line);
			content.push('\n');
		}

		replace_file(&self.resolv_conf, &content)?;
		info!("wrote {} server(s) to {}", servers.len(), self.resolv_conf.display());
		Ok(())
	}

	fn restore_resolv_conf(&self) -> Result<(), SwitchError> {
		if self.backup.exists() {
			fs::rename(&self.backup, &self.resolv_conf)?;
			info!("moved {} back into place", self.backup.display());
			return Ok(());
		}

		if self.read_resolv_conf()?.contains(HEADER) {
			Err(SwitchError::apply(
				"resolv.conf",
				format!("no backup at {}", self.backup.display()),
			))
		} else {
			debug!("{} was not edited by us", self.resolv_conf.display());
			Ok(())
		}
	}

	async fn service_active(&self, unit: &str) -> bool {
		match self
			.runner
			.run("systemctl", &args(["is-active", unit]))
			.await
		{
			Ok(out) => out.stdout.trim() == "active",
			Err(err) => {
				debug!("systemctl is-active {}: {}", unit, err);
				false
			}
		}
	}
}

/// Atomically replaces `path` with `content`, world-readable.
fn replace_file(path: &Path, content: &str) -> Result<(), SwitchError> {
	let dir = match path.parent() {
		Some(p) if !p.as_os_str().is_empty() => p,
		_ => Path::new("."),
	};

	let mut tmp = NamedTempFile::new_in(dir)?;
	tmp.write_all(content.as_bytes())?;

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		tmp.as_file()
			.set_permissions(fs::Permissions::from_mode(0o644))?;
	}

	tmp.persist(path).map_err(|err| err.error)?;
	Ok(())
}

/// IPv4 addresses in tool output separated by commas, pipes or whitespace.
///
/// A `#server-name` suffix is dropped; anything else unparsable is skipped.
fn ipv4s(text: &str) -> ServerList {
	ServerList::truncated(
		text.split(|c: char| c == ',' || c == '|' || c.is_whitespace())
			.filter_map(|word| word.split('#').next()?.parse::<Ipv4Addr>().ok()),
	)
}

fn nameservers(content: &str) -> ServerList {
	ServerList::truncated(content.lines().filter_map(|line| {
		let mut words = line.split_whitespace();
		match (words.next(), words.next()) {
			(Some("nameserver"), Some(addr)) => addr.parse::<Ipv4Addr>().ok(),
			_ => None,
		}
	}))
}

#[async_trait]
impl Platform for Linux {
	fn kind(&self) -> PlatformKind {
		PlatformKind::Linux
	}

	async fn list_active_interfaces(&self) -> Result<Vec<Interface>, SwitchError> {
		if self.runner.available("nmcli") {
			match self.nmcli_devices().await {
				Ok(devices) if !devices.is_empty() => return Ok(devices),
				Ok(_) => debug!("nmcli: no devices, falling back to ip"),
				Err(err) => warn!("nmcli: cannot list devices: {}", err),
			}
		}

		self.ip_links().await
	}

	async fn current_servers(&self, iface: &Interface) -> Result<ServerList, SwitchError> {
		if self.runner.available("nmcli") {
			match self.nmcli_servers(iface).await {
				Ok(Some(servers)) => return Ok(servers),
				Ok(None) => {}
				Err(err) => warn!("nmcli: cannot read DNS of {}: {}", iface, err),
			}
		}

		if self.runner.available("resolvectl") {
			// revert hands the link back to whatever the network provides
			debug!("resolvectl: recording {} as automatic", iface);
			return Ok(ServerList::default());
		}

		let content = self.read_resolv_conf()?;
		if let Some(reason) = self.managed_by(&content) {
			debug!("{}; recording {} as automatic", reason, iface);
			return Ok(ServerList::default());
		}

		Ok(nameservers(&content))
	}

	async fn effective_servers(&self, iface: &Interface) -> Result<ServerList, SwitchError> {
		if self.runner.available("nmcli") {
			match self.nmcli_effective(iface).await {
				Ok(servers) if !servers.is_automatic() => return Ok(servers),
				Ok(_) => debug!("nmcli: no runtime DNS on {}", iface),
				Err(err) => warn!("nmcli: cannot read runtime DNS of {}: {}", iface, err),
			}
		}

		if self.runner.available("resolvectl") {
			match self.resolvectl_effective(iface).await {
				Ok(servers) if !servers.is_automatic() => return Ok(servers),
				Ok(_) => debug!("resolvectl: no link DNS on {}", iface),
				Err(err) => warn!("resolvectl: cannot read DNS of {}: {}", iface, err),
			}
		}

		Ok(nameservers(&self.read_resolv_conf()?))
	}

	async fn apply_servers(
		&self,
		iface: &Interface,
		servers: &ServerList,
	) -> Result<Applied, SwitchError> {
		let mut failures = Vec::with_capacity(3);
		if let Some(method) = self.apply_via_tools(iface, servers, &mut failures).await {
			return Ok(Applied::by(method));
		}

		match self.write_resolv_conf(servers) {
			Ok(()) => {
				warn!("{}", EDIT_WARNING);
				Ok(Applied {
					method: "resolv.conf",
					warning: Some(EDIT_WARNING.into()),
				})
			}
			Err(err) => {
				warn!("resolv.conf: {}", err);
				failures.push(format!("resolv.conf: {}", err));
				Err(SwitchError::apply(&iface.id, failures.join("; ")))
			}
		}
	}

	/// Replays recorded servers through the tools; a direct edit of the
	/// resolver file is undone from its backup instead of being rewritten.
	async fn restore_servers(
		&self,
		iface: &Interface,
		servers: &ServerList,
	) -> Result<Applied, SwitchError> {
		let mut failures = Vec::with_capacity(3);
		if let Some(method) = self.apply_via_tools(iface, servers, &mut failures).await {
			self.discard_edit();
			return Ok(Applied::by(method));
		}

		match self.restore_resolv_conf() {
			Ok(()) => Ok(Applied::by("resolv.conf")),
			Err(err) => {
				failures.push(format!("resolv.conf: {}", err));
				Err(SwitchError::apply(&iface.id, failures.join("; ")))
			}
		}
	}

	async fn reset_servers(&self, iface: &Interface) -> Result<Applied, SwitchError> {
		let mut failures = Vec::with_capacity(3);

		match self.nmcli_modify(iface, String::new(), "no").await {
			Ok(()) => {
				self.discard_edit();
				return Ok(Applied::by("nmcli"));
			}
			Err(err) => failures.push(format!("nmcli: {}", err)),
		}

		match self
			.run("resolvectl", args(["revert", iface.id.as_str()]))
			.await
		{
			Ok(_) => {
				self.discard_edit();
				return Ok(Applied::by("resolvectl"));
			}
			Err(err) => failures.push(format!("resolvectl: {}", err)),
		}

		match self.restore_resolv_conf() {
			Ok(()) => Ok(Applied::by("resolv.conf")),
			Err(err) => {
				failures.push(format!("resolv.conf: {}", err));
				Err(SwitchError::apply(&iface.id, failures.join("; ")))
			}
		}
	}

	async fn flush_cache(&self) -> Result<&'static str, SwitchError> {
		let mut failures = Vec::new();

		match self.run("resolvectl", args(["flush-caches"])).await {
			Ok(_) => return Ok("resolvectl"),
			Err(err) => failures.push(format!("resolvectl: {}", err)),
		}

		for unit in ["nscd", "dnsmasq"] {
			if !self.service_active(unit).await {
				debug!("{} is not active", unit);
				continue;
			}

			match self.run("systemctl", args(["restart", unit])).await {
				Ok(_) => return Ok(unit),
				Err(err) => failures.push(format!("{}: {}", unit, err)),
			}
		}

		if failures.len() == 1 {
			failures.push("no nscd or dnsmasq running".into());
		}
		Err(SwitchError::Flush(failures.join("; ")))
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;
	use crate::testing::ScriptedRunner;

	fn linux(runner: ScriptedRunner, dir: &TempDir) -> (Arc<ScriptedRunner>, Linux) {
		let runner = Arc::new(runner);
		let linux = Linux::new(runner.clone(), dir.path().join("resolv.conf"));
		(runner, linux)
	}

	fn servers() -> ServerList {
		ServerList::parse(&["1.1.1.1", "8.8.8.8"]).unwrap()
	}

	#[tokio::test]
	async fn nmcli_wins_first() {
		let dir = TempDir::new().unwrap();
		let (runner, linux) = linux(
			ScriptedRunner::new()
				.on("nmcli device modify eth0", CommandOutput::ok(""))
				.tool("resolvectl"),
			&dir,
		);

		let applied = linux
			.apply_servers(&Interface::new("eth0", true), &servers())
			.await
			.unwrap();
		assert_eq!(applied, Applied::by("nmcli"));
		assert_eq!(
			runner.calls(),
			vec!["nmcli device modify eth0 ipv4.dns 1.1.1.1,8.8.8.8 ipv4.ignore-auto-dns yes"]
		);
	}

	#[tokio::test]
	async fn falls_back_to_resolvectl() {
		let dir = TempDir::new().unwrap();
		let (runner, linux) = linux(
			ScriptedRunner::new()
				.on("nmcli", CommandOutput::failed(10, "Error: Device 'eth0' not found."))
				.on("resolvectl dns eth0", CommandOutput::ok("")),
			&dir,
		);

		let applied = linux
			.apply_servers(&Interface::new("eth0", true), &servers())
			.await
			.unwrap();
		assert_eq!(applied.method, "resolvectl");
		assert!(runner.ran("resolvectl dns eth0 1.1.1.1 8.8.8.8"));
	}

	#[tokio::test]
	async fn falls_back_to_resolver_file_with_warning() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("resolv.conf");
		fs::write(&path, "nameserver 192.168.1.1\nsearch lan\n").unwrap();

		let (runner, linux) = linux(
			ScriptedRunner::new()
				.on("nmcli", CommandOutput::failed(8, "NetworkManager is not running."))
				.timeout_on("resolvectl"),
			&dir,
		);

		let applied = linux
			.apply_servers(&Interface::new("eth0", true), &servers())
			.await
			.unwrap();
		assert_eq!(applied.method, "resolv.conf");
		assert_eq!(applied.warning.as_deref(), Some(EDIT_WARNING));
		assert_eq!(runner.calls().len(), 2);

		let written = fs::read_to_string(&path).unwrap();
		assert_eq!(
			written,
			format!("{}\nnameserver 1.1.1.1\nnameserver 8.8.8.8\nsearch lan\n", HEADER)
		);
		assert_eq!(
			fs::read_to_string(dir.path().join("resolv.conf.dns-switch.bak")).unwrap(),
			"nameserver 192.168.1.1\nsearch lan\n"
		);
	}

	#[tokio::test]
	async fn refuses_generated_resolver_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("resolv.conf");
		fs::write(&path, "# Generated by NetworkManager\nnameserver 10.0.0.1\n").unwrap();
		let (_, linux) = linux(ScriptedRunner::new(), &dir);

		let err = linux
			.apply_servers(&Interface::new("eth0", true), &servers())
			.await
			.unwrap_err();
		let msg = err.to_string();
		assert!(msg.contains("nmcli: command not found"), "{}", msg);
		assert!(msg.contains("resolvectl: command not found"), "{}", msg);
		assert!(msg.contains("generated by another service"), "{}", msg);
		assert!(fs::read_to_string(&path).unwrap().contains("10.0.0.1"));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn refuses_symlink_into_systemd() {
		let dir = TempDir::new().unwrap();
		let stub = dir.path().join("systemd/resolve/stub-resolv.conf");
		fs::create_dir_all(stub.parent().unwrap()).unwrap();
		fs::write(&stub, "nameserver 127.0.0.53\n").unwrap();
		std::os::unix::fs::symlink(&stub, dir.path().join("resolv.conf")).unwrap();
		let (_, linux) = linux(ScriptedRunner::new(), &dir);

		let err = linux
			.apply_servers(&Interface::new("eth0", true), &servers())
			.await
			.unwrap_err();
		assert!(err.to_string().contains("a live service maintains"), "{}", err);
	}

	#[tokio::test]
	async fn reset_moves_backup_back() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("resolv.conf");
		fs::write(&path, "nameserver 192.168.1.1\n").unwrap();
		let (_, linux) = linux(ScriptedRunner::new(), &dir);

		let eth0 = Interface::new("eth0", true);
		linux.apply_servers(&eth0, &servers()).await.unwrap();
		assert_eq!(linux.reset_servers(&eth0).await.unwrap().method, "resolv.conf");
		assert_eq!(fs::read_to_string(&path).unwrap(), "nameserver 192.168.1.1\n");

		// a second interface finds the file already back to normal
		let wlan0 = Interface::new("wlan0", true);
		assert!(linux.reset_servers(&wlan0).await.is_ok());
	}

	#[tokio::test]
	async fn restore_puts_resolver_file_back_verbatim() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("resolv.conf");
		let original = "# local resolvers\nnameserver 192.168.1.1\n\noptions edns0\n";
		fs::write(&path, original).unwrap();
		let (_, linux) = linux(ScriptedRunner::new(), &dir);

		let eth0 = Interface::new("eth0", true);
		let recorded = linux.current_servers(&eth0).await.unwrap();
		linux.apply_servers(&eth0, &servers()).await.unwrap();

		let applied = linux.restore_servers(&eth0, &recorded).await.unwrap();
		assert_eq!(applied.method, "resolv.conf");
		assert_eq!(fs::read_to_string(&path).unwrap(), original);
		assert!(!dir.path().join("resolv.conf.dns-switch.bak").exists());
	}

	#[tokio::test]
	async fn tool_restore_drops_earlier_file_edit() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("resolv.conf");
		fs::write(&path, "nameserver 192.168.1.1\n").unwrap();

		let eth0 = Interface::new("eth0", true);
		let (_, bare) = linux(ScriptedRunner::new(), &dir);
		bare.apply_servers(&eth0, &servers()).await.unwrap();

		let (_, linux) = linux(
			ScriptedRunner::new().on("resolvectl revert eth0", CommandOutput::ok("")),
			&dir,
		);
		assert_eq!(linux.reset_servers(&eth0).await.unwrap().method, "resolvectl");
		assert_eq!(fs::read_to_string(&path).unwrap(), "nameserver 192.168.1.1\n");
		assert!(!dir.path().join("resolv.conf.dns-switch.bak").exists());
	}

	#[tokio::test]
	async fn reset_prefers_nmcli() {
		let dir = TempDir::new().unwrap();
		let (runner, linux) = linux(
			ScriptedRunner::new().on("nmcli device modify", CommandOutput::ok("")),
			&dir,
		);

		linux
			.reset_servers(&Interface::new("enp3s0", true))
			.await
			.unwrap();
		assert_eq!(
			runner.calls(),
			vec!["nmcli device modify enp3s0 ipv4.dns  ipv4.ignore-auto-dns no"]
		);
	}

	#[tokio::test]
	async fn lists_nmcli_devices() {
		let dir = TempDir::new().unwrap();
		let (_, linux) = linux(
			ScriptedRunner::new().on(
				"nmcli -t -f DEVICE,STATE device",
				CommandOutput::ok(
					"wlp2s0:connected\ndocker0:connected (externally)\nenp3s0:unavailable\nlo:unmanaged\n",
				),
			),
			&dir,
		);

		assert_eq!(
			linux.list_active_interfaces().await.unwrap(),
			vec![
				Interface::new("wlp2s0", true),
				Interface::new("docker0", false),
				Interface::new("enp3s0", false),
			]
		);
	}

	#[tokio::test]
	async fn lists_ip_links_without_nmcli() {
		let dir = TempDir::new().unwrap();
		let (_, linux) = linux(
			ScriptedRunner::new().on(
				"ip -o link show",
				CommandOutput::ok(concat!(
					"1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000\\    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00\n",
					"2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP mode DEFAULT group default qlen 1000\\    link/ether 52:54:00:12:34:56 brd ff:ff:ff:ff:ff:ff\n",
					"3: wlan0: <NO-CARRIER,BROADCAST,MULTICAST,UP> mtu 1500 qdisc noqueue state DOWN mode DORMANT group default qlen 1000\\    link/ether aa:bb:cc:dd:ee:ff brd ff:ff:ff:ff:ff:ff\n",
					"4: veth1a2b@if5: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP mode DEFAULT group default\\    link/ether 11:22:33:44:55:66 brd ff:ff:ff:ff:ff:ff link-netnsid 0\n",
					"5: wg0: <POINTOPOINT,NOARP,UP,LOWER_UP> mtu 1420 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000\\    link/none\n",
				)),
			),
			&dir,
		);

		assert_eq!(
			linux.list_active_interfaces().await.unwrap(),
			vec![
				Interface::new("eth0", true),
				Interface::new("wlan0", false),
				Interface::new("veth1a2b", true),
				Interface::new("wg0", true),
			]
		);
	}

	#[tokio::test]
	async fn reads_profile_servers_from_nmcli() {
		let dir = TempDir::new().unwrap();
		let (_, linux) = linux(
			ScriptedRunner::new()
				.on(
					"nmcli -g GENERAL.CONNECTION device show eth0",
					CommandOutput::ok("Wired connection 1\n"),
				)
				.on(
					"nmcli -g ipv4.dns connection show Wired connection 1",
					CommandOutput::ok("9.9.9.9,149.112.112.112\n"),
				),
			&dir,
		);

		let servers = linux
			.current_servers(&Interface::new("eth0", true))
			.await
			.unwrap();
		assert_eq!(servers.to_strings(), vec!["9.9.9.9", "149.112.112.112"]);
	}

	#[tokio::test]
	async fn dhcp_profile_reads_as_automatic() {
		let dir = TempDir::new().unwrap();
		let (_, linux) = linux(
			ScriptedRunner::new()
				.on(
					"nmcli -g GENERAL.CONNECTION device show eth0",
					CommandOutput::ok("Wired connection 1\n"),
				)
				.on("nmcli -g ipv4.dns connection show", CommandOutput::ok("\n")),
			&dir,
		);

		assert!(linux
			.current_servers(&Interface::new("eth0", true))
			.await
			.unwrap()
			.is_automatic());
	}

	#[tokio::test]
	async fn effective_servers_come_from_the_device() {
		let dir = TempDir::new().unwrap();
		let (runner, linux) = linux(
			ScriptedRunner::new()
				.on(
					"nmcli -g IP4.DNS device show eth0",
					CommandOutput::ok("1.1.1.1 | 8.8.8.8\n"),
				)
				.tool("resolvectl"),
			&dir,
		);

		let servers = linux
			.effective_servers(&Interface::new("eth0", true))
			.await
			.unwrap();
		assert_eq!(servers.to_strings(), vec!["1.1.1.1", "8.8.8.8"]);
		assert!(!runner.ran("nmcli -g ipv4.dns"));
		assert!(!runner.ran("resolvectl"));
	}

	#[tokio::test]
	async fn effective_servers_from_resolvectl_link() {
		let dir = TempDir::new().unwrap();
		let (_, linux) = linux(
			ScriptedRunner::new().on(
				"resolvectl dns eth0",
				CommandOutput::ok("Link 2 (eth0): 1.1.1.1 fe80::1 8.8.8.8#dns.google\n"),
			),
			&dir,
		);

		let servers = linux
			.effective_servers(&Interface::new("eth0", true))
			.await
			.unwrap();
		assert_eq!(servers.to_strings(), vec!["1.1.1.1", "8.8.8.8"]);
	}

	#[tokio::test]
	async fn effective_servers_fall_back_to_resolver_file() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("resolv.conf"),
			"# Generated by NetworkManager\nnameserver 127.0.0.53\n",
		)
		.unwrap();
		let (_, linux) = linux(
			ScriptedRunner::new().on("resolvectl dns eth0", CommandOutput::ok("Link 2 (eth0):\n")),
			&dir,
		);

		let servers = linux
			.effective_servers(&Interface::new("eth0", true))
			.await
			.unwrap();
		assert_eq!(servers.to_strings(), vec!["127.0.0.53"]);
	}

	#[tokio::test]
	async fn reads_unmanaged_resolver_file() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("resolv.conf"),
			"options edns0\nnameserver 10.0.0.1\nnameserver fe80::1\nnameserver 10.0.0.2\n",
		)
		.unwrap();
		let (_, linux) = linux(ScriptedRunner::new(), &dir);

		let servers = linux
			.current_servers(&Interface::new("eth0", true))
			.await
			.unwrap();
		assert_eq!(servers.to_strings(), vec!["10.0.0.1", "10.0.0.2"]);
	}

	#[tokio::test]
	async fn flush_chain() {
		let dir = TempDir::new().unwrap();
		let (runner, linux) = linux(
			ScriptedRunner::new()
				.on("resolvectl", CommandOutput::failed(1, "Failed to flush caches"))
				.on("systemctl is-active nscd", CommandOutput::failed(3, ""))
				.on("systemctl is-active dnsmasq", CommandOutput::ok("active\n"))
				.on("systemctl restart dnsmasq", CommandOutput::ok("")),
			&dir,
		);

		assert_eq!(linux.flush_cache().await.unwrap(), "dnsmasq");
		assert!(!runner.ran("systemctl restart nscd"));
	}

	#[tokio::test]
	async fn flush_fails_when_nothing_works() {
		let dir = TempDir::new().unwrap();
		let (_, linux) = linux(ScriptedRunner::new(), &dir);
		assert!(matches!(
			linux.flush_cache().await,
			Err(SwitchError::Flush(_))
		));
	}
}
