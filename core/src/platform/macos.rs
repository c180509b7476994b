use std::{net::Ipv4Addr, sync::Arc};

use async_trait::async_trait;
use log::{debug, info, warn};

use super::{Applied, Platform, PlatformKind};
use crate::{
	command::{args, CommandOutput, CommandRunner},
	dns::{Interface, ServerList},
	error::SwitchError,
};

const NO_SERVERS: &str = "There aren't any DNS Servers set";

/// macOS driver. Interfaces here are network services, not devices.
pub struct Macos {
	runner: Arc<dyn CommandRunner>,
}

impl Macos {
	pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
		Self { runner }
	}

	async fn networksetup(&self, argv: Vec<String>) -> Result<CommandOutput, SwitchError> {
		self.runner
			.run("networksetup", &argv)
			.await?
			.check("networksetup")
	}

	async fn set(&self, iface: &Interface, values: Vec<String>) -> Result<(), SwitchError> {
		let mut argv = args(["-setdnsservers", iface.id.as_str()]);
		argv.extend(values);
		self.networksetup(argv)
			.await
			.map(drop)
			.map_err(|err| SwitchError::apply(&iface.id, err))
	}
}

fn parse_services(listing: &str) -> Vec<Interface> {
	listing
		.lines()
		.filter(|line| !line.trim().is_empty() && !line.starts_with("An asterisk"))
		.map(|line| match line.strip_prefix('*') {
			Some(disabled) => Interface::new(disabled.trim(), false),
			None => Interface::new(line.trim(), true),
		})
		.collect()
}

fn parse_servers(output: &str) -> ServerList {
	if output.contains(NO_SERVERS) {
		return ServerList::default();
	}

	ServerList::truncated(
		output
			.lines()
			.filter_map(|line| line.trim().parse::<Ipv4Addr>().ok()),
	)
}

#[async_trait]
impl Platform for Macos {
	fn kind(&self) -> PlatformKind {
		PlatformKind::Macos
	}

	async fn list_active_interfaces(&self) -> Result<Vec<Interface>, SwitchError> {
		let out = self
			.networksetup(args(["-listallnetworkservices"]))
			.await?;
		Ok(parse_services(&out.stdout))
	}

	async fn current_servers(&self, iface: &Interface) -> Result<ServerList, SwitchError> {
		let out = self
			.networksetup(args(["-getdnsservers", iface.id.as_str()]))
			.await?;
		Ok(parse_servers(&out.stdout))
	}

	async fn apply_servers(
		&self,
		iface: &Interface,
		servers: &ServerList,
	) -> Result<Applied, SwitchError> {
		self.set(iface, servers.to_strings()).await?;
		info!("networksetup: set {} on {}", servers, iface);
		Ok(Applied::by("networksetup"))
	}

	async fn reset_servers(&self, iface: &Interface) -> Result<Applied, SwitchError> {
		self.set(iface, args(["empty"])).await?;
		info!("networksetup: {} back on automatic", iface);
		Ok(Applied::by("networksetup"))
	}

	async fn flush_cache(&self) -> Result<&'static str, SwitchError> {
		let dscache = self
			.runner
			.run("dscacheutil", &args(["-flushcache"]))
			.await
			.and_then(|out| out.check("dscacheutil"));
		if let Err(err) = &dscache {
			debug!("dscacheutil: {}", err);
		}

		match self
			.runner
			.run("killall", &args(["-HUP", "mDNSResponder"]))
			.await
			.and_then(|out| out.check("killall"))
		{
			Ok(_) => Ok("mDNSResponder"),
			Err(err) if dscache.is_ok() => {
				warn!("mDNSResponder not signalled: {}", err);
				Ok("dscacheutil")
			}
			Err(err) => Err(SwitchError::Flush(format!(
				"{}; {}",
				dscache.err().map(|e| e.to_string()).unwrap_or_default(),
				err
			))),
		}
	}
}
