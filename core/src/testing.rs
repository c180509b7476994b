//! Test doubles for the host-facing seams.
//!
//! Only compiled for this crate's tests, or for dependents enabling the
//! **testing** feature.

use std::{
	collections::HashSet,
	sync::{Arc, Mutex},
	time::Duration,
};

use async_trait::async_trait;

use crate::{
	command::{CommandOutput, CommandRunner},
	dns::{Interface, ResolverFlags, ServerList},
	error::SwitchError,
	guard::Guard,
	platform::{Applied, Platform, PlatformKind},
};

#[derive(Clone, Debug)]
enum Scripted {
	Output(CommandOutput),
	Timeout,
}

/// A [`CommandRunner`] answering from a script.
///
/// Rules match on a prefix of the full command line (program and arguments
/// joined by single spaces); the first matching rule wins. A program that was
/// not declared with [`tool`][Self::tool] is missing. A declared program with
/// no matching rule exits 1.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
	tools: HashSet<String>,
	rules: Vec<(String, Scripted)>,
	calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn tool(mut self, program: &str) -> Self {
		self.tools.insert(program.into());
		self
	}

	pub fn on(mut self, prefix: &str, output: CommandOutput) -> Self {
		self.tools
			.insert(prefix.split(' ').next().unwrap_or_default().into());
		self.rules.push((prefix.into(), Scripted::Output(output)));
		self
	}

	pub fn timeout_on(mut self, prefix: &str) -> Self {
		self.tools
			.insert(prefix.split(' ').next().unwrap_or_default().into());
		self.rules.push((prefix.into(), Scripted::Timeout));
		self
	}

	/// Every command line run so far, in order.
	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap().clone()
	}

	/// Whether any command line run so far starts with `prefix`.
	pub fn ran(&self, prefix: &str) -> bool {
		self.calls().iter().any(|c| c.starts_with(prefix))
	}
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
	async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, SwitchError> {
		let line = std::iter::once(program.to_string())
			.chain(args.iter().cloned())
			.collect::<Vec<_>>()
			.join(" ");
		self.calls.lock().unwrap().push(line.clone());

		if !self.tools.contains(program) {
			return Err(SwitchError::MissingTool(program.into()));
		}

		match self.rules.iter().find(|(prefix, _)| line.starts_with(prefix.as_str())) {
			Some((_, Scripted::Output(out))) => Ok(out.clone()),
			Some((_, Scripted::Timeout)) => Err(SwitchError::Timeout {
				program: program.into(),
				after: Duration::from_secs(15),
			}),
			None => Ok(CommandOutput::failed(1, format!("unscripted: {}", line))),
		}
	}

	fn available(&self, program: &str) -> bool {
		self.tools.contains(program)
	}
}

/// Lets everything through.
pub struct AllowGuard;

#[async_trait]
impl Guard for AllowGuard {
	async fn ensure_elevated(&self) -> Result<(), SwitchError> {
		Ok(())
	}
}

/// Refuses everything.
pub struct DenyGuard;

#[async_trait]
impl Guard for DenyGuard {
	async fn ensure_elevated(&self) -> Result<(), SwitchError> {
		Err(SwitchError::PermissionDenied("not root".into()))
	}
}

/// Simulated host state behind a [`FakePlatform`].
#[derive(Debug, Default)]
pub struct FakeHost {
	pub interfaces: Vec<(Interface, ServerList)>,
	pub flags: ResolverFlags,
	pub has_flags: bool,
	pub failing: HashSet<String>,
	pub flush_fails: bool,
	pub captures_read: usize,
	pub applies: usize,
}

/// An in-memory [`Platform`]; clones share the same host.
#[derive(Clone, Debug)]
pub struct FakePlatform {
	kind: PlatformKind,
	host: Arc<Mutex<FakeHost>>,
}

impl FakePlatform {
	pub fn new(kind: PlatformKind) -> Self {
		Self {
			kind,
			host: Default::default(),
		}
	}

	pub fn with_interface(self, id: &str, up: bool, servers: &[&str]) -> Self {
		self.host.lock().unwrap().interfaces.push((
			Interface::new(id, up),
			ServerList::parse(servers).expect("valid test servers"),
		));
		self
	}

	pub fn with_flags(self, flags: ResolverFlags) -> Self {
		{
			let mut host = self.host.lock().unwrap();
			host.flags = flags;
			host.has_flags = true;
		}
		self
	}

	pub fn fail_interface(&self, id: &str) {
		self.host.lock().unwrap().failing.insert(id.into());
	}

	pub fn heal_interface(&self, id: &str) {
		self.host.lock().unwrap().failing.remove(id);
	}

	pub fn fail_flush(&self, fails: bool) {
		self.host.lock().unwrap().flush_fails = fails;
	}

	pub fn servers(&self, id: &str) -> ServerList {
		self.host
			.lock()
			.unwrap()
			.interfaces
			.iter()
			.find(|(i, _)| i.id == id)
			.map(|(_, s)| s.clone())
			.unwrap_or_default()
	}

	pub fn flags(&self) -> ResolverFlags {
		self.host.lock().unwrap().flags
	}

	pub fn applies(&self) -> usize {
		self.host.lock().unwrap().applies
	}

	pub fn captures_read(&self) -> usize {
		self.host.lock().unwrap().captures_read
	}

	fn set(&self, iface: &Interface, servers: ServerList) -> Result<Applied, SwitchError> {
		let mut host = self.host.lock().unwrap();
		if host.failing.contains(&iface.id) {
			return Err(SwitchError::apply(&iface.id, "simulated failure"));
		}

		host.applies += 1;
		match host.interfaces.iter_mut().find(|(i, _)| i.id == iface.id) {
			Some((_, s)) => {
				*s = servers;
				Ok(Applied::by("fake"))
			}
			None => Err(SwitchError::apply(&iface.id, "no such interface")),
		}
	}
}

#[async_trait]
impl Platform for FakePlatform {
	fn kind(&self) -> PlatformKind {
		self.kind
	}

	async fn list_active_interfaces(&self) -> Result<Vec<Interface>, SwitchError> {
		Ok(self
			.host
			.lock()
			.unwrap()
			.interfaces
			.iter()
			.map(|(i, _)| i.clone())
			.collect())
	}

	async fn current_servers(&self, iface: &Interface) -> Result<ServerList, SwitchError> {
		self.host.lock().unwrap().captures_read += 1;
		Ok(self.servers(&iface.id))
	}

	async fn apply_servers(
		&self,
		iface: &Interface,
		servers: &ServerList,
	) -> Result<Applied, SwitchError> {
		self.set(iface, servers.clone())
	}

	async fn reset_servers(&self, iface: &Interface) -> Result<Applied, SwitchError> {
		self.set(iface, ServerList::default())
	}

	async fn flush_cache(&self) -> Result<&'static str, SwitchError> {
		if self.host.lock().unwrap().flush_fails {
			Err(SwitchError::Flush("simulated failure".into()))
		} else {
			Ok("fake")
		}
	}

	fn has_flags(&self) -> bool {
		self.host.lock().unwrap().has_flags
	}

	async fn read_flags(&self) -> Result<ResolverFlags, SwitchError> {
		Ok(self.flags())
	}

	async fn disable_flags(&self) -> Result<(), SwitchError> {
		self.host.lock().unwrap().flags = ResolverFlags {
			secure_resolution: Some(false),
			name_resolution_matching: Some(false),
		};
		Ok(())
	}

	async fn restore_flags(&self, flags: &ResolverFlags) -> Result<(), SwitchError> {
		self.host.lock().unwrap().flags = *flags;
		Ok(())
	}
}
