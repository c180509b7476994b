//! The apply/restore state machine.
//!
//! ```text
//! Idle --apply--> Applying --> Applied --restore--> Restoring --> Idle
//! ```
//!
//! The resting state is never held in memory: it is whether the snapshot store
//! holds a record, read again on every call.

use std::{collections::BTreeMap, fmt, net::Ipv4Addr};

use log::{debug, info, warn};

use crate::{
	dns::{Interface, ResolverFlags, ServerList, MAX_SERVERS},
	error::SwitchError,
	guard::Guard,
	platform::Platform,
	reply::OperationResult,
	snapshot::{Snapshot, SnapshotStore},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
	/// No snapshot; the host runs its original configuration.
	Idle,
	Applying,
	/// A snapshot is held and custom servers are (at least partly) in place.
	Applied,
	Restoring,
}

impl fmt::Display for State {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Idle => "idle",
			Self::Applying => "applying",
			Self::Applied => "applied",
			Self::Restoring => "restoring",
		})
	}
}

fn transition(from: State, to: State) {
	info!("state: {} -> {}", from, to);
}

/// Sequences guard, snapshot store and platform into whole operations.
///
/// Every operation returns an [`OperationResult`]; errors never escape.
pub struct Orchestrator {
	guard: Box<dyn Guard>,
	platform: Box<dyn Platform>,
	store: SnapshotStore,
}

impl Orchestrator {
	pub fn new(guard: Box<dyn Guard>, platform: Box<dyn Platform>, store: SnapshotStore) -> Self {
		Self {
			guard,
			platform,
			store,
		}
	}

	pub fn state(&self) -> State {
		if self.store.exists() {
			State::Applied
		} else {
			State::Idle
		}
	}

	pub fn store(&self) -> &SnapshotStore {
		&self.store
	}

	/// Points every active interface at `servers` (first three only).
	///
	/// The configuration in place before the first apply is captured once;
	/// applying again while a snapshot is held leaves it untouched.
	pub async fn apply(&self, servers: &[Ipv4Addr]) -> OperationResult {
		self.try_apply(servers)
			.await
			.unwrap_or_else(SwitchError::into_reply)
	}

	/// Puts back whatever the snapshot recorded, then forgets it.
	///
	/// The snapshot is only cleared if every interface and flag was restored,
	/// so a failed restore can simply be retried.
	pub async fn restore(&self) -> OperationResult {
		self.try_restore()
			.await
			.unwrap_or_else(SwitchError::into_reply)
	}

	/// Reports the servers in effect now. Needs no privileges.
	pub async fn current(&self) -> OperationResult {
		self.try_current()
			.await
			.unwrap_or_else(SwitchError::into_reply)
	}

	async fn active_interfaces(&self) -> Result<Vec<Interface>, SwitchError> {
		let all = self.platform.list_active_interfaces().await?;
		debug!("{} interface(s) found: {:?}", all.len(), all);
		Ok(all.into_iter().filter(|i| i.up).collect())
	}

	async fn capture(&self, active: &[Interface]) -> Result<(), SwitchError> {
		let mut interfaces = BTreeMap::new();
		for iface in active {
			let servers = self.platform.current_servers(iface).await?;
			debug!("{} currently uses {}", iface, servers);
			interfaces.insert(iface.id.clone(), servers);
		}

		let flags = if self.platform.has_flags() {
			self.platform.read_flags().await?
		} else {
			ResolverFlags::default()
		};

		let snapshot = Snapshot {
			platform: self.platform.kind(),
			interfaces,
			flags,
		};
		match self.store.capture(&snapshot) {
			Err(SwitchError::SnapshotExists(path)) => {
				debug!("snapshot appeared at {} meanwhile, keeping it", path.display());
				Ok(())
			}
			other => other,
		}
	}

	async fn try_apply(&self, servers: &[Ipv4Addr]) -> Result<OperationResult, SwitchError> {
		self.guard.ensure_elevated().await?;

		if servers.len() > MAX_SERVERS {
			debug!("only the first {} of {} servers are used", MAX_SERVERS, servers.len());
		}
		let servers = ServerList::truncated(servers.iter().copied());
		if servers.is_automatic() {
			return Ok(OperationResult::failure("no DNS servers provided"));
		}

		let active = self.active_interfaces().await?;
		if active.is_empty() {
			return Ok(OperationResult::failure("no active network interfaces found"));
		}

		let from = self.state();
		transition(from, State::Applying);
		if from == State::Idle {
			self.capture(&active).await?;
		} else {
			info!("keeping the snapshot at {}", self.store.path().display());
		}

		let mut done = 0;
		let mut notes = Vec::new();
		for iface in &active {
			match self.platform.apply_servers(iface, &servers).await {
				Ok(applied) => {
					info!("{}: {} via {}", iface, servers, applied.method);
					done += 1;
					if let Some(warning) = applied.warning {
						notes.push(format!("{}: {}", iface, warning));
					}
				}
				Err(err) => {
					warn!("{}", err);
					notes.push(err.to_string());
				}
			}
		}

		if self.platform.has_flags() {
			if let Err(err) = self.platform.disable_flags().await {
				warn!("resolver flags: {}", err);
				notes.push(format!("resolver flags left as they were: {}", err));
			}
		}

		match self.platform.flush_cache().await {
			Ok(method) => debug!("flushed resolver cache via {}", method),
			Err(err) => {
				warn!("{}", err);
				notes.push(err.to_string());
			}
		}

		transition(State::Applying, State::Applied);

		let mut message = if done == 0 {
			"could not apply DNS to any interface".to_string()
		} else {
			format!(
				"DNS set to {} on {} of {} interface(s)",
				servers,
				done,
				active.len()
			)
		};
		if !notes.is_empty() {
			message = format!("{}; {}", message, notes.join("; "));
		}

		Ok(if done == 0 {
			OperationResult::failure(message)
		} else {
			OperationResult::success(message)
		})
	}

	async fn try_restore(&self) -> Result<OperationResult, SwitchError> {
		self.guard.ensure_elevated().await?;

		let snapshot = self.store.load()?;
		if snapshot.platform != self.platform.kind() {
			return Err(SwitchError::store(
				self.store.path(),
				format!(
					"captured on {}, cannot replay on {}",
					snapshot.platform,
					self.platform.kind()
				),
			));
		}

		transition(State::Applied, State::Restoring);

		let mut failures = Vec::new();
		for (id, servers) in &snapshot.interfaces {
			let iface = Interface::new(id.as_str(), true);
			let outcome = if servers.is_automatic() {
				self.platform.reset_servers(&iface).await
			} else {
				self.platform.restore_servers(&iface, servers).await
			};

			match outcome {
				Ok(applied) => info!("{}: back to {} via {}", iface, servers, applied.method),
				Err(err) => {
					warn!("{}", err);
					failures.push(err.to_string());
				}
			}
		}

		if self.platform.has_flags() {
			if let Err(err) = self.platform.restore_flags(&snapshot.flags).await {
				warn!("resolver flags: {}", err);
				failures.push(format!("resolver flags: {}", err));
			}
		}

		let mut notes = Vec::new();
		if let Err(err) = self.platform.flush_cache().await {
			warn!("{}", err);
			notes.push(err.to_string());
		}

		if !failures.is_empty() {
			transition(State::Restoring, State::Applied);
			failures.extend(notes);
			return Ok(OperationResult::failure(format!(
				"restore incomplete, snapshot kept for another try: {}",
				failures.join("; ")
			)));
		}

		self.store.clear()?;
		transition(State::Restoring, State::Idle);

		let mut message = format!(
			"original DNS restored on {} interface(s)",
			snapshot.interfaces.len()
		);
		if !notes.is_empty() {
			message = format!("{}; {}", message, notes.join("; "));
		}
		Ok(OperationResult::success(message))
	}

	async fn try_current(&self) -> Result<OperationResult, SwitchError> {
		let mut seen = Vec::with_capacity(MAX_SERVERS);
		for iface in self.active_interfaces().await? {
			match self.platform.effective_servers(&iface).await {
				Ok(servers) => {
					for server in servers.iter() {
						if seen.len() < MAX_SERVERS && !seen.contains(server) {
							seen.push(*server);
						}
					}
				}
				Err(err) => warn!("{}: {}", iface, err),
			}

			if seen.len() == MAX_SERVERS {
				break;
			}
		}

		let message = format!("current DNS: {}", ServerList::truncated(seen.iter().copied()));
		Ok(OperationResult::success(message).with_dns(seen))
	}
}
