//! Switch a host's DNS resolvers to a chosen list, and back.
//!
//! The first [`apply`][Orchestrator::apply] records what every active
//! interface was using in a [`SnapshotStore`]; [`restore`][Orchestrator::restore]
//! replays that record and forgets it. Host differences live behind the
//! [`Platform`][platform::Platform] trait, and every OS command goes through a
//! [`CommandRunner`].
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use dns_switch_core::{
//!     install_logger, platform, DnsSource, Orchestrator, Settings, SnapshotStore, SystemGuard,
//!     SystemRunner,
//! };
//!
//! # async fn run() -> Result<(), dns_switch_core::SwitchError> {
//! let settings = Settings::load(None)?;
//! install_logger(settings.level_filter()?)?;
//!
//! let runner = Arc::new(SystemRunner::new(settings.command_timeout()));
//! let orchestrator = Orchestrator::new(
//!     Box::new(SystemGuard::new(runner.clone())),
//!     platform::detect(runner, settings.resolv_conf.clone())?,
//!     SnapshotStore::new(&settings.snapshot),
//! );
//!
//! let servers = DnsSource::load(&settings.source)?.servers()?;
//! println!("{}", orchestrator.apply(&servers).await.message);
//! # Ok(())
//! # }
//! ```

pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use config::Settings;
pub use error::SwitchError;
pub use guard::{Guard, SystemGuard};
pub use logger::install_logger;
pub use orchestrator::{Orchestrator, State};
pub use reply::OperationResult;
pub use snapshot::{Snapshot, SnapshotStore};
pub use source::{DnsEntry, DnsSource};

pub mod command;
pub mod config;
pub mod dns;
pub mod error;
pub mod guard;
pub mod platform;
pub mod reply;
pub mod snapshot;
pub mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

mod logger;
mod orchestrator;
