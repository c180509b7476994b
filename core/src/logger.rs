use std::{fs::OpenOptions, path::PathBuf};

use log::LevelFilter;

use crate::error::SwitchError;

const LOG_FILE: &str = "dns-switch.log";

/// Install the standard logger.
///
/// This logger emits messages at `level` and above to STDERR, and emits all
/// messages from `debug` level up to a log file in development and when the
/// **release-logs** feature is enabled.
///
/// In development (when `debug_assertions` are enabled), it logs to the current
/// working directory, and otherwise logs to `/var/log/dns-switch/dns-switch.log`,
/// creating the directory if it does not exist.
///
/// Fails if the log file cannot be opened or a logger is already installed.
pub fn install_logger(level: LevelFilter) -> Result<(), SwitchError> {
	use simplelog::*;

	let mut config = ConfigBuilder::new();
	config.set_thread_level(LevelFilter::Off);
	config.set_target_level(LevelFilter::Debug);
	let config = config.build();

	let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
		level,
		config.clone(),
		TerminalMode::Stderr,
		ColorChoice::Auto,
	)];

	if cfg!(any(debug_assertions, feature = "release-logs")) {
		let logdir = if cfg!(debug_assertions) {
			std::env::current_dir()?
		} else {
			PathBuf::from("/var/log/dns-switch")
		};

		std::fs::create_dir_all(&logdir)?;
		loggers.push(WriteLogger::new(
			LevelFilter::Debug,
			config,
			OpenOptions::new()
				.append(true)
				.create(true)
				.open(logdir.join(LOG_FILE))?,
		));
	}

	CombinedLogger::init(loggers)?;
	Ok(())
}
