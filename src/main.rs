use std::{net::SocketAddr, path::PathBuf, process::exit, sync::Arc};

use clap::{Parser, Subcommand};
use dns_switch_api::{serve, ApiState};
use dns_switch_core::{
	install_logger, platform, CommandRunner, DnsSource, Guard, OperationResult, Orchestrator,
	Settings, SnapshotStore, SwitchError, SystemGuard, SystemRunner,
};
use log::{debug, error, info, warn};
use tokio::{net::TcpListener, runtime};

const EXIT_FAILED: i32 = 1;
const EXIT_CONFIG_SOURCE: i32 = 2;
const EXIT_PRIVILEGE: i32 = 3;
const EXIT_STARTUP: i32 = 4;

/// Point this host's DNS at the servers in a config file, and back.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// JSON settings file; flags and environment override it.
	#[arg(long, env = "DNS_SWITCH_SETTINGS", global = true)]
	settings: Option<PathBuf>,

	/// `Name=IPAddress` file to read servers from.
	#[arg(long, env = "DNS_SWITCH_SOURCE", global = true)]
	source: Option<PathBuf>,

	/// Where the original configuration is kept.
	#[arg(long, env = "DNS_SWITCH_SNAPSHOT", global = true)]
	snapshot: Option<PathBuf>,

	/// Resolver file to edit as a last resort (Linux).
	#[arg(long, env = "DNS_SWITCH_RESOLV_CONF", global = true)]
	resolv_conf: Option<PathBuf>,

	/// Seconds before an OS command is killed.
	#[arg(long, env = "DNS_SWITCH_COMMAND_TIMEOUT", global = true)]
	command_timeout: Option<u64>,

	/// off, error, warn, info, debug or trace.
	#[arg(long, env = "DNS_SWITCH_LOG", global = true)]
	log_level: Option<String>,

	/// Print results as JSON.
	#[arg(long, global = true)]
	json: bool,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Apply the first three valid servers of the config file (default).
	Apply,

	/// Put back the configuration from before the first apply.
	Restore,

	/// Show the servers in use now.
	Current,

	/// Serve the local control page and API.
	Serve {
		/// Address to listen on.
		#[arg(long, env = "DNS_SWITCH_LISTEN")]
		listen: Option<SocketAddr>,
	},
}

impl Cli {
	fn load_settings(&self) -> Result<Settings, SwitchError> {
		let mut settings = Settings::load(self.settings.as_deref())?;

		if let Some(source) = &self.source {
			settings.source = source.clone();
		}
		if let Some(snapshot) = &self.snapshot {
			settings.snapshot = snapshot.clone();
		}
		if let Some(resolv_conf) = &self.resolv_conf {
			settings.resolv_conf = Some(resolv_conf.clone());
		}
		if let Some(secs) = self.command_timeout {
			settings.command_timeout_secs = secs;
		}
		if let Some(level) = &self.log_level {
			settings.log_level = level.clone();
		}
		if let Some(Command::Serve {
			listen: Some(listen),
		}) = &self.command
		{
			settings.listen = *listen;
		}

		Ok(settings)
	}
}

fn main() {
	let cli = Cli::parse();

	let settings = match cli.load_settings() {
		Ok(settings) => settings,
		Err(err) => {
			eprintln!("{}: {}", env!("CARGO_PKG_NAME"), err);
			exit(EXIT_STARTUP);
		}
	};

	if let Err(err) = settings
		.level_filter()
		.and_then(install_logger)
	{
		eprintln!("{}: {}", env!("CARGO_PKG_NAME"), err);
		exit(EXIT_STARTUP);
	}
	debug!(
		"{} version {}",
		env!("CARGO_PKG_NAME"),
		env!("CARGO_PKG_VERSION")
	);
	debug!("settings={:?}", settings);

	let rt = match runtime::Builder::new_current_thread().enable_all().build() {
		Ok(rt) => rt,
		Err(err) => {
			error!("cannot start runtime: {}", err);
			exit(EXIT_STARTUP);
		}
	};

	let json = cli.json;
	let command = cli.command.unwrap_or(Command::Apply);
	exit(rt.block_on(run(command, settings, json)));
}

async fn run(command: Command, settings: Settings, json: bool) -> i32 {
	let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new(settings.command_timeout()));
	let platform = match platform::detect(runner.clone(), settings.resolv_conf.clone()) {
		Ok(platform) => platform,
		Err(err) => {
			error!("{}", err);
			return EXIT_STARTUP;
		}
	};
	info!("{} platform", platform.kind());

	let guard = SystemGuard::new(runner);
	let elevated = guard.ensure_elevated().await;
	let orchestrator = Orchestrator::new(
		Box::new(guard),
		platform,
		SnapshotStore::new(&settings.snapshot),
	);

	match command {
		Command::Apply => {
			if let Err(err) = elevated {
				error!("{}", err);
				return EXIT_PRIVILEGE;
			}

			let servers = match DnsSource::load(&settings.source).and_then(|s| s.servers()) {
				Ok(servers) => servers,
				Err(err) => {
					error!("{}", err);
					return EXIT_CONFIG_SOURCE;
				}
			};
			info!("using {} from {}", servers, settings.source.display());

			report(orchestrator.apply(&servers).await, json)
		}
		Command::Restore => {
			if let Err(err) = elevated {
				error!("{}", err);
				return EXIT_PRIVILEGE;
			}

			report(orchestrator.restore().await, json)
		}
		Command::Current => report(orchestrator.current().await, json),
		Command::Serve { .. } => {
			if let Err(err) = elevated {
				warn!("{}; changes requested through the page will fail", err);
			}

			let listener = match TcpListener::bind(settings.listen).await {
				Ok(listener) => listener,
				Err(err) => {
					error!("cannot listen on {}: {}", settings.listen, err);
					return EXIT_STARTUP;
				}
			};

			match serve(listener, ApiState::new(orchestrator, settings.source)).await {
				Ok(()) => 0,
				Err(err) => {
					error!("server stopped: {}", err);
					EXIT_FAILED
				}
			}
		}
	}
}

fn report(result: OperationResult, json: bool) -> i32 {
	if json {
		match serde_json::to_string(&result) {
			Ok(text) => println!("{}", text),
			Err(err) => {
				error!("cannot encode result: {}", err);
				return EXIT_FAILED;
			}
		}
	} else {
		println!("{}", result.message);
	}

	result.code()
}
