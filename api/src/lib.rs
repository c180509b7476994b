//! Local HTTP control surface for dns-switch.
//!
//! One listener, one [`Orchestrator`] behind an async mutex: requests that
//! touch host state are handled strictly one after another.
//!
//! | Route | |
//! |---|---|
//! | `GET /current-dns` | servers in use now |
//! | `GET /dns-config` | entries of the config source file |
//! | `POST /set-dns` | apply `{"dns": [...]}` |
//! | `POST /restore-dns` | restore the snapshot |
//! | any other `GET` | the control page |

use std::{io, path::PathBuf, sync::Arc};

use axum::{
	routing::{get, post},
	Router,
};
use dns_switch_core::Orchestrator;
use log::info;
use tokio::{net::TcpListener, sync::Mutex};

mod handlers;

/// State shared across handlers.
#[derive(Clone)]
pub struct ApiState {
	orchestrator: Arc<Mutex<Orchestrator>>,
	source: Arc<PathBuf>,
}

impl ApiState {
	/// `source` is the `Name=IPAddress` file behind `/dns-config`.
	pub fn new(orchestrator: Orchestrator, source: impl Into<PathBuf>) -> Self {
		Self {
			orchestrator: Arc::new(Mutex::new(orchestrator)),
			source: Arc::new(source.into()),
		}
	}
}

/// Builds the router with every route.
pub fn create_app(state: ApiState) -> Router {
	Router::new()
		.route("/current-dns", get(handlers::current_dns))
		.route("/dns-config", get(handlers::dns_config))
		.route("/set-dns", post(handlers::set_dns))
		.route("/restore-dns", post(handlers::restore_dns))
		.fallback(handlers::page)
		.with_state(state)
}

/// Serves the API on `listener` until the process ends.
pub async fn serve(listener: TcpListener, state: ApiState) -> io::Result<()> {
	info!("control page at http://{}/", listener.local_addr()?);
	axum::serve(listener, create_app(state)).await
}
