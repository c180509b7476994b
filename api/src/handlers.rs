use axum::{
	extract::{rejection::JsonRejection, State},
	http::{Method, StatusCode},
	response::{Html, IntoResponse, Response},
	Json,
};
use dns_switch_core::{dns::ServerList, DnsEntry, DnsSource, OperationResult};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::ApiState;

const PAGE: &str = include_str!("../static/index.html");

#[derive(Debug, Deserialize)]
pub struct SetDns {
	dns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfigReply {
	success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	entries: Option<Vec<DnsEntry>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	message: Option<String>,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<OperationResult>) {
	let message = message.into();
	warn!("rejected request: {}", message);
	(
		StatusCode::BAD_REQUEST,
		Json(OperationResult::failure(message)),
	)
}

pub async fn current_dns(State(state): State<ApiState>) -> Json<OperationResult> {
	let orchestrator = state.orchestrator.lock().await;
	Json(orchestrator.current().await)
}

pub async fn dns_config(State(state): State<ApiState>) -> Json<ConfigReply> {
	Json(match DnsSource::load(state.source.as_path()) {
		Ok(source) => ConfigReply {
			success: true,
			entries: Some(source.entries().to_vec()),
			message: None,
		},
		Err(err) => ConfigReply {
			success: false,
			entries: None,
			message: Some(err.to_string()),
		},
	})
}

pub async fn set_dns(
	State(state): State<ApiState>,
	body: Result<Json<SetDns>, JsonRejection>,
) -> (StatusCode, Json<OperationResult>) {
	let Json(body) = match body {
		Ok(body) => body,
		Err(rejection) => return bad_request(rejection.body_text()),
	};

	let servers = match ServerList::parse(body.dns.as_slice()) {
		Ok(servers) => servers,
		Err(err) => return bad_request(err.to_string()),
	};

	info!("set-dns requested: {}", servers);
	let orchestrator = state.orchestrator.lock().await;
	(StatusCode::OK, Json(orchestrator.apply(&servers).await))
}

pub async fn restore_dns(State(state): State<ApiState>) -> Json<OperationResult> {
	info!("restore-dns requested");
	let orchestrator = state.orchestrator.lock().await;
	Json(orchestrator.restore().await)
}

pub async fn page(method: Method) -> Response {
	if method == Method::GET {
		Html(PAGE).into_response()
	} else {
		debug!("no route for {}", method);
		(
			StatusCode::METHOD_NOT_ALLOWED,
			Json(OperationResult::failure("method not allowed")),
		)
			.into_response()
	}
}
