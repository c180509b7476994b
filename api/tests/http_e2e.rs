use std::{fs, io::ErrorKind, net::SocketAddr};

use dns_switch_api::{serve, ApiState};
use dns_switch_core::{
	platform::PlatformKind,
	testing::{AllowGuard, FakePlatform},
	Orchestrator, SnapshotStore,
};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
	base_url: String,
	client: Client,
	fake: FakePlatform,
	dir: TempDir,
	_handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
	async fn start() -> Option<Self> {
		let dir = TempDir::new().unwrap();
		let source = dir.path().join("dnsConf.txt");
		fs::write(
			&source,
			"# resolvers\nCloudflare=1.1.1.1\nGoogle=8.8.8.8\nLocal=localhost\n",
		)
		.unwrap();

		let fake = FakePlatform::new(PlatformKind::Linux).with_interface("eth0", true, &[]);
		let orchestrator = Orchestrator::new(
			Box::new(AllowGuard),
			Box::new(fake.clone()),
			SnapshotStore::new(dir.path().join("original_dns_config.json")),
		);

		let listener = match TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await {
			Ok(listener) => listener,
			Err(err) if err.kind() == ErrorKind::PermissionDenied => {
				eprintln!("skipping http e2e: cannot bind a local listener");
				return None;
			}
			Err(err) => panic!("bind: {}", err),
		};
		let addr = listener.local_addr().unwrap();

		let state = ApiState::new(orchestrator, source);
		let handle = tokio::spawn(async move {
			let _ = serve(listener, state).await;
		});

		Some(Self {
			base_url: format!("http://{}", addr),
			client: Client::new(),
			fake,
			dir,
			_handle: handle,
		})
	}

	async fn get(&self, path: &str) -> reqwest::Response {
		self.client
			.get(format!("{}{}", self.base_url, path))
			.send()
			.await
			.unwrap()
	}

	async fn post(&self, path: &str, body: Option<Value>) -> (StatusCode, Value) {
		let mut req = self.client.post(format!("{}{}", self.base_url, path));
		if let Some(body) = body {
			req = req.json(&body);
		}
		let res = req.send().await.unwrap();
		(res.status(), res.json().await.unwrap())
	}

	fn snapshot_exists(&self) -> bool {
		self.dir.path().join("original_dns_config.json").exists()
	}
}

#[tokio::test]
async fn config_lists_entries_unfiltered() {
	let Some(server) = TestServer::start().await else {
		return;
	};

	let body: Value = server.get("/dns-config").await.json().await.unwrap();
	assert_eq!(
		body,
		json!({
			"success": true,
			"entries": [
				{ "name": "Cloudflare", "address": "1.1.1.1" },
				{ "name": "Google", "address": "8.8.8.8" },
				{ "name": "Local", "address": "localhost" },
			],
		})
	);
}

#[tokio::test]
async fn set_then_restore() {
	let Some(server) = TestServer::start().await else {
		return;
	};

	let (status, body) = server
		.post("/set-dns", Some(json!({ "dns": ["1.1.1.1", "8.8.8.8"] })))
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["success"], json!(true), "{}", body);
	assert!(body.get("dns").is_none());
	assert_eq!(
		server.fake.servers("eth0").to_strings(),
		vec!["1.1.1.1", "8.8.8.8"]
	);
	assert!(server.snapshot_exists());

	let current: Value = server.get("/current-dns").await.json().await.unwrap();
	assert_eq!(current["dns"], json!(["1.1.1.1", "8.8.8.8"]));

	let (status, body) = server.post("/restore-dns", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["success"], json!(true), "{}", body);
	assert!(server.fake.servers("eth0").is_automatic());
	assert!(!server.snapshot_exists());

	let (_, body) = server.post("/restore-dns", None).await;
	assert_eq!(
		body,
		json!({ "success": false, "message": "nothing to restore" })
	);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
	let Some(server) = TestServer::start().await else {
		return;
	};

	let res = server
		.client
		.post(format!("{}/set-dns", server.base_url))
		.header("content-type", "application/json")
		.body("{ not json")
		.send()
		.await
		.unwrap();
	assert_eq!(res.status(), StatusCode::BAD_REQUEST);
	let body: Value = res.json().await.unwrap();
	assert_eq!(body["success"], json!(false));
	assert!(body["message"].is_string());

	let (status, body) = server
		.post("/set-dns", Some(json!({ "servers": ["1.1.1.1"] })))
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["success"], json!(false));

	assert!(!server.snapshot_exists());
	assert_eq!(server.fake.applies(), 0);
}

#[tokio::test]
async fn invalid_address_is_rejected() {
	let Some(server) = TestServer::start().await else {
		return;
	};

	let (status, body) = server
		.post("/set-dns", Some(json!({ "dns": ["1.1.1.1", "dns.google"] })))
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["success"], json!(false));
	assert!(
		body["message"].as_str().unwrap().contains("dns.google"),
		"{}",
		body
	);
	assert_eq!(server.fake.applies(), 0);
}

#[tokio::test]
async fn entries_past_the_third_are_ignored() {
	let Some(server) = TestServer::start().await else {
		return;
	};

	let (status, body) = server
		.post(
			"/set-dns",
			Some(json!({ "dns": ["1.1.1.1", "8.8.8.8", "9.9.9.9", "bogus"] })),
		)
		.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["success"], json!(true), "{}", body);
	assert_eq!(
		server.fake.servers("eth0").to_strings(),
		vec!["1.1.1.1", "8.8.8.8", "9.9.9.9"]
	);
}

#[tokio::test]
async fn empty_list_is_a_failed_operation() {
	let Some(server) = TestServer::start().await else {
		return;
	};

	let (status, body) = server.post("/set-dns", Some(json!({ "dns": [] }))).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		body,
		json!({ "success": false, "message": "no DNS servers provided" })
	);
}

#[tokio::test]
async fn other_paths_serve_the_page() {
	let Some(server) = TestServer::start().await else {
		return;
	};

	for path in ["/", "/index.html", "/anything/else"] {
		let res = server.get(path).await;
		assert_eq!(res.status(), StatusCode::OK);
		assert!(res.headers()["content-type"]
			.to_str()
			.unwrap()
			.starts_with("text/html"));
		assert!(res.text().await.unwrap().contains("dns-switch"));
	}
}
