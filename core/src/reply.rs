use std::net::Ipv4Addr;

use log::debug;
use serde::{Deserialize, Serialize};

/// Outcome of an apply, restore, or query operation.
///
/// This is what the CLI prints and what the HTTP API serialises, as
/// `{"success": …, "message": …}`. The `dns` field is only present on query
/// results.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperationResult {
	pub success: bool,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dns: Option<Vec<Ipv4Addr>>,
}

impl OperationResult {
	pub fn success(message: impl Into<String>) -> Self {
		let reply = Self {
			success: true,
			message: message.into(),
			dns: None,
		};
		debug!("replying with {:?}", reply);
		reply
	}

	pub fn failure(message: impl Into<String>) -> Self {
		let reply = Self {
			success: false,
			message: message.into(),
			dns: None,
		};
		debug!("replying with {:?}", reply);
		reply
	}

	pub fn with_dns(mut self, dns: Vec<Ipv4Addr>) -> Self {
		self.dns = Some(dns);
		self
	}

	/// Exit code for the CLI: 0 on success, 1 otherwise.
	pub fn code(&self) -> i32 {
		if self.success {
			0
		} else {
			1
		}
	}
}

#[test]
fn test_serialises_without_dns() {
	let r = OperationResult::failure("nothing to restore");
	assert_eq!(
		serde_json::to_value(&r).unwrap(),
		serde_json::json!({ "success": false, "message": "nothing to restore" })
	);
}

#[test]
fn test_serialises_with_dns() {
	let r = OperationResult::success("2 servers").with_dns(vec![
		"1.1.1.1".parse().unwrap(),
		"8.8.8.8".parse().unwrap(),
	]);
	assert_eq!(
		serde_json::to_value(&r).unwrap(),
		serde_json::json!({
			"success": true,
			"message": "2 servers",
			"dns": ["1.1.1.1", "8.8.8.8"],
		})
	);
}
