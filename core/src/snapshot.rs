//! Durable record of the DNS configuration before the first change.

use std::{
	collections::BTreeMap,
	fs,
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
	dns::{ResolverFlags, ServerList},
	error::SwitchError,
	platform::PlatformKind,
};

/// Default location of the snapshot file, relative to the working directory.
pub const DEFAULT_SNAPSHOT_FILE: &str = "original_dns_config.json";

/// The host's DNS configuration as it was before any change.
///
/// Interfaces map to the servers they had; an empty list means the interface
/// was on automatic assignment.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
	/// Which adapter captured this, and so which can replay it.
	pub platform: PlatformKind,

	pub interfaces: BTreeMap<String, ServerList>,

	#[serde(default)]
	pub flags: ResolverFlags,
}

/// File-backed store holding at most one [`Snapshot`].
#[derive(Clone, Debug)]
pub struct SnapshotStore {
	path: PathBuf,
}

impl SnapshotStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn exists(&self) -> bool {
		self.path.exists()
	}

	/// Persists the snapshot, unless one is already there.
	///
	/// The record is written to a temporary file beside the target and then
	/// moved into place without clobbering, so a reader never sees a partial
	/// file and a concurrent capture cannot replace the first one.
	pub fn capture(&self, snapshot: &Snapshot) -> Result<(), SwitchError> {
		if self.exists() {
			return Err(SwitchError::SnapshotExists(self.path.clone()));
		}

		let dir = match self.path.parent() {
			Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
			_ => PathBuf::from("."),
		};
		fs::create_dir_all(&dir).map_err(|err| SwitchError::store(&dir, err))?;

		let mut tmp = NamedTempFile::new_in(&dir).map_err(|err| SwitchError::store(&dir, err))?;
		debug!("writing snapshot to {}", tmp.path().display());
		serde_json::to_writer_pretty(&mut tmp, snapshot)?;
		tmp.write_all(b"\n")
			.and_then(|_| tmp.as_file().sync_all())
			.map_err(|err| SwitchError::store(tmp.path(), err))?;

		tmp.persist_noclobber(&self.path).map_err(|err| {
			if err.error.kind() == ErrorKind::AlreadyExists {
				SwitchError::SnapshotExists(self.path.clone())
			} else {
				SwitchError::store(&self.path, err.error)
			}
		})?;

		info!(
			"captured {} interface(s) to {}",
			snapshot.interfaces.len(),
			self.path.display()
		);
		Ok(())
	}

	pub fn load(&self) -> Result<Snapshot, SwitchError> {
		let text = match fs::read_to_string(&self.path) {
			Ok(text) => text,
			Err(err) if err.kind() == ErrorKind::NotFound => return Err(SwitchError::NotFound),
			Err(err) => return Err(SwitchError::store(&self.path, err)),
		};

		serde_json::from_str(&text).map_err(|err| SwitchError::store(&self.path, err))
	}

	/// Removes the record. Does nothing if there is none.
	pub fn clear(&self) -> Result<(), SwitchError> {
		match fs::remove_file(&self.path) {
			Ok(()) => {
				info!("cleared snapshot at {}", self.path.display());
				Ok(())
			}
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
			Err(err) => Err(SwitchError::store(&self.path, err)),
		}
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn sample() -> Snapshot {
		let mut interfaces = BTreeMap::new();
		interfaces.insert("eth0".to_string(), ServerList::default());
		interfaces.insert(
			"Wi-Fi 2".to_string(),
			ServerList::parse(&["192.168.1.1", "9.9.9.9"]).unwrap(),
		);
		Snapshot {
			platform: PlatformKind::Windows,
			interfaces,
			flags: ResolverFlags {
				secure_resolution: None,
				name_resolution_matching: Some(false),
			},
		}
	}

	#[test]
	fn round_trip() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::new(dir.path().join("state/original.json"));
		assert!(!store.exists());

		store.capture(&sample()).unwrap();
		assert!(store.exists());
		assert_eq!(store.load().unwrap(), sample());
	}

	#[test]
	fn first_capture_wins() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::new(dir.path().join("original.json"));
		store.capture(&sample()).unwrap();

		let mut other = sample();
		other.interfaces.clear();
		assert!(matches!(
			store.capture(&other),
			Err(SwitchError::SnapshotExists(_))
		));
		assert_eq!(store.load().unwrap(), sample());
	}

	#[test]
	fn load_missing_is_not_found() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::new(dir.path().join("original.json"));
		assert!(matches!(store.load(), Err(SwitchError::NotFound)));
	}

	#[test]
	fn clear_is_idempotent() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::new(dir.path().join("original.json"));
		store.capture(&sample()).unwrap();
		store.clear().unwrap();
		assert!(!store.exists());
		store.clear().unwrap();
	}

	#[test]
	fn corrupt_record_is_store_error() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("original.json");
		fs::write(&path, "{ not json").unwrap();
		assert!(matches!(
			SnapshotStore::new(path).load(),
			Err(SwitchError::Store { .. })
		));
	}

	#[test]
	fn persisted_form() {
		let value = serde_json::to_value(sample()).unwrap();
		assert_eq!(
			value,
			serde_json::json!({
				"platform": "windows",
				"interfaces": {
					"Wi-Fi 2": ["192.168.1.1", "9.9.9.9"],
					"eth0": [],
				},
				"flags": {
					"secureResolution": null,
					"nameResolutionMatching": false,
				},
			})
		);
	}
}
