use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use objvm_vm::StreamKind;

/// Lifecycle of a lane as seen from outside its thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneStatus {
	Running,
	/// Exited after a stop command or cancellation.
	Stopped,
	/// Exited on a fatal machine error.
	Failed,
}

/// Snapshot for one registered lane.
#[derive(Debug, Clone)]
pub struct LaneRecord {
	pub name: String,
	pub kind: StreamKind,
	pub status: LaneStatus,
	/// Instructions executed to completion.
	pub executed: u64,
	/// Commands queued but not yet received.
	pub pending: usize,
	pub last_error: Option<String>,
}

impl LaneRecord {
	pub(crate) fn running(name: impl Into<String>, kind: StreamKind) -> Self {
		Self {
			name: name.into(),
			kind,
			status: LaneStatus::Running,
			executed: 0,
			pending: 0,
			last_error: None,
		}
	}
}

/// In-memory lane registry for status snapshots.
#[derive(Debug, Default, Clone)]
pub struct LaneRegistry {
	inner: Arc<RwLock<HashMap<String, LaneRecord>>>,
}

impl LaneRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Upserts one record.
	pub fn upsert(&self, record: LaneRecord) {
		if let Ok(mut guard) = self.inner.write() {
			guard.insert(record.name.clone(), record);
		}
	}

	/// Applies `f` to the record named `name`, if present.
	pub fn update(&self, name: &str, f: impl FnOnce(&mut LaneRecord)) {
		if let Ok(mut guard) = self.inner.write()
			&& let Some(record) = guard.get_mut(name)
		{
			f(record);
		}
	}

	/// Removes one record.
	pub fn remove(&self, name: &str) {
		if let Ok(mut guard) = self.inner.write() {
			guard.remove(name);
		}
	}

	/// Returns the snapshot of one lane.
	pub fn get(&self, name: &str) -> Option<LaneRecord> {
		self.inner.read().ok()?.get(name).cloned()
	}

	/// Returns snapshots sorted by name.
	pub fn snapshots(&self) -> Vec<LaneRecord> {
		let Ok(guard) = self.inner.read() else {
			return Vec::new();
		};
		let mut records: Vec<_> = guard.values().cloned().collect();
		records.sort_by(|a, b| a.name.cmp(&b.name));
		records
	}
}
