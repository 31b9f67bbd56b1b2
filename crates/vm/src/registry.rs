//! Logical object id to record handle mapping.
//!
//! The registry has no internal locking. It is owned by a
//! [`VirtualMachine`](crate::VirtualMachine), which in turn is owned by the
//! single control lane, so exclusive `&mut` access is the only writer.

use objvm_primitives::LogicalObjectId;
use rustc_hash::FxHashMap as HashMap;

use crate::arena::LogicalHandle;
use crate::error::InvariantViolation;

#[derive(Debug, Default)]
pub struct ObjectRegistry {
	by_id: HashMap<LogicalObjectId, LogicalHandle>,
}

impl ObjectRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds `id` to `handle`; a live duplicate is a contract violation.
	pub fn insert(&mut self, id: LogicalObjectId, handle: LogicalHandle) -> Result<(), InvariantViolation> {
		match self.by_id.entry(id) {
			std::collections::hash_map::Entry::Occupied(_) => Err(InvariantViolation::DuplicateLogicalObject { id }),
			std::collections::hash_map::Entry::Vacant(slot) => {
				slot.insert(handle);
				Ok(())
			}
		}
	}

	pub fn find(&self, id: LogicalObjectId) -> Option<LogicalHandle> {
		self.by_id.get(&id).copied()
	}

	/// Like [`Self::find`], for callers that require presence.
	pub fn get(&self, id: LogicalObjectId) -> Result<LogicalHandle, InvariantViolation> {
		self.find(id).ok_or(InvariantViolation::MissingLogicalObject { id })
	}

	pub fn contains(&self, id: LogicalObjectId) -> bool {
		self.by_id.contains_key(&id)
	}

	/// Unbinds `id`. Callers validate drained mirrors beforehand.
	pub fn erase(&mut self, id: LogicalObjectId) -> Option<LogicalHandle> {
		self.by_id.remove(&id)
	}

	pub fn len(&self) -> usize {
		self.by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_id.is_empty()
	}

	/// Live ids, ascending.
	pub fn ids(&self) -> Vec<LogicalObjectId> {
		let mut ids: Vec<_> = self.by_id.keys().copied().collect();
		ids.sort_unstable();
		ids
	}
}
