//! Slab-backed object pools.
//!
//! Records live in one of two pools: the control pool for objects created
//! while resolving metadata, the data pool for objects created while
//! resolving values. Records are addressed by `(pool, key)` handles, never by
//! reference, so removing a record cannot leave a dangling pointer behind.

use std::fmt;

use slab::Slab;

use crate::error::{Result, VmError};
use crate::object::{LogicalObject, MirroredObject};

/// Which pool a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
	Control,
	Data,
}

impl PoolKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Control => "control",
			Self::Data => "data",
		}
	}
}

impl fmt::Display for PoolKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Handle to a [`LogicalObject`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicalHandle {
	pool: PoolKind,
	key: usize,
}

impl LogicalHandle {
	pub fn pool(self) -> PoolKind {
		self.pool
	}
}

/// Handle to a [`MirroredObject`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirroredHandle {
	pool: PoolKind,
	key: usize,
}

/// One bounded or unbounded record pool.
#[derive(Debug)]
pub struct ObjectPool {
	kind: PoolKind,
	capacity: Option<usize>,
	logical: Slab<LogicalObject>,
	mirrored: Slab<MirroredObject>,
}

impl ObjectPool {
	pub fn new(kind: PoolKind, capacity: Option<usize>) -> Self {
		Self {
			kind,
			capacity,
			logical: Slab::new(),
			mirrored: Slab::new(),
		}
	}

	/// Total live records, logical and mirrored.
	pub fn len(&self) -> usize {
		self.logical.len() + self.mirrored.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn logical_len(&self) -> usize {
		self.logical.len()
	}

	pub fn mirrored_len(&self) -> usize {
		self.mirrored.len()
	}

	/// Fails with [`VmError::ResourceExhaustion`] unless `additional` more records fit.
	pub fn ensure_room(&self, additional: usize) -> Result<()> {
		let Some(capacity) = self.capacity else {
			return Ok(());
		};
		let len = self.len();
		if len.saturating_add(additional) > capacity {
			return Err(VmError::ResourceExhaustion {
				pool: self.kind,
				len,
				capacity,
				requested: additional,
			});
		}
		Ok(())
	}

	pub(crate) fn insert_logical(&mut self, object: LogicalObject) -> LogicalHandle {
		LogicalHandle {
			pool: self.kind,
			key: self.logical.insert(object),
		}
	}

	pub(crate) fn insert_mirrored(&mut self, object: MirroredObject) -> MirroredHandle {
		MirroredHandle {
			pool: self.kind,
			key: self.mirrored.insert(object),
		}
	}

	pub(crate) fn logical(&self, handle: LogicalHandle) -> Option<&LogicalObject> {
		debug_assert_eq!(handle.pool, self.kind);
		self.logical.get(handle.key)
	}

	pub(crate) fn logical_mut(&mut self, handle: LogicalHandle) -> Option<&mut LogicalObject> {
		debug_assert_eq!(handle.pool, self.kind);
		self.logical.get_mut(handle.key)
	}

	pub(crate) fn mirrored(&self, handle: MirroredHandle) -> Option<&MirroredObject> {
		debug_assert_eq!(handle.pool, self.kind);
		self.mirrored.get(handle.key)
	}

	pub(crate) fn remove_logical(&mut self, handle: LogicalHandle) -> Option<LogicalObject> {
		self.logical.try_remove(handle.key)
	}

	pub(crate) fn remove_mirrored(&mut self, handle: MirroredHandle) -> Option<MirroredObject> {
		self.mirrored.try_remove(handle.key)
	}
}

/// The control and data pools of one machine.
#[derive(Debug)]
pub struct Pools {
	control: ObjectPool,
	data: ObjectPool,
}

impl Pools {
	pub fn new(control_capacity: Option<usize>, data_capacity: Option<usize>) -> Self {
		Self {
			control: ObjectPool::new(PoolKind::Control, control_capacity),
			data: ObjectPool::new(PoolKind::Data, data_capacity),
		}
	}

	pub fn get(&self, kind: PoolKind) -> &ObjectPool {
		match kind {
			PoolKind::Control => &self.control,
			PoolKind::Data => &self.data,
		}
	}

	pub(crate) fn get_mut(&mut self, kind: PoolKind) -> &mut ObjectPool {
		match kind {
			PoolKind::Control => &mut self.control,
			PoolKind::Data => &mut self.data,
		}
	}

	pub(crate) fn logical(&self, handle: LogicalHandle) -> Option<&LogicalObject> {
		self.get(handle.pool).logical(handle)
	}

	pub(crate) fn logical_mut(&mut self, handle: LogicalHandle) -> Option<&mut LogicalObject> {
		self.get_mut(handle.pool).logical_mut(handle)
	}

	pub(crate) fn mirrored(&self, handle: MirroredHandle) -> Option<&MirroredObject> {
		self.get(handle.pool).mirrored(handle)
	}

	pub(crate) fn remove_mirrored(&mut self, handle: MirroredHandle) -> Option<MirroredObject> {
		self.get_mut(handle.pool).remove_mirrored(handle)
	}

	pub(crate) fn remove_logical(&mut self, handle: LogicalHandle) -> Option<LogicalObject> {
		self.get_mut(handle.pool).remove_logical(handle)
	}
}
