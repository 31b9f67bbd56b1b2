//! Logical and mirrored object records.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use objvm_primitives::{GlobalDeviceId, LogicalObjectId, ParallelDesc};
use parking_lot::RwLock;

use crate::arena::{MirroredHandle, PoolKind};

/// Opaque payload stored in a mirror's slot. The machine never inspects it.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Guarded payload slot of one mirrored object.
///
/// Compute streams fill and drain slots concurrently with control-stream
/// structural changes to *other* objects, so each slot carries its own lock.
#[derive(Default)]
pub struct PayloadSlot {
	value: RwLock<Option<Payload>>,
	ever_populated: AtomicBool,
}

impl PayloadSlot {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `payload`, returning the previous one.
	pub fn attach(&self, payload: Payload) -> Option<Payload> {
		self.ever_populated.store(true, Ordering::Release);
		self.value.write().replace(payload)
	}

	/// Empties the slot, returning what it held.
	pub fn clear(&self) -> Option<Payload> {
		self.value.write().take()
	}

	/// Returns true if a payload is present.
	pub fn has_object(&self) -> bool {
		self.value.read().is_some()
	}

	/// Returns a clone of the stored payload.
	pub fn get(&self) -> Option<Payload> {
		self.value.read().clone()
	}

	/// Returns the stored payload if it has type `T`.
	pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.get().and_then(|p| p.downcast::<T>().ok())
	}

	pub(crate) fn ever_populated(&self) -> bool {
		self.ever_populated.load(Ordering::Acquire)
	}
}

impl fmt::Debug for PayloadSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PayloadSlot")
			.field("has_object", &self.has_object())
			.field("ever_populated", &self.ever_populated())
			.finish()
	}
}

/// Per-device materialization of a logical object.
#[derive(Debug)]
pub struct MirroredObject {
	logical_object_id: LogicalObjectId,
	global_device_id: GlobalDeviceId,
	slot: Arc<PayloadSlot>,
}

impl MirroredObject {
	pub(crate) fn new(logical_object_id: LogicalObjectId, global_device_id: GlobalDeviceId) -> Self {
		Self {
			logical_object_id,
			global_device_id,
			slot: Arc::new(PayloadSlot::new()),
		}
	}

	pub fn logical_object_id(&self) -> LogicalObjectId {
		self.logical_object_id
	}

	pub fn global_device_id(&self) -> GlobalDeviceId {
		self.global_device_id
	}

	pub fn slot(&self) -> &PayloadSlot {
		&self.slot
	}

	/// Shared handle to the slot for data-plane kernels running off the control lane.
	pub fn slot_handle(&self) -> Arc<PayloadSlot> {
		Arc::clone(&self.slot)
	}
}

/// Cluster-wide entity spanning a placement's devices on this runtime instance.
#[derive(Debug)]
pub struct LogicalObject {
	id: LogicalObjectId,
	/// `None` for objects created by `Local*` instructions.
	parallel_desc: Option<Arc<ParallelDesc>>,
	pool: PoolKind,
	mirrors: BTreeMap<GlobalDeviceId, MirroredHandle>,
}

impl LogicalObject {
	pub(crate) fn new(id: LogicalObjectId, parallel_desc: Option<Arc<ParallelDesc>>, pool: PoolKind) -> Self {
		Self {
			id,
			parallel_desc,
			pool,
			mirrors: BTreeMap::new(),
		}
	}

	pub fn id(&self) -> LogicalObjectId {
		self.id
	}

	pub fn parallel_desc(&self) -> Option<&Arc<ParallelDesc>> {
		self.parallel_desc.as_ref()
	}

	/// Pool the object and its mirrors were allocated from.
	pub fn pool(&self) -> PoolKind {
		self.pool
	}

	/// Global device ids of all mirrors, ascending.
	pub fn global_device_ids(&self) -> impl Iterator<Item = GlobalDeviceId> + '_ {
		self.mirrors.keys().copied()
	}

	pub fn mirror_count(&self) -> usize {
		self.mirrors.len()
	}

	pub(crate) fn mirror_handle(&self, global_device_id: GlobalDeviceId) -> Option<MirroredHandle> {
		self.mirrors.get(&global_device_id).copied()
	}

	pub(crate) fn mirror_handles(&self) -> impl Iterator<Item = MirroredHandle> + '_ {
		self.mirrors.values().copied()
	}

	/// Returns false if a mirror for `global_device_id` already exists.
	pub(crate) fn insert_mirror(&mut self, global_device_id: GlobalDeviceId, handle: MirroredHandle) -> bool {
		match self.mirrors.entry(global_device_id) {
			std::collections::btree_map::Entry::Occupied(_) => false,
			std::collections::btree_map::Entry::Vacant(slot) => {
				slot.insert(handle);
				true
			}
		}
	}

	pub(crate) fn take_mirrors(&mut self) -> BTreeMap<GlobalDeviceId, MirroredHandle> {
		std::mem::take(&mut self.mirrors)
	}
}

/// Observable lifecycle state of a live logical object.
///
/// A deleted object is simply absent from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
	/// No mirror has ever held a payload.
	Created,
	/// At least one mirror holds a payload.
	Populated,
	/// Every mirror is empty again after having been populated.
	Drained,
}

impl ObjectState {
	/// Returns true if a delete may proceed from this state.
	pub fn is_deletable(self) -> bool {
		!matches!(self, Self::Populated)
	}
}
