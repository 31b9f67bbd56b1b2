use std::sync::Arc;

use objvm_config::VmConfig;
use objvm_primitives::{DeviceId, DeviceType, GlobalDeviceId, LogicalObjectId, MachineIdRange, ParallelDesc, SymbolId};
use objvm_topology::{FanoutStrategy, GlobalDeviceIdResolver};
use rustc_hash::FxHashMap as HashMap;

use crate::arena::{LogicalHandle, PoolKind, Pools};
use crate::error::{InvariantViolation, Result};
use crate::id::{IdScheme, SignedIdScheme};
use crate::instruction::{InstructionMsg, InstructionSeq};
use crate::object::{LogicalObject, MirroredObject, ObjectState, PayloadSlot};
use crate::registry::ObjectRegistry;

/// Object identity state of one runtime instance.
///
/// Structural mutation takes `&mut self`. The machine is meant to be owned by
/// exactly one control lane, which makes that lane the registry's only
/// writer; payload slots are shared out separately through
/// [`Self::payload_slot`].
pub struct VirtualMachine {
	machine_id_range: MachineIdRange,
	fanout: FanoutStrategy,
	resolver: Arc<dyn GlobalDeviceIdResolver>,
	id_scheme: Arc<dyn IdScheme>,
	local_device: (DeviceType, DeviceId),
	parallel_descs: HashMap<SymbolId, Arc<ParallelDesc>>,
	registry: ObjectRegistry,
	pools: Pools,
	retiring: HashMap<InstructionSeq, Vec<LogicalObjectId>>,
}

impl std::fmt::Debug for VirtualMachine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VirtualMachine")
			.field("machine_id_range", &self.machine_id_range)
			.field("fanout", &self.fanout)
			.field("logical_objects", &self.registry.len())
			.field("mirrored_objects", &self.mirrored_object_count())
			.finish_non_exhaustive()
	}
}

impl VirtualMachine {
	/// Creates a machine from configuration with the default id scheme.
	pub fn new(config: &VmConfig) -> Self {
		Self {
			machine_id_range: config.machine_id_range,
			fanout: config.fanout,
			resolver: Arc::new(config.resource.to_resource_desc()),
			id_scheme: Arc::new(SignedIdScheme),
			local_device: (config.local_device.device_type, config.local_device.device_id),
			parallel_descs: HashMap::default(),
			registry: ObjectRegistry::new(),
			pools: Pools::new(config.pools.control_capacity, config.pools.data_capacity),
			retiring: HashMap::default(),
		}
	}

	/// Replaces the global device id function supplied by the placement collaborator.
	pub fn with_resolver(mut self, resolver: Arc<dyn GlobalDeviceIdResolver>) -> Self {
		self.resolver = resolver;
		self
	}

	/// Replaces the raw-id mapping.
	pub fn with_id_scheme(mut self, id_scheme: Arc<dyn IdScheme>) -> Self {
		self.id_scheme = id_scheme;
		self
	}

	pub fn with_fanout_strategy(mut self, fanout: FanoutStrategy) -> Self {
		self.fanout = fanout;
		self
	}

	pub fn machine_id_range(&self) -> MachineIdRange {
		self.machine_id_range
	}

	pub fn fanout_strategy(&self) -> FanoutStrategy {
		self.fanout
	}

	pub fn resolver(&self) -> &dyn GlobalDeviceIdResolver {
		self.resolver.as_ref()
	}

	pub fn id_scheme(&self) -> &dyn IdScheme {
		self.id_scheme.as_ref()
	}

	/// Global device id of the implicit device used by `Local*` instructions.
	pub fn local_global_device_id(&self) -> Result<GlobalDeviceId> {
		let (device_type, device_id) = self.local_device;
		let machine_id = self.machine_id_range.begin();
		let global_device_id = self
			.resolver
			.global_device_id(machine_id, device_type.tag(), device_id)
			.ok_or(InvariantViolation::UnaddressableDevice {
				machine_id,
				device_type,
				device_id,
			})?;
		Ok(global_device_id)
	}

	/// Registers the placement that messages reference as `symbol_id`.
	///
	/// Returns the placement previously registered under the same symbol.
	pub fn register_parallel_desc(&mut self, symbol_id: SymbolId, desc: impl Into<Arc<ParallelDesc>>) -> Option<Arc<ParallelDesc>> {
		self.parallel_descs.insert(symbol_id, desc.into())
	}

	/// Resolves the placement an instruction message refers to.
	pub fn instruction_parallel_desc(&self, msg: &InstructionMsg) -> Result<Arc<ParallelDesc>> {
		let symbol_id = msg.parallel_desc_symbol_id();
		symbol_id
			.and_then(|sym| self.parallel_descs.get(&sym))
			.cloned()
			.ok_or_else(|| {
				InvariantViolation::MissingParallelDesc {
					instr_type: msg.instr_type_name().to_string(),
					symbol_id,
				}
				.into()
			})
	}

	pub fn registry(&self) -> &ObjectRegistry {
		&self.registry
	}

	pub fn pools(&self) -> &Pools {
		&self.pools
	}

	/// Looks up a live logical object.
	pub fn logical_object(&self, id: LogicalObjectId) -> Option<&LogicalObject> {
		self.registry.find(id).and_then(|h| self.pools.logical(h))
	}

	/// Looks up the mirror of `id` on `global_device_id`.
	pub fn mirrored_object(&self, id: LogicalObjectId, global_device_id: GlobalDeviceId) -> Option<&MirroredObject> {
		let handle = self.logical_object(id)?.mirror_handle(global_device_id)?;
		self.pools.mirrored(handle)
	}

	/// All mirrors of `id`, ascending by global device id.
	pub fn mirrored_objects(&self, id: LogicalObjectId) -> impl Iterator<Item = &MirroredObject> + '_ {
		self.logical_object(id)
			.into_iter()
			.flat_map(|obj| obj.mirror_handles())
			.filter_map(move |h| self.pools.mirrored(h))
	}

	/// Shared slot handle for data-plane kernels.
	pub fn payload_slot(&self, id: LogicalObjectId, global_device_id: GlobalDeviceId) -> Option<Arc<PayloadSlot>> {
		self.mirrored_object(id, global_device_id).map(MirroredObject::slot_handle)
	}

	/// Lifecycle state of a live object; `None` once deleted.
	pub fn object_state(&self, id: LogicalObjectId) -> Option<ObjectState> {
		self.logical_object(id)?;
		let mut ever = false;
		for mirror in self.mirrored_objects(id) {
			if mirror.slot().has_object() {
				return Some(ObjectState::Populated);
			}
			ever |= mirror.slot().ever_populated();
		}
		Some(if ever { ObjectState::Drained } else { ObjectState::Created })
	}

	/// Live logical object ids, ascending.
	pub fn logical_object_ids(&self) -> Vec<LogicalObjectId> {
		self.registry.ids()
	}

	pub fn logical_object_count(&self) -> usize {
		self.registry.len()
	}

	pub fn mirrored_object_count(&self) -> usize {
		self.pools.get(PoolKind::Control).mirrored_len() + self.pools.get(PoolKind::Data).mirrored_len()
	}

	pub(crate) fn insert_logical_object(&mut self, id: LogicalObjectId, parallel_desc: Option<Arc<ParallelDesc>>, pool: PoolKind) -> Result<LogicalHandle> {
		if self.registry.contains(id) {
			return Err(InvariantViolation::DuplicateLogicalObject { id }.into());
		}
		let handle = self.pools.get_mut(pool).insert_logical(LogicalObject::new(id, parallel_desc, pool));
		if let Err(err) = self.registry.insert(id, handle) {
			self.pools.remove_logical(handle);
			return Err(err.into());
		}
		Ok(handle)
	}

	pub(crate) fn insert_mirrored_object(&mut self, id: LogicalObjectId, global_device_id: GlobalDeviceId) -> Result<()> {
		let handle = self.registry.get(id)?;
		let mirror = self
			.pools
			.get_mut(handle.pool())
			.insert_mirrored(MirroredObject::new(id, global_device_id));
		let inserted = self
			.pools
			.logical_mut(handle)
			.is_some_and(|obj| obj.insert_mirror(global_device_id, mirror));
		if !inserted {
			self.pools.remove_mirrored(mirror);
			return Err(InvariantViolation::DuplicateGlobalDevice { id, global_device_id }.into());
		}
		Ok(())
	}

	/// Fails unless every mirror of `id` has an empty slot.
	pub(crate) fn ensure_drained(&self, id: LogicalObjectId) -> Result<()> {
		self.registry.get(id)?;
		match self.mirrored_objects(id).find(|m| m.slot().has_object()) {
			Some(populated) => Err(InvariantViolation::PopulatedOnDelete {
				id,
				global_device_id: populated.global_device_id(),
			}
			.into()),
			None => Ok(()),
		}
	}

	/// Removes `id` and all of its mirrors. Callers check drained state first.
	pub(crate) fn erase_logical_object(&mut self, id: LogicalObjectId) -> Result<()> {
		let handle = self.registry.erase(id).ok_or(InvariantViolation::MissingLogicalObject { id })?;
		if let Some(obj) = self.pools.logical_mut(handle) {
			for (_, mirror) in obj.take_mirrors() {
				self.pools.remove_mirrored(mirror);
			}
		}
		self.pools.remove_logical(handle);
		Ok(())
	}

	pub(crate) fn defer_retirement(&mut self, seq: InstructionSeq, ids: Vec<LogicalObjectId>) {
		self.retiring.entry(seq).or_default().extend(ids);
	}

	pub(crate) fn pending_retirements(&self, seq: InstructionSeq) -> &[LogicalObjectId] {
		self.retiring.get(&seq).map_or(&[], Vec::as_slice)
	}

	pub(crate) fn clear_retirements(&mut self, seq: InstructionSeq) {
		self.retiring.remove(&seq);
	}

	/// Number of instructions whose infer phase deferred retirements still
	/// awaiting their compute phase.
	pub fn pending_retirement_count(&self) -> usize {
		self.retiring.len()
	}
}
