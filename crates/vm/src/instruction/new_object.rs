//! `NewObject` and `LocalNewObject`.
//!
//! Operands are plain raw ids. For each id the phase's mapping yields the
//! registry id; a logical object is bound to the instruction's placement and
//! gets one empty mirror per global device the fan-out reaches on this
//! machine range. The local variant skips the placement entirely and creates
//! one mirror on the implicit local device.

use std::sync::Arc;

use objvm_primitives::{GlobalDeviceId, LogicalObjectId, ParallelDesc};
use objvm_topology::global_device_ids_in_range;
use rustc_hash::FxHashSet as HashSet;

use crate::VirtualMachine;
use crate::error::{InvariantViolation, Result};
use crate::id::Phase;
use crate::instruction::InstructionMsg;
use crate::stream::StreamKind;

pub const NEW_OBJECT: &str = "NewObject";
pub const LOCAL_NEW_OBJECT: &str = "LocalNewObject";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
	Parallel,
	Local,
}

fn infer(vm: &mut VirtualMachine, msg: &InstructionMsg) -> Result<()> {
	run(vm, msg, Phase::Infer, Placement::Parallel)
}

fn compute(vm: &mut VirtualMachine, msg: &InstructionMsg) -> Result<()> {
	run(vm, msg, Phase::Compute, Placement::Parallel)
}

fn local_infer(vm: &mut VirtualMachine, msg: &InstructionMsg) -> Result<()> {
	run(vm, msg, Phase::Infer, Placement::Local)
}

fn local_compute(vm: &mut VirtualMachine, msg: &InstructionMsg) -> Result<()> {
	run(vm, msg, Phase::Compute, Placement::Local)
}

instruction_type!(NEW_OBJECT_DEF, NEW_OBJECT, stream: StreamKind::Control, infer: infer, compute: compute);
instruction_type!(LOCAL_NEW_OBJECT_DEF, LOCAL_NEW_OBJECT, stream: StreamKind::Control, infer: local_infer, compute: local_compute);

fn run(vm: &mut VirtualMachine, msg: &InstructionMsg, phase: Phase, placement: Placement) -> Result<()> {
	let raw_ids = msg.plain_ids()?;

	let (parallel_desc, global_device_ids): (Option<Arc<ParallelDesc>>, Vec<GlobalDeviceId>) = match placement {
		Placement::Parallel => {
			let desc = vm.instruction_parallel_desc(msg)?;
			let ids = global_device_ids_in_range(&desc, &vm.machine_id_range(), vm.fanout_strategy(), vm.resolver())
				.map_err(InvariantViolation::from)?;
			(Some(desc), ids)
		}
		Placement::Local => (None, vec![vm.local_global_device_id()?]),
	};

	let map = phase.id_map();
	let ids: Vec<LogicalObjectId> = raw_ids.iter().map(|&raw| map(vm.id_scheme(), raw)).collect();

	// Validate everything before the first insert so a failure leaves no trace.
	let mut seen = HashSet::default();
	for &id in &ids {
		if !seen.insert(id) || vm.registry().contains(id) {
			return Err(InvariantViolation::DuplicateLogicalObject { id }.into());
		}
	}
	if let Some(&first) = ids.first() {
		let mut devices = HashSet::default();
		for &global_device_id in &global_device_ids {
			if !devices.insert(global_device_id) {
				return Err(InvariantViolation::DuplicateGlobalDevice { id: first, global_device_id }.into());
			}
		}
	}
	let pool = phase.pool();
	vm.pools().get(pool).ensure_room(ids.len() * (1 + global_device_ids.len()))?;

	for &id in &ids {
		vm.insert_logical_object(id, parallel_desc.clone(), pool)?;
		for &global_device_id in &global_device_ids {
			vm.insert_mirrored_object(id, global_device_id)?;
		}
		tracing::trace!(logical_object_id = id.get(), phase = phase.as_str(), mirrors = global_device_ids.len(), "vm.new_object.created");
	}
	tracing::debug!(
		instr = msg.instr_type_name(),
		seq = msg.seq().0,
		phase = phase.as_str(),
		objects = ids.len(),
		mirrors_per_object = global_device_ids.len(),
		"vm.new_object"
	);
	Ok(())
}
