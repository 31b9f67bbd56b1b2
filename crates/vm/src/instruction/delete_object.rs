//! `DeleteObject` and `LocalDeleteObject`.
//!
//! Operands are all-mirrors references. The infer phase never removes
//! anything: it checks that each type-level object is live and hands it to
//! the compute phase of the same instruction. The compute phase checks every
//! value-level object plus the handed-over type-level objects are live and
//! drained, then removes all of them. Deleting a populated object is fatal.

use objvm_primitives::LogicalObjectId;
use rustc_hash::FxHashSet as HashSet;

use crate::VirtualMachine;
use crate::error::{InvariantViolation, Result};
use crate::id::Phase;
use crate::instruction::InstructionMsg;
use crate::stream::StreamKind;

pub const DELETE_OBJECT: &str = "DeleteObject";
pub const LOCAL_DELETE_OBJECT: &str = "LocalDeleteObject";

fn infer(vm: &mut VirtualMachine, msg: &InstructionMsg) -> Result<()> {
	run(vm, msg, Phase::Infer)
}

fn compute(vm: &mut VirtualMachine, msg: &InstructionMsg) -> Result<()> {
	let result = run(vm, msg, Phase::Compute);
	// The infer hand-off is consumed whether or not compute succeeds.
	vm.clear_retirements(msg.seq());
	result
}

// Deletion never fans out, so the local variant shares the handlers.
instruction_type!(DELETE_OBJECT_DEF, DELETE_OBJECT, stream: StreamKind::Control, infer: infer, compute: compute);
instruction_type!(LOCAL_DELETE_OBJECT_DEF, LOCAL_DELETE_OBJECT, stream: StreamKind::Control, infer: infer, compute: compute);

fn run(vm: &mut VirtualMachine, msg: &InstructionMsg, phase: Phase) -> Result<()> {
	let raw_ids = msg.all_mirror_ids()?;
	let map = phase.id_map();

	let mut seen = HashSet::default();
	let mut targets: Vec<LogicalObjectId> = Vec::with_capacity(raw_ids.len());
	for &raw in &raw_ids {
		let id = map(vm.id_scheme(), raw);
		// A repeated operand names an object the earlier one already removed.
		if !seen.insert(id) {
			return Err(InvariantViolation::MissingLogicalObject { id }.into());
		}
		vm.registry().get(id)?;
		targets.push(id);
	}

	if phase == Phase::Infer {
		vm.defer_retirement(msg.seq(), targets);
		return Ok(());
	}

	for &id in vm.pending_retirements(msg.seq()) {
		if seen.insert(id) {
			vm.registry().get(id)?;
			targets.push(id);
		}
	}
	for &id in &targets {
		vm.ensure_drained(id)?;
	}

	for &id in &targets {
		vm.erase_logical_object(id)?;
		tracing::trace!(logical_object_id = id.get(), "vm.delete_object.removed");
	}
	tracing::debug!(instr = msg.instr_type_name(), seq = msg.seq().0, objects = targets.len(), "vm.delete_object");
	Ok(())
}
