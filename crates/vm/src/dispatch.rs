//! Routing of instruction messages to their registered handlers.

use crate::VirtualMachine;
use crate::error::{InvariantViolation, Result};
use crate::id::Phase;
use crate::instruction::{INSTRUCTION_TYPES, InstructionMsg, InstructionTypeDef, InstructionTypeTable};
use crate::stream::StreamKind;

/// Looks up each message's instruction type and runs one of its phases.
///
/// A message must name a registered type and carry the type's stream kind,
/// and it must arrive on a lane of that same kind.
#[derive(Debug, Clone, Copy)]
pub struct StreamDispatcher {
	table: &'static InstructionTypeTable,
}

impl Default for StreamDispatcher {
	fn default() -> Self {
		Self::new()
	}
}

impl StreamDispatcher {
	/// Dispatcher over the process-wide instruction type table.
	pub fn new() -> Self {
		Self { table: &*INSTRUCTION_TYPES }
	}

	/// Resolves the instruction type of `msg` for execution on `lane`.
	pub fn resolve(&self, lane: StreamKind, msg: &InstructionMsg) -> Result<&'static InstructionTypeDef> {
		let def = self
			.table
			.get(msg.instr_type_name())
			.ok_or_else(|| InvariantViolation::UnknownInstructionType {
				name: msg.instr_type_name().to_string(),
			})?;
		for actual in [msg.stream_kind(), lane] {
			if actual != def.stream_kind {
				return Err(InvariantViolation::WrongStream {
					instr_type: def.name.to_string(),
					expected: def.stream_kind,
					actual,
				}
				.into());
			}
		}
		Ok(def)
	}

	/// Runs the infer phase of `msg`.
	///
	/// A successful infer may leave state for the compute phase of the same
	/// message, so callers driving phases by hand follow it with
	/// [`Self::compute`].
	pub fn infer(&self, vm: &mut VirtualMachine, lane: StreamKind, msg: &InstructionMsg) -> Result<()> {
		self.run_phase(vm, lane, msg, Phase::Infer)
	}

	/// Runs the compute phase of `msg`.
	pub fn compute(&self, vm: &mut VirtualMachine, lane: StreamKind, msg: &InstructionMsg) -> Result<()> {
		self.run_phase(vm, lane, msg, Phase::Compute)
	}

	/// Runs both phases of `msg`, infer first.
	pub fn dispatch(&self, vm: &mut VirtualMachine, lane: StreamKind, msg: &InstructionMsg) -> Result<()> {
		self.infer(vm, lane, msg)?;
		self.compute(vm, lane, msg)
	}

	/// Runs the infer phase of every message, then the compute phase of every
	/// message, in order. Stops at the first failure.
	pub fn dispatch_pipelined(&self, vm: &mut VirtualMachine, lane: StreamKind, msgs: &[InstructionMsg]) -> Result<()> {
		let result = self.run_pipelined(vm, lane, msgs);
		if result.is_err() {
			// Computes that never ran leave their infer hand-offs behind.
			for msg in msgs {
				vm.clear_retirements(msg.seq());
			}
		}
		result
	}

	fn run_pipelined(&self, vm: &mut VirtualMachine, lane: StreamKind, msgs: &[InstructionMsg]) -> Result<()> {
		for msg in msgs {
			self.infer(vm, lane, msg)?;
		}
		for msg in msgs {
			self.compute(vm, lane, msg)?;
		}
		Ok(())
	}

	fn run_phase(&self, vm: &mut VirtualMachine, lane: StreamKind, msg: &InstructionMsg, phase: Phase) -> Result<()> {
		let result = self.resolve(lane, msg).and_then(|def| {
			let handler = match phase {
				Phase::Infer => def.infer,
				Phase::Compute => def.compute,
			};
			tracing::trace!(instr = def.name, seq = msg.seq().0, phase = phase.as_str(), "vm.dispatch");
			handler(vm, msg)
		});
		if let Err(err) = &result {
			tracing::error!(
				instr = msg.instr_type_name(),
				seq = msg.seq().0,
				phase = phase.as_str(),
				error = %err,
				"vm.dispatch.fatal"
			);
		}
		result
	}
}
