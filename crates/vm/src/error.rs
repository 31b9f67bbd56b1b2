//! Error taxonomy of the virtual machine.
//!
//! Every error here is fatal to the instruction stream that produced it: the
//! stream was built against a broken contract and retrying cannot help.
//! Operations validate before they commit, so a failed call leaves the
//! registry as it was.

use objvm_primitives::{DeviceId, DeviceType, GlobalDeviceId, LogicalObjectId, MachineId, SymbolId};
use objvm_topology::UnaddressableDevice;
use thiserror::Error;

use crate::arena::PoolKind;
use crate::stream::StreamKind;

/// Broken contract in how an instruction stream was constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
	#[error("duplicate logical object {id}: ids must be unique while alive")]
	DuplicateLogicalObject { id: LogicalObjectId },

	#[error("logical object {id} not found: operand must name a live object")]
	MissingLogicalObject { id: LogicalObjectId },

	#[error("logical object {id} still holds a payload on global device {global_device_id}: delete requires every mirror drained")]
	PopulatedOnDelete {
		id: LogicalObjectId,
		global_device_id: GlobalDeviceId,
	},

	#[error("instruction {instr_type} bound to {expected} stream dispatched on {actual} stream")]
	WrongStream {
		instr_type: String,
		expected: StreamKind,
		actual: StreamKind,
	},

	#[error("fan-out produced global device {global_device_id} twice for logical object {id}")]
	DuplicateGlobalDevice {
		id: LogicalObjectId,
		global_device_id: GlobalDeviceId,
	},

	#[error("{device_type} device {device_id} on machine {machine_id} has no global device id")]
	UnaddressableDevice {
		machine_id: MachineId,
		device_type: DeviceType,
		device_id: DeviceId,
	},

	#[error("unknown instruction type {name:?}")]
	UnknownInstructionType { name: String },

	#[error("instruction type {name:?} registered twice")]
	DuplicateInstructionType { name: &'static str },

	#[error("instruction {instr_type} has no registered parallel descriptor (symbol {symbol_id:?})")]
	MissingParallelDesc { instr_type: String, symbol_id: Option<SymbolId> },

	#[error("instruction {instr_type} operand {index}: {reason}")]
	UnsupportedOperand {
		instr_type: String,
		index: usize,
		reason: &'static str,
	},
}

impl From<UnaddressableDevice> for InvariantViolation {
	fn from(err: UnaddressableDevice) -> Self {
		Self::UnaddressableDevice {
			machine_id: err.machine_id,
			device_type: err.device_type,
			device_id: err.device_id,
		}
	}
}

/// Virtual machine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
	#[error("programming invariant violated: {0}")]
	Invariant(#[from] InvariantViolation),

	#[error("resource exhausted: {pool} pool holds {len} of {capacity} records, {requested} more requested")]
	ResourceExhaustion {
		pool: PoolKind,
		len: usize,
		capacity: usize,
		requested: usize,
	},
}

impl VmError {
	/// Returns the invariant violation, if this is one.
	pub fn as_invariant(&self) -> Option<&InvariantViolation> {
		match self {
			Self::Invariant(v) => Some(v),
			Self::ResourceExhaustion { .. } => None,
		}
	}
}

/// Result type for virtual machine operations.
pub type Result<T> = std::result::Result<T, VmError>;
