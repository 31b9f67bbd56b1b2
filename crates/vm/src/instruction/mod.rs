//! Instruction messages and instruction types.
//!
//! An [`InstructionMsg`] names its instruction type, the stream kind it must
//! run on, and an ordered operand list whose shape the type defines. Each
//! instruction type ([`InstructionTypeDef`]) is registered once at process
//! start and exposes an infer and a compute handler.

#[macro_use]
mod macros;

mod def;
pub mod delete_object;
pub mod new_object;

use std::sync::atomic::{AtomicU64, Ordering};

pub use def::{INSTRUCTION_TYPES, InstructionHandler, InstructionTypeDef, InstructionTypeReg, InstructionTypeTable, find_instruction_type};
use objvm_primitives::{GlobalDeviceId, SymbolId};
use serde::{Deserialize, Serialize};

use crate::error::{InvariantViolation, Result};
use crate::stream::StreamKind;

/// Process-unique sequence number of an instruction message.
///
/// Clones of a message keep its number, so both phases of one instruction
/// agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstructionSeq(pub u64);

impl InstructionSeq {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// Which mirrors of a logical object a mutable operand addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorSelector {
	/// Every mirror of the object.
	All,
	/// The mirror on one global device.
	Device(GlobalDeviceId),
}

/// Mutable reference to a logical object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutOperand {
	/// Raw id, resolved through the phase's id mapping.
	pub logical_object_id: i64,
	pub mirrors: MirrorSelector,
}

impl MutOperand {
	pub fn all_mirrors(logical_object_id: i64) -> Self {
		Self {
			logical_object_id,
			mirrors: MirrorSelector::All,
		}
	}

	pub fn has_all_mirrored_object(&self) -> bool {
		self.mirrors == MirrorSelector::All
	}
}

/// One instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
	/// Plain raw logical object id.
	LogicalObjectId(i64),
	/// Mutable object reference.
	Mut(MutOperand),
}

/// Encoded instruction as produced by a program builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionMsg {
	seq: InstructionSeq,
	instr_type_name: String,
	stream_kind: StreamKind,
	#[serde(default)]
	parallel_desc_symbol_id: Option<SymbolId>,
	#[serde(default)]
	operands: Vec<Operand>,
}

impl InstructionMsg {
	/// Starts a message for a registered instruction type, tagging it with the
	/// type's declared stream kind.
	pub fn new(instr_type_name: &str) -> Result<Self> {
		let def = find_instruction_type(instr_type_name).ok_or_else(|| InvariantViolation::UnknownInstructionType {
			name: instr_type_name.to_string(),
		})?;
		Ok(Self::with_stream_kind(def.name, def.stream_kind))
	}

	/// Starts a message with an explicit stream kind and no registry lookup.
	pub fn with_stream_kind(instr_type_name: impl Into<String>, stream_kind: StreamKind) -> Self {
		Self {
			seq: InstructionSeq::next(),
			instr_type_name: instr_type_name.into(),
			stream_kind,
			parallel_desc_symbol_id: None,
			operands: Vec::new(),
		}
	}

	/// `NewObject` over the placement registered as `symbol_id`.
	pub fn new_object(symbol_id: SymbolId, raw_ids: impl IntoIterator<Item = i64>) -> Self {
		Self::with_stream_kind(new_object::NEW_OBJECT, StreamKind::Control)
			.with_parallel_desc(symbol_id)
			.with_logical_object_ids(raw_ids)
	}

	/// `LocalNewObject` on the implicit local device.
	pub fn local_new_object(raw_ids: impl IntoIterator<Item = i64>) -> Self {
		Self::with_stream_kind(new_object::LOCAL_NEW_OBJECT, StreamKind::Control).with_logical_object_ids(raw_ids)
	}

	/// `DeleteObject` of every mirror of each id.
	pub fn delete_object(raw_ids: impl IntoIterator<Item = i64>) -> Self {
		Self::with_stream_kind(delete_object::DELETE_OBJECT, StreamKind::Control).with_all_mirrors_of(raw_ids)
	}

	/// `LocalDeleteObject` of every mirror of each id.
	pub fn local_delete_object(raw_ids: impl IntoIterator<Item = i64>) -> Self {
		Self::with_stream_kind(delete_object::LOCAL_DELETE_OBJECT, StreamKind::Control).with_all_mirrors_of(raw_ids)
	}

	pub fn with_parallel_desc(mut self, symbol_id: SymbolId) -> Self {
		self.parallel_desc_symbol_id = Some(symbol_id);
		self
	}

	pub fn with_operand(mut self, operand: Operand) -> Self {
		self.operands.push(operand);
		self
	}

	pub fn with_logical_object_ids(mut self, raw_ids: impl IntoIterator<Item = i64>) -> Self {
		self.operands.extend(raw_ids.into_iter().map(Operand::LogicalObjectId));
		self
	}

	pub fn with_all_mirrors_of(mut self, raw_ids: impl IntoIterator<Item = i64>) -> Self {
		self.operands
			.extend(raw_ids.into_iter().map(|id| Operand::Mut(MutOperand::all_mirrors(id))));
		self
	}

	pub fn seq(&self) -> InstructionSeq {
		self.seq
	}

	pub fn instr_type_name(&self) -> &str {
		&self.instr_type_name
	}

	pub fn stream_kind(&self) -> StreamKind {
		self.stream_kind
	}

	pub fn parallel_desc_symbol_id(&self) -> Option<SymbolId> {
		self.parallel_desc_symbol_id
	}

	pub fn operands(&self) -> &[Operand] {
		&self.operands
	}

	/// Raw ids of an operand list made only of plain ids.
	pub(crate) fn plain_ids(&self) -> std::result::Result<Vec<i64>, InvariantViolation> {
		self.operands
			.iter()
			.enumerate()
			.map(|(index, operand)| match operand {
				Operand::LogicalObjectId(raw) => Ok(*raw),
				Operand::Mut(_) => Err(self.unsupported_operand(index, "expected a plain logical object id")),
			})
			.collect()
	}

	/// Raw ids of an operand list made only of all-mirrors references.
	pub(crate) fn all_mirror_ids(&self) -> std::result::Result<Vec<i64>, InvariantViolation> {
		self.operands
			.iter()
			.enumerate()
			.map(|(index, operand)| match operand {
				Operand::Mut(op) if op.has_all_mirrored_object() => Ok(op.logical_object_id),
				Operand::Mut(_) => Err(self.unsupported_operand(index, "per-mirror deletion is not supported")),
				Operand::LogicalObjectId(_) => Err(self.unsupported_operand(index, "expected a mutable all-mirrors operand")),
			})
			.collect()
	}

	fn unsupported_operand(&self, index: usize, reason: &'static str) -> InvariantViolation {
		InvariantViolation::UnsupportedOperand {
			instr_type: self.instr_type_name.clone(),
			index,
			reason,
		}
	}
}
