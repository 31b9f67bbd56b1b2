//! Instruction type static registration via `inventory`.
//!
//! Each `instruction_type!` invocation creates an [`InstructionTypeDef`] and
//! submits it via `inventory::submit!`. The first lookup collects every
//! submitted definition into [`INSTRUCTION_TYPES`], which is immutable from
//! then on.

use std::sync::LazyLock;

use rustc_hash::FxHashMap as HashMap;

use crate::VirtualMachine;
use crate::error::{InvariantViolation, Result};
use crate::instruction::InstructionMsg;
use crate::stream::StreamKind;

/// Handler signature shared by the infer and compute phases.
pub type InstructionHandler = fn(&mut VirtualMachine, &InstructionMsg) -> Result<()>;

/// Definition of one instruction type.
pub struct InstructionTypeDef {
	/// Name used by program builders, e.g. `"NewObject"`.
	pub name: &'static str,
	/// Crate that defined this instruction type.
	pub crate_name: &'static str,
	/// The only stream this instruction type may execute on.
	pub stream_kind: StreamKind,
	/// Metadata-resolution phase.
	pub infer: InstructionHandler,
	/// Data-resolution phase.
	pub compute: InstructionHandler,
}

impl std::fmt::Debug for InstructionTypeDef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InstructionTypeDef")
			.field("name", &self.name)
			.field("crate_name", &self.crate_name)
			.field("stream_kind", &self.stream_kind)
			.finish_non_exhaustive()
	}
}

/// Wrapper for `inventory::collect!`.
pub struct InstructionTypeReg(pub &'static InstructionTypeDef);

inventory::collect!(InstructionTypeReg);

/// Name-indexed table of instruction types.
#[derive(Debug, Default)]
pub struct InstructionTypeTable {
	by_name: HashMap<&'static str, &'static InstructionTypeDef>,
	names: Vec<&'static str>,
}

impl InstructionTypeTable {
	/// Builds a table, rejecting two definitions with the same name.
	pub fn build(defs: impl IntoIterator<Item = &'static InstructionTypeDef>) -> std::result::Result<Self, InvariantViolation> {
		let mut table = Self::default();
		for def in defs {
			if table.by_name.insert(def.name, def).is_some() {
				return Err(InvariantViolation::DuplicateInstructionType { name: def.name });
			}
			table.names.push(def.name);
		}
		table.names.sort_unstable();
		Ok(table)
	}

	pub fn get(&self, name: &str) -> Option<&'static InstructionTypeDef> {
		self.by_name.get(name).copied()
	}

	/// Registered names, sorted.
	pub fn names(&self) -> &[&'static str] {
		&self.names
	}

	pub fn len(&self) -> usize {
		self.names.len()
	}

	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}
}

/// Process-wide instruction type table.
pub static INSTRUCTION_TYPES: LazyLock<InstructionTypeTable> = LazyLock::new(|| {
	let table = InstructionTypeTable::build(inventory::iter::<InstructionTypeReg>.into_iter().map(|reg| reg.0))
		.unwrap_or_else(|err| panic!("instruction type registration: {err}"));
	tracing::debug!(count = table.len(), "vm.instruction_types.built");
	table
});

/// Finds an instruction type by name.
pub fn find_instruction_type(name: &str) -> Option<&'static InstructionTypeDef> {
	INSTRUCTION_TYPES.get(name)
}
