//! Raw-id resolution for the two execution phases.
//!
//! Operands carry raw ids. Before touching the registry, the infer phase maps
//! them to *type* ids and the compute phase to *value* ids. The mapping is an
//! opaque collaborator: the machine only requires it to be deterministic.

use objvm_primitives::LogicalObjectId;

use crate::arena::PoolKind;

/// Opaque raw-id to logical-id mapping for both phases.
pub trait IdScheme: Send + Sync {
	/// Id of the metadata-level object named by `raw`.
	fn type_id(&self, raw: i64) -> LogicalObjectId;
	/// Id of the payload-bearing object named by `raw`.
	fn value_id(&self, raw: i64) -> LogicalObjectId;
}

/// Default scheme: value ids are non-negative, type ids are their negation
/// shifted by one so that raw id 0 still maps to two distinct ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedIdScheme;

impl IdScheme for SignedIdScheme {
	fn type_id(&self, raw: i64) -> LogicalObjectId {
		LogicalObjectId(-raw.saturating_abs() - 1)
	}

	fn value_id(&self, raw: i64) -> LogicalObjectId {
		LogicalObjectId(raw.saturating_abs())
	}
}

/// Function converting a raw operand id into a registry id.
pub type IdMapFn = fn(&dyn IdScheme, i64) -> LogicalObjectId;

fn type_id_of(scheme: &dyn IdScheme, raw: i64) -> LogicalObjectId {
	scheme.type_id(raw)
}

fn value_id_of(scheme: &dyn IdScheme, raw: i64) -> LogicalObjectId {
	scheme.value_id(raw)
}

/// Execution phase of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	/// Metadata resolution ahead of data availability.
	Infer,
	/// Data resolution.
	Compute,
}

impl Phase {
	/// Id mapping used by this phase.
	pub fn id_map(self) -> IdMapFn {
		match self {
			Self::Infer => type_id_of,
			Self::Compute => value_id_of,
		}
	}

	/// Pool that records created in this phase are allocated from.
	pub const fn pool(self) -> PoolKind {
		match self {
			Self::Infer => PoolKind::Control,
			Self::Compute => PoolKind::Data,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Infer => "infer",
			Self::Compute => "compute",
		}
	}
}
