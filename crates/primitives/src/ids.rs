use std::fmt;

use serde::{Deserialize, Serialize};

/// A machine index within the cluster.
pub type MachineId = i64;

/// A physical device index within one machine.
pub type DeviceId = i64;

/// Symbol id naming a registered [`crate::ParallelDesc`].
pub type SymbolId = i64;

/// Identifier of a logical object as seen by the object registry.
///
/// Raw operand ids are converted into this type by an id scheme; the registry
/// never sees raw ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalObjectId(pub i64);

impl LogicalObjectId {
	/// Returns the underlying integer.
	pub const fn get(self) -> i64 {
		self.0
	}
}

impl fmt::Display for LogicalObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Process-wide integer identifying one (machine, physical device) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalDeviceId(pub i64);

impl GlobalDeviceId {
	/// Returns the underlying integer.
	pub const fn get(self) -> i64 {
		self.0
	}
}

impl fmt::Display for GlobalDeviceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}
