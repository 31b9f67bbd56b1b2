//! Execution stream kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Serializing execution lane an instruction type is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
	/// Lane on which object identity is created and destroyed.
	///
	/// Exactly one control lane exists per machine; it is the only writer of
	/// the object registry.
	Control,
	/// Device lanes reading and writing payload slots.
	Compute,
}

impl StreamKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Control => "control",
			Self::Compute => "compute",
		}
	}
}

impl fmt::Display for StreamKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
