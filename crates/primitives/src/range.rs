use serde::{Deserialize, Serialize};

use crate::{DescError, MachineId};

/// Half-open range `[begin, end)` of machine ids owned by one runtime instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct MachineIdRange {
	begin: MachineId,
	end: MachineId,
}

#[derive(Deserialize)]
struct RawRange {
	begin: MachineId,
	end: MachineId,
}

impl TryFrom<RawRange> for MachineIdRange {
	type Error = DescError;

	fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
		Self::new(raw.begin, raw.end)
	}
}

impl MachineIdRange {
	/// Creates a range, rejecting a negative `begin` and `begin > end`.
	pub fn new(begin: MachineId, end: MachineId) -> Result<Self, DescError> {
		if begin < 0 {
			return Err(DescError::NegativeId { machine_id: begin, device_id: None });
		}
		if begin > end {
			return Err(DescError::InvalidRange { begin, end });
		}
		Ok(Self { begin, end })
	}

	/// Range covering exactly one machine. Negative ids clamp to zero.
	pub fn single(machine_id: MachineId) -> Self {
		let begin = machine_id.max(0);
		Self {
			begin,
			end: begin.saturating_add(1),
		}
	}

	/// Inclusive lower bound.
	#[inline]
	pub const fn begin(&self) -> MachineId {
		self.begin
	}

	/// Exclusive upper bound.
	#[inline]
	pub const fn end(&self) -> MachineId {
		self.end
	}

	/// Number of machine ids covered.
	#[inline]
	pub fn len(&self) -> usize {
		usize::try_from(self.end.abs_diff(self.begin)).unwrap_or(usize::MAX)
	}

	/// Returns true when no machine id is covered.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.begin == self.end
	}

	/// Returns true if `machine_id` lies in `[begin, end)`.
	#[inline]
	pub fn contains(&self, machine_id: MachineId) -> bool {
		machine_id >= self.begin && machine_id < self.end
	}

	/// Iterates machine ids in ascending order.
	pub fn iter(&self) -> std::ops::Range<MachineId> {
		self.begin..self.end
	}
}

impl Default for MachineIdRange {
	fn default() -> Self {
		Self::single(0)
	}
}
