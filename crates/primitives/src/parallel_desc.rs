use serde::{Deserialize, Serialize};

use crate::{DescError, DeviceId, DeviceType, MachineId};

/// Immutable description of a device placement.
///
/// Machine ids are strictly ascending, and so are the physical device ids of
/// each machine. Both orders are relied upon by the fan-out algorithm, which
/// emits pairs in ascending (machine, device) order without sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawParallelDesc", into = "RawParallelDesc")]
pub struct ParallelDesc {
	device_type: DeviceType,
	sorted_machine_ids: Vec<MachineId>,
	/// Indexed in lockstep with `sorted_machine_ids`.
	sorted_dev_phy_ids: Vec<Vec<DeviceId>>,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawParallelDesc {
	device_type: DeviceType,
	machines: Vec<RawMachine>,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawMachine {
	machine_id: MachineId,
	device_ids: Vec<DeviceId>,
}

impl TryFrom<RawParallelDesc> for ParallelDesc {
	type Error = DescError;

	fn try_from(raw: RawParallelDesc) -> Result<Self, Self::Error> {
		Self::new(raw.device_type, raw.machines.into_iter().map(|m| (m.machine_id, m.device_ids)))
	}
}

impl From<ParallelDesc> for RawParallelDesc {
	fn from(desc: ParallelDesc) -> Self {
		Self {
			device_type: desc.device_type,
			machines: desc
				.sorted_machine_ids
				.into_iter()
				.zip(desc.sorted_dev_phy_ids)
				.map(|(machine_id, device_ids)| RawMachine { machine_id, device_ids })
				.collect(),
		}
	}
}

impl ParallelDesc {
	/// Builds a descriptor from `(machine_id, device_ids)` entries.
	///
	/// Entries must already be in ascending, duplicate-free order; this
	/// constructor validates and never reorders.
	pub fn new<I, D>(device_type: DeviceType, machines: I) -> Result<Self, DescError>
	where
		I: IntoIterator<Item = (MachineId, D)>,
		D: IntoIterator<Item = DeviceId>,
	{
		let mut sorted_machine_ids = Vec::new();
		let mut sorted_dev_phy_ids = Vec::new();

		for (machine_id, devices) in machines {
			if machine_id < 0 {
				return Err(DescError::NegativeId { machine_id, device_id: None });
			}
			if let Some(&prev) = sorted_machine_ids.last()
				&& prev >= machine_id
			{
				return Err(DescError::UnsortedMachineIds { prev, next: machine_id });
			}

			let devices: Vec<DeviceId> = devices.into_iter().collect();
			if devices.is_empty() {
				return Err(DescError::EmptyMachine(machine_id));
			}
			for pair in devices.windows(2) {
				if pair[0] >= pair[1] {
					return Err(DescError::UnsortedDeviceIds {
						machine_id,
						prev: pair[0],
						next: pair[1],
					});
				}
			}
			if devices[0] < 0 {
				return Err(DescError::NegativeId {
					machine_id,
					device_id: Some(devices[0]),
				});
			}

			sorted_machine_ids.push(machine_id);
			sorted_dev_phy_ids.push(devices);
		}

		Ok(Self {
			device_type,
			sorted_machine_ids,
			sorted_dev_phy_ids,
		})
	}

	/// Starts a builder for the given device type.
	pub fn builder(device_type: DeviceType) -> ParallelDescBuilder {
		ParallelDescBuilder {
			device_type,
			machines: Vec::new(),
		}
	}

	pub fn device_type(&self) -> DeviceType {
		self.device_type
	}

	pub fn sorted_machine_ids(&self) -> &[MachineId] {
		&self.sorted_machine_ids
	}

	/// Returns true if `machine_id` is part of this placement.
	#[inline]
	pub fn has_machine_id(&self, machine_id: MachineId) -> bool {
		self.sorted_machine_ids.binary_search(&machine_id).is_ok()
	}

	/// Ascending physical device ids of `machine_id`, empty if not a member.
	pub fn sorted_dev_phy_ids(&self, machine_id: MachineId) -> &[DeviceId] {
		match self.sorted_machine_ids.binary_search(&machine_id) {
			Ok(idx) => &self.sorted_dev_phy_ids[idx],
			Err(_) => &[],
		}
	}

	/// Iterates `(machine_id, device_ids)` in ascending machine order.
	pub fn machines(&self) -> impl Iterator<Item = (MachineId, &[DeviceId])> + '_ {
		self.sorted_machine_ids
			.iter()
			.copied()
			.zip(self.sorted_dev_phy_ids.iter().map(Vec::as_slice))
	}

	/// Total number of (machine, device) pairs.
	pub fn parallel_num(&self) -> usize {
		self.sorted_dev_phy_ids.iter().map(Vec::len).sum()
	}
}

/// Incremental builder for [`ParallelDesc`].
#[derive(Debug, Clone)]
pub struct ParallelDescBuilder {
	device_type: DeviceType,
	machines: Vec<(MachineId, Vec<DeviceId>)>,
}

impl ParallelDescBuilder {
	/// Appends one machine with its devices.
	pub fn machine(mut self, machine_id: MachineId, devices: impl IntoIterator<Item = DeviceId>) -> Self {
		self.machines.push((machine_id, devices.into_iter().collect()));
		self
	}

	/// Validates and builds the descriptor.
	pub fn build(self) -> Result<ParallelDesc, DescError> {
		ParallelDesc::new(self.device_type, self.machines)
	}
}
