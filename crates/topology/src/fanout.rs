//! Device fan-out over a machine id range.
//!
//! The output is the ordered set of `(machine_id, device_id)` pairs whose
//! machine belongs to both the placement and the runtime's machine range,
//! ascending by machine then device. Two iteration orders produce it:
//!
//! * [`IterationOrder::Range`] walks `[begin, end)` and checks the placement.
//! * [`IterationOrder::Descriptor`] walks the placement's machines and checks the range.
//!
//! Which one runs is purely a cost decision; the emitted sequence is the same.

use objvm_primitives::{DeviceId, GlobalDeviceId, MachineId, MachineIdRange, ParallelDesc};
use serde::{Deserialize, Serialize};

use crate::{GlobalDeviceIdResolver, UnaddressableDevice};

/// Policy choosing the fan-out iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutStrategy {
	/// Walk whichever domain is smaller.
	#[default]
	Auto,
	/// Always walk the machine range.
	IterateRange,
	/// Always walk the descriptor's machine list.
	IterateDescriptor,
}

/// Concrete iteration order picked for one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOrder {
	Range,
	Descriptor,
}

impl IterationOrder {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Range => "range",
			Self::Descriptor => "descriptor",
		}
	}
}

impl FanoutStrategy {
	/// Resolves the policy against the sizes of both domains.
	pub fn order_for(self, desc: &ParallelDesc, range: &MachineIdRange) -> IterationOrder {
		match self {
			Self::IterateRange => IterationOrder::Range,
			Self::IterateDescriptor => IterationOrder::Descriptor,
			Self::Auto if range.len() < desc.sorted_machine_ids().len() => IterationOrder::Range,
			Self::Auto => IterationOrder::Descriptor,
		}
	}
}

/// Calls `do_each(machine_id, device_id)` for every pair in both `desc` and `range`.
///
/// Returns the iteration order that was used.
pub fn for_each_machine_and_device_in_range<F>(desc: &ParallelDesc, range: &MachineIdRange, strategy: FanoutStrategy, mut do_each: F) -> IterationOrder
where
	F: FnMut(MachineId, DeviceId),
{
	let order = strategy.order_for(desc, range);
	match order {
		IterationOrder::Range => {
			for machine_id in range.iter() {
				if desc.has_machine_id(machine_id) {
					for &device_id in desc.sorted_dev_phy_ids(machine_id) {
						do_each(machine_id, device_id);
					}
				}
			}
		}
		IterationOrder::Descriptor => {
			for (machine_id, devices) in desc.machines() {
				if range.contains(machine_id) {
					for &device_id in devices {
						do_each(machine_id, device_id);
					}
				}
			}
		}
	}
	tracing::trace!(order = order.as_str(), begin = range.begin(), end = range.end(), "topology.fanout");
	order
}

/// Collects the fan-out pairs.
pub fn machine_device_pairs_in_range(desc: &ParallelDesc, range: &MachineIdRange, strategy: FanoutStrategy) -> Vec<(MachineId, DeviceId)> {
	let mut pairs = Vec::new();
	for_each_machine_and_device_in_range(desc, range, strategy, |m, d| pairs.push((m, d)));
	pairs
}

/// Collects the fan-out as global device ids, in fan-out order.
///
/// Fails on the first pair the resolver cannot address.
pub fn global_device_ids_in_range(
	desc: &ParallelDesc,
	range: &MachineIdRange,
	strategy: FanoutStrategy,
	resolver: &dyn GlobalDeviceIdResolver,
) -> Result<Vec<GlobalDeviceId>, UnaddressableDevice> {
	let device_type = desc.device_type();
	machine_device_pairs_in_range(desc, range, strategy)
		.into_iter()
		.map(|(machine_id, device_id)| {
			resolver.global_device_id(machine_id, device_type.tag(), device_id).ok_or(UnaddressableDevice {
				machine_id,
				device_type,
				device_id,
			})
		})
		.collect()
}
