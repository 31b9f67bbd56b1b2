//! Global device id resolution.

use objvm_primitives::{DeviceId, DeviceType, GlobalDeviceId, MachineId};
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

/// A fan-out pair the resolver has no global device id for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{device_type} device {device_id} on machine {machine_id} has no global device id")]
pub struct UnaddressableDevice {
	pub machine_id: MachineId,
	pub device_type: DeviceType,
	pub device_id: DeviceId,
}

/// Pure mapping from `(machine_id, device_tag, device_id)` to a global device id.
///
/// Implementations must be deterministic and keep no internal state: the
/// object registry relies on the same inputs always producing the same id.
/// `None` means the device cannot be addressed, which callers treat as fatal.
pub trait GlobalDeviceIdResolver: Send + Sync {
	fn global_device_id(&self, machine_id: MachineId, device_tag: &str, device_id: DeviceId) -> Option<GlobalDeviceId>;
}

/// Closures are infallible resolvers.
impl<F> GlobalDeviceIdResolver for F
where
	F: Fn(MachineId, &str, DeviceId) -> GlobalDeviceId + Send + Sync,
{
	fn global_device_id(&self, machine_id: MachineId, device_tag: &str, device_id: DeviceId) -> Option<GlobalDeviceId> {
		Some(self(machine_id, device_tag, device_id))
	}
}

/// Cluster resource shape as seen by one runtime instance.
///
/// Global device ids are laid out machine-major with a fixed stride of
/// `max_device_num_per_machine`. A device id is addressable only when it is
/// below both the stride and the recorded count for its type, so ids of
/// different machines never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmResourceDesc {
	max_device_num_per_machine: i64,
	device_num: HashMap<DeviceType, i64>,
}

impl VmResourceDesc {
	pub fn new(max_device_num_per_machine: i64) -> Self {
		Self {
			max_device_num_per_machine,
			device_num: HashMap::default(),
		}
	}

	/// Records how many devices of `device_type` each machine has.
	pub fn with_device_num(mut self, device_type: DeviceType, num: i64) -> Self {
		self.device_num.insert(device_type, num);
		self
	}

	pub fn max_device_num_per_machine(&self) -> i64 {
		self.max_device_num_per_machine
	}

	/// Devices per machine for `device_type`, zero if never recorded.
	pub fn device_num(&self, device_type: DeviceType) -> i64 {
		self.device_num.get(&device_type).copied().unwrap_or(0)
	}
}

impl Default for VmResourceDesc {
	fn default() -> Self {
		Self::new(1).with_device_num(DeviceType::Cpu, 1)
	}
}

impl GlobalDeviceIdResolver for VmResourceDesc {
	fn global_device_id(&self, machine_id: MachineId, device_tag: &str, device_id: DeviceId) -> Option<GlobalDeviceId> {
		let device_type = device_tag.parse::<DeviceType>().ok()?;
		let bound = self.device_num(device_type).min(self.max_device_num_per_machine);
		if machine_id < 0 || device_id < 0 || device_id >= bound {
			return None;
		}
		machine_id
			.checked_mul(self.max_device_num_per_machine)?
			.checked_add(device_id)
			.map(GlobalDeviceId)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_machine_major() {
		let res = VmResourceDesc::new(4).with_device_num(DeviceType::Gpu, 4);
		assert_eq!(res.global_device_id(0, "gpu", 3), Some(GlobalDeviceId(3)));
		assert_eq!(res.global_device_id(2, "gpu", 1), Some(GlobalDeviceId(9)));
		assert_eq!(res.device_num(DeviceType::Gpu), 4);
		assert_eq!(res.device_num(DeviceType::Cpu), 0);
	}

	#[test]
	fn closures_are_resolvers() {
		let f = |m: MachineId, tag: &str, d: DeviceId| GlobalDeviceId(m * 100 + d + if tag == "gpu" { 50 } else { 0 });
		assert_eq!(f.global_device_id(1, "gpu", 2), Some(GlobalDeviceId(152)));
		assert_eq!(f.global_device_id(1, "cpu", 2), Some(GlobalDeviceId(102)));
	}

	#[test]
	fn devices_beyond_their_type_count_are_unaddressable() {
		let res = VmResourceDesc::new(4).with_device_num(DeviceType::Gpu, 2);
		assert_eq!(res.global_device_id(1, "gpu", 1), Some(GlobalDeviceId(5)));
		assert_eq!(res.global_device_id(1, "gpu", 2), None);
		assert_eq!(res.global_device_id(1, "cpu", 0), None);
		assert_eq!(res.global_device_id(1, "gpu", -1), None);
		assert_eq!(res.global_device_id(1, "tpu", 0), None);
	}

	#[test]
	fn count_above_stride_is_capped() {
		let res = VmResourceDesc::new(2).with_device_num(DeviceType::Cpu, 8);
		assert_eq!(res.global_device_id(0, "cpu", 1), Some(GlobalDeviceId(1)));
		assert_eq!(res.global_device_id(0, "cpu", 2), None);
	}

	#[test]
	fn overflowing_machine_ids_are_unaddressable() {
		let res = VmResourceDesc::new(2).with_device_num(DeviceType::Cpu, 2);
		assert_eq!(res.global_device_id(i64::MAX - 1, "cpu", 0), None);
		assert_eq!(res.global_device_id(i64::MAX / 2, "cpu", 0), Some(GlobalDeviceId(i64::MAX - 1)));
		assert_eq!(res.global_device_id(i64::MAX / 2, "cpu", 1), Some(GlobalDeviceId(i64::MAX)));
	}
}
