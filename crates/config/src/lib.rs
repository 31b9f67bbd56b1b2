//! Configuration for one object virtual machine instance.
//!
//! Configuration is written in TOML. Every section is optional and falls back
//! to a single-machine, single-CPU layout:
//!
//! ```toml
//! # Machines this runtime instance is responsible for: [begin, end).
//! machine_id_range = { begin = 0, end = 2 }
//!
//! # "auto" | "iterate_range" | "iterate_descriptor"
//! fanout = "auto"
//!
//! [resource]
//! max_device_num_per_machine = 4
//! cpu_device_num = 1
//! gpu_device_num = 4
//!
//! [pools]
//! control_capacity = 4096
//! data_capacity = 65536
//!
//! [local_device]
//! device_type = "cpu"
//! device_id = 0
//!
//! [lane]
//! queue_capacity = 1024
//! thread_name = "objvm-control"
//! ```

mod error;

use std::path::Path;

pub use error::{ConfigError, Result};
use objvm_primitives::{DeviceId, DeviceType, MachineIdRange};
use objvm_topology::{FanoutStrategy, VmResourceDesc};
use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
	/// Machines owned by this runtime instance.
	pub machine_id_range: MachineIdRange,
	pub resource: ResourceConfig,
	/// Fan-out iteration policy.
	pub fanout: FanoutStrategy,
	pub pools: PoolConfig,
	/// Device targeted by `Local*` instruction types.
	pub local_device: LocalDeviceConfig,
	pub lane: LaneConfig,
}

/// Per-machine device layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceConfig {
	/// Stride between machines in the global device id space.
	pub max_device_num_per_machine: i64,
	/// Devices per machine of each type. Device ids at or above the count are
	/// unaddressable.
	pub cpu_device_num: i64,
	pub gpu_device_num: i64,
}

impl Default for ResourceConfig {
	fn default() -> Self {
		Self {
			max_device_num_per_machine: 1,
			cpu_device_num: 1,
			gpu_device_num: 0,
		}
	}
}

impl ResourceConfig {
	/// Devices per machine for `device_type`.
	pub fn device_num(&self, device_type: DeviceType) -> i64 {
		match device_type {
			DeviceType::Cpu => self.cpu_device_num,
			DeviceType::Gpu => self.gpu_device_num,
		}
	}

	/// Builds the resource descriptor used for global device id resolution.
	pub fn to_resource_desc(&self) -> VmResourceDesc {
		VmResourceDesc::new(self.max_device_num_per_machine)
			.with_device_num(DeviceType::Cpu, self.cpu_device_num)
			.with_device_num(DeviceType::Gpu, self.gpu_device_num)
	}
}

/// Optional record limits for the two object pools.
///
/// `None` leaves a pool unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
	/// Records created during the metadata (infer) phase.
	pub control_capacity: Option<usize>,
	/// Records created during the data (compute) phase.
	pub data_capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalDeviceConfig {
	pub device_type: DeviceType,
	pub device_id: DeviceId,
}

/// Control lane settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaneConfig {
	/// Bounded submission queue length.
	pub queue_capacity: usize,
	pub thread_name: String,
}

impl Default for LaneConfig {
	fn default() -> Self {
		Self {
			queue_capacity: 1024,
			thread_name: "objvm-control".to_string(),
		}
	}
}

impl VmConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&input)?;
		tracing::debug!(path = %path.display(), begin = config.machine_id_range.begin(), end = config.machine_id_range.end(), "config.loaded");
		Ok(config)
	}

	/// Checks cross-field constraints serde cannot express.
	pub fn validate(&self) -> Result<()> {
		let res = &self.resource;
		if res.max_device_num_per_machine <= 0 {
			return Err(ConfigError::Invalid {
				field: "resource.max_device_num_per_machine",
				reason: format!("must be positive, got {}", res.max_device_num_per_machine),
			});
		}
		for (field, num) in [("resource.cpu_device_num", res.cpu_device_num), ("resource.gpu_device_num", res.gpu_device_num)] {
			if num < 0 || num > res.max_device_num_per_machine {
				return Err(ConfigError::Invalid {
					field,
					reason: format!("{num} outside [0, {}]", res.max_device_num_per_machine),
				});
			}
		}
		let local = &self.local_device;
		let local_num = res.device_num(local.device_type);
		if local.device_id < 0 || local.device_id >= local_num {
			return Err(ConfigError::Invalid {
				field: "local_device.device_id",
				reason: format!("{} outside [0, {local_num}) for {} devices", local.device_id, local.device_type),
			});
		}
		for (field, cap) in [("pools.control_capacity", self.pools.control_capacity), ("pools.data_capacity", self.pools.data_capacity)] {
			if cap == Some(0) {
				return Err(ConfigError::Invalid {
					field,
					reason: "must be > 0 when set".to_string(),
				});
			}
		}
		if self.lane.queue_capacity == 0 {
			return Err(ConfigError::Invalid {
				field: "lane.queue_capacity",
				reason: "must be > 0".to_string(),
			});
		}
		Ok(())
	}
}
