use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DescError;

/// Kind of device a parallel descriptor places objects on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
	/// Host memory.
	#[default]
	Cpu,
	/// Accelerator memory.
	Gpu,
}

impl DeviceType {
	/// Returns the device tag passed to global device id resolution.
	pub const fn tag(self) -> &'static str {
		match self {
			Self::Cpu => "cpu",
			Self::Gpu => "gpu",
		}
	}
}

impl fmt::Display for DeviceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

impl FromStr for DeviceType {
	type Err = DescError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"cpu" => Ok(Self::Cpu),
			"gpu" => Ok(Self::Gpu),
			other => Err(DescError::UnknownDeviceTag(other.to_string())),
		}
	}
}
