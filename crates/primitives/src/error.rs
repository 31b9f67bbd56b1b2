//! Error types for placement descriptors.

use thiserror::Error;

use crate::{DeviceId, MachineId};

/// Errors raised while building a [`crate::ParallelDesc`] or a [`crate::MachineIdRange`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescError {
	/// Machine ids must be strictly ascending.
	#[error("machine ids not strictly ascending: {prev} then {next}")]
	UnsortedMachineIds { prev: MachineId, next: MachineId },

	/// Device ids of one machine must be strictly ascending.
	#[error("device ids of machine {machine_id} not strictly ascending: {prev} then {next}")]
	UnsortedDeviceIds {
		machine_id: MachineId,
		prev: DeviceId,
		next: DeviceId,
	},

	/// A machine was listed without any device.
	#[error("machine {0} has no devices")]
	EmptyMachine(MachineId),

	/// Negative machine or device ids are not addressable.
	#[error("negative id in placement: machine={machine_id} device={device_id:?}")]
	NegativeId {
		machine_id: MachineId,
		device_id: Option<DeviceId>,
	},

	/// A machine id range with `begin > end`.
	#[error("invalid machine id range [{begin}, {end})")]
	InvalidRange { begin: MachineId, end: MachineId },

	/// Device tag did not name a known device type.
	#[error("unknown device tag: {0}")]
	UnknownDeviceTag(String),
}
