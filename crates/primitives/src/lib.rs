//! Core types for object placement: identifiers, device types, machine ranges
//! and parallel descriptors.

/// Device type and tag types.
pub mod device;
/// Descriptor validation errors.
pub mod error;
/// Identifier types for machines, devices and logical objects.
pub mod ids;
/// Parallel descriptor: the machines and devices that jointly host an object.
pub mod parallel_desc;
/// Half-open machine id ranges.
pub mod range;

pub use device::DeviceType;
pub use error::DescError;
pub use ids::{DeviceId, GlobalDeviceId, LogicalObjectId, MachineId, SymbolId};
pub use parallel_desc::{ParallelDesc, ParallelDescBuilder};
pub use range::MachineIdRange;
