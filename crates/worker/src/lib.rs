//! Execution lanes for the object virtual machine.
//!
//! The control stream is a single [`ControlLane`] thread that owns the
//! [`VirtualMachine`](objvm_vm::VirtualMachine). Producers enqueue instructions
//! through a bounded [`LanePort`]; [`LaneRegistry`] exposes status snapshots.

mod lane;
mod port;
mod registry;

pub use lane::{ControlLane, LaneError, LaneReport};
pub use port::{LaneCommand, LanePort};
pub use registry::{LaneRecord, LaneRegistry, LaneStatus};
