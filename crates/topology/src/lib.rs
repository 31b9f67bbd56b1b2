//! Topology resolution and device fan-out.
//!
//! A runtime instance owns a half-open range of machine ids. Given a
//! [`ParallelDesc`](objvm_primitives::ParallelDesc), [`fanout`] enumerates the
//! (machine, device) pairs that lie in both the placement and that range, and
//! a [`GlobalDeviceIdResolver`] turns each pair into a process-wide
//! [`GlobalDeviceId`](objvm_primitives::GlobalDeviceId).
//!
//! Both pieces are pure: no state is kept between calls, and the two fan-out
//! iteration strategies emit identical sequences.

pub mod fanout;
pub mod resource;

pub use fanout::{FanoutStrategy, IterationOrder, for_each_machine_and_device_in_range, global_device_ids_in_range, machine_device_pairs_in_range};
pub use resource::{GlobalDeviceIdResolver, UnaddressableDevice, VmResourceDesc};
