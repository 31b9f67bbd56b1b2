//! End-to-end object lifecycle through the stream dispatcher.

use std::sync::Arc;

use objvm_config::{LocalDeviceConfig, PoolConfig, ResourceConfig, VmConfig};
use objvm_primitives::{DeviceType, GlobalDeviceId, LogicalObjectId, MachineIdRange, ParallelDesc};
use objvm_topology::FanoutStrategy;
use objvm_vm::{
	IdScheme, InstructionMsg, InvariantViolation, ObjectState, PoolKind, StreamDispatcher, StreamKind, VirtualMachine, VmError,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

const GPU_SYM: i64 = 7;

/// Two machines, four device slots each; the placement reaches devices
/// (0,0) (0,1) (1,2) in range and (3,0) outside it.
fn config() -> VmConfig {
	VmConfig {
		machine_id_range: MachineIdRange::new(0, 2).unwrap(),
		resource: ResourceConfig {
			max_device_num_per_machine: 4,
			cpu_device_num: 1,
			gpu_device_num: 4,
		},
		local_device: LocalDeviceConfig {
			device_type: DeviceType::Gpu,
			device_id: 1,
		},
		..VmConfig::default()
	}
}

fn gpu_desc() -> ParallelDesc {
	ParallelDesc::builder(DeviceType::Gpu)
		.machine(0, [0, 1])
		.machine(1, [2])
		.machine(3, [0])
		.build()
		.unwrap()
}

fn vm_with(config: &VmConfig) -> VirtualMachine {
	let _ = tracing_subscriber::fmt::try_init();
	let mut vm = VirtualMachine::new(config);
	vm.register_parallel_desc(GPU_SYM, gpu_desc());
	vm
}

#[fixture]
fn vm() -> VirtualMachine {
	vm_with(&config())
}

fn run(vm: &mut VirtualMachine, msg: &InstructionMsg) -> Result<(), VmError> {
	StreamDispatcher::new().dispatch(vm, StreamKind::Control, msg)
}

fn gids(ids: &[i64]) -> Vec<GlobalDeviceId> {
	ids.iter().copied().map(GlobalDeviceId).collect()
}

fn invariant(err: VmError) -> InvariantViolation {
	err.as_invariant().cloned().unwrap_or_else(|| panic!("expected invariant violation, got {err}"))
}

#[rstest]
fn new_then_delete_leaves_nothing_behind(mut vm: VirtualMachine) {
	run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [10, 11])).unwrap();

	assert_eq!(
		vm.logical_object_ids(),
		[-12, -11, 10, 11].map(LogicalObjectId).to_vec()
	);
	assert_eq!(vm.mirrored_object_count(), 12);
	for id in [-12, -11, 10, 11].map(LogicalObjectId) {
		assert_eq!(vm.logical_object(id).unwrap().global_device_ids().collect::<Vec<_>>(), gids(&[0, 1, 6]));
		assert_eq!(vm.object_state(id), Some(ObjectState::Created));
	}

	run(&mut vm, &InstructionMsg::delete_object([10, 11])).unwrap();

	assert_eq!(vm.logical_object_count(), 0);
	assert_eq!(vm.mirrored_object_count(), 0);
	assert_eq!(vm.pending_retirement_count(), 0);
	assert!(vm.pools().get(PoolKind::Control).is_empty());
	assert!(vm.pools().get(PoolKind::Data).is_empty());
	assert_eq!(vm.object_state(LogicalObjectId(10)), None);
}

#[rstest]
#[case::range(FanoutStrategy::IterateRange)]
#[case::descriptor(FanoutStrategy::IterateDescriptor)]
#[case::auto(FanoutStrategy::Auto)]
fn fanout_strategy_does_not_change_mirrors(#[case] fanout: FanoutStrategy) {
	let mut vm = vm_with(&VmConfig { fanout, ..config() });
	run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [1])).unwrap();

	let mirrors: Vec<_> = vm.mirrored_objects(LogicalObjectId(1)).map(|m| m.global_device_id()).collect();
	assert_eq!(mirrors, gids(&[0, 1, 6]));
	for mirror in vm.mirrored_objects(LogicalObjectId(1)) {
		assert_eq!(mirror.logical_object_id(), LogicalObjectId(1));
		assert!(!mirror.slot().has_object());
	}
}

#[rstest]
fn duplicate_creation_is_fatal_and_atomic(mut vm: VirtualMachine) {
	run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [1])).unwrap();
	let before = vm.logical_object_ids();
	let mirrors_before = vm.mirrored_object_count();

	let err = run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [2, 1])).unwrap_err();
	assert_eq!(invariant(err), InvariantViolation::DuplicateLogicalObject { id: LogicalObjectId(-2) });
	assert_eq!(vm.logical_object_ids(), before);
	assert_eq!(vm.mirrored_object_count(), mirrors_before);

	let err = run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [5, 5])).unwrap_err();
	assert_eq!(invariant(err), InvariantViolation::DuplicateLogicalObject { id: LogicalObjectId(-6) });
	assert_eq!(vm.logical_object_ids(), before);
}

#[rstest]
fn populated_object_cannot_be_deleted(mut vm: VirtualMachine) {
	run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [1])).unwrap();
	let slot = vm.payload_slot(LogicalObjectId(1), GlobalDeviceId(6)).unwrap();
	slot.attach(Arc::new(vec![1.0f32, 2.0]));
	assert_eq!(vm.object_state(LogicalObjectId(1)), Some(ObjectState::Populated));

	let err = run(&mut vm, &InstructionMsg::delete_object([1])).unwrap_err();
	assert_eq!(
		invariant(err),
		InvariantViolation::PopulatedOnDelete {
			id: LogicalObjectId(1),
			global_device_id: GlobalDeviceId(6),
		}
	);
	assert_eq!(vm.logical_object_ids(), [-2, 1].map(LogicalObjectId).to_vec());
	assert_eq!(vm.mirrored_object_count(), 6);
	assert_eq!(vm.pending_retirement_count(), 0);

	assert_eq!(slot.downcast::<Vec<f32>>().as_deref(), Some(&vec![1.0, 2.0]));
	slot.clear();
	assert_eq!(vm.object_state(LogicalObjectId(1)), Some(ObjectState::Drained));

	run(&mut vm, &InstructionMsg::delete_object([1])).unwrap();
	assert_eq!(vm.logical_object_count(), 0);
}

#[rstest]
fn deleting_unknown_or_repeated_ids_is_fatal(mut vm: VirtualMachine) {
	let err = run(&mut vm, &InstructionMsg::delete_object([42])).unwrap_err();
	assert_eq!(invariant(err), InvariantViolation::MissingLogicalObject { id: LogicalObjectId(-43) });

	run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [3])).unwrap();
	let err = run(&mut vm, &InstructionMsg::delete_object([3, 3])).unwrap_err();
	assert_eq!(invariant(err), InvariantViolation::MissingLogicalObject { id: LogicalObjectId(-4) });
	assert_eq!(vm.logical_object_count(), 2);
}

#[rstest]
fn phases_use_their_own_ids_and_pools(mut vm: VirtualMachine) {
	let dispatcher = StreamDispatcher::new();
	let msg = InstructionMsg::new_object(GPU_SYM, [4]);

	dispatcher.infer(&mut vm, StreamKind::Control, &msg).unwrap();
	assert_eq!(vm.logical_object_ids(), vec![LogicalObjectId(-5)]);
	assert_eq!(vm.logical_object(LogicalObjectId(-5)).unwrap().pool(), PoolKind::Control);
	assert_eq!(vm.pools().get(PoolKind::Control).len(), 4);

	dispatcher.compute(&mut vm, StreamKind::Control, &msg).unwrap();
	let value = vm.logical_object(LogicalObjectId(4)).unwrap();
	assert_eq!(value.pool(), PoolKind::Data);
	assert_eq!(**value.parallel_desc().unwrap(), gpu_desc());
	assert_eq!(vm.pools().get(PoolKind::Data).len(), 4);

	let delete = InstructionMsg::delete_object([4]);
	dispatcher.infer(&mut vm, StreamKind::Control, &delete).unwrap();
	assert_eq!(vm.logical_object_count(), 2);
	assert_eq!(vm.pending_retirement_count(), 1);

	dispatcher.compute(&mut vm, StreamKind::Control, &delete).unwrap();
	assert_eq!(vm.logical_object_count(), 0);
	assert_eq!(vm.pending_retirement_count(), 0);
}

#[rstest]
fn local_variants_use_the_implicit_device(mut vm: VirtualMachine) {
	assert_eq!(vm.local_global_device_id().unwrap(), GlobalDeviceId(1));

	run(&mut vm, &InstructionMsg::local_new_object([3, 8])).unwrap();
	for id in [-9, -4, 3, 8].map(LogicalObjectId) {
		let obj = vm.logical_object(id).unwrap();
		assert!(obj.parallel_desc().is_none());
		assert_eq!(obj.global_device_ids().collect::<Vec<_>>(), gids(&[1]));
	}
	assert_eq!(vm.mirrored_object_count(), 4);

	run(&mut vm, &InstructionMsg::local_delete_object([3, 8])).unwrap();
	assert_eq!(vm.logical_object_count(), 0);
	assert_eq!(vm.mirrored_object_count(), 0);
}

#[rstest]
fn local_new_object_needs_no_placement() {
	let mut vm = VirtualMachine::new(&config());
	run(&mut vm, &InstructionMsg::local_new_object([1])).unwrap();
	assert_eq!(vm.logical_object_count(), 2);

	let err = run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [2])).unwrap_err();
	assert_eq!(
		invariant(err),
		InvariantViolation::MissingParallelDesc {
			instr_type: "NewObject".into(),
			symbol_id: Some(GPU_SYM),
		}
	);
	assert_eq!(vm.logical_object_count(), 2);
}

#[rstest]
fn data_pool_capacity_is_enforced() {
	let mut vm = vm_with(&VmConfig {
		pools: PoolConfig {
			control_capacity: None,
			data_capacity: Some(3),
		},
		..config()
	});
	let dispatcher = StreamDispatcher::new();
	let msg = InstructionMsg::new_object(GPU_SYM, [1]);

	dispatcher.infer(&mut vm, StreamKind::Control, &msg).unwrap();
	let err = dispatcher.compute(&mut vm, StreamKind::Control, &msg).unwrap_err();
	assert_eq!(
		err,
		VmError::ResourceExhaustion {
			pool: PoolKind::Data,
			len: 0,
			capacity: 3,
			requested: 4,
		}
	);
	assert!(err.as_invariant().is_none());
	assert_eq!(vm.logical_object_ids(), vec![LogicalObjectId(-2)]);
}

#[rstest]
fn empty_machine_range_creates_objects_without_mirrors() {
	let mut vm = vm_with(&VmConfig {
		machine_id_range: MachineIdRange::new(2, 2).unwrap(),
		..config()
	});
	run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [1])).unwrap();
	assert_eq!(vm.logical_object(LogicalObjectId(1)).unwrap().mirror_count(), 0);
	assert_eq!(vm.object_state(LogicalObjectId(1)), Some(ObjectState::Created));

	run(&mut vm, &InstructionMsg::delete_object([1])).unwrap();
	assert_eq!(vm.logical_object_count(), 0);
}

#[rstest]
fn pipelined_dispatch_infers_everything_first(mut vm: VirtualMachine) {
	let dispatcher = StreamDispatcher::new();
	let program = [InstructionMsg::new_object(GPU_SYM, [1]), InstructionMsg::local_new_object([2])];
	dispatcher.dispatch_pipelined(&mut vm, StreamKind::Control, &program).unwrap();
	assert_eq!(vm.logical_object_ids(), [-3, -2, 1, 2].map(LogicalObjectId).to_vec());

	let teardown = [InstructionMsg::delete_object([1]), InstructionMsg::local_delete_object([2])];
	dispatcher.dispatch_pipelined(&mut vm, StreamKind::Control, &teardown).unwrap();
	assert_eq!(vm.logical_object_count(), 0);
	assert_eq!(vm.pending_retirement_count(), 0);
}

#[rstest]
fn failed_pipeline_drops_deferred_retirements(mut vm: VirtualMachine) {
	let dispatcher = StreamDispatcher::new();
	run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [1, 2])).unwrap();
	vm.payload_slot(LogicalObjectId(1), GlobalDeviceId(0)).unwrap().attach(Arc::new(0u8));

	let teardown = [InstructionMsg::delete_object([1]), InstructionMsg::delete_object([2])];
	let err = dispatcher.dispatch_pipelined(&mut vm, StreamKind::Control, &teardown).unwrap_err();
	assert_eq!(
		invariant(err),
		InvariantViolation::PopulatedOnDelete {
			id: LogicalObjectId(1),
			global_device_id: GlobalDeviceId(0),
		}
	);
	assert_eq!(vm.pending_retirement_count(), 0);
	assert_eq!(vm.logical_object_count(), 4);

	let teardown = [InstructionMsg::delete_object([2]), InstructionMsg::delete_object([99])];
	let err = dispatcher.dispatch_pipelined(&mut vm, StreamKind::Control, &teardown).unwrap_err();
	assert_eq!(invariant(err), InvariantViolation::MissingLogicalObject { id: LogicalObjectId(-100) });
	assert_eq!(vm.pending_retirement_count(), 0);
	assert_eq!(vm.logical_object_count(), 4);
}

#[rstest]
fn instructions_are_bound_to_the_control_stream(mut vm: VirtualMachine) {
	let err = StreamDispatcher::new()
		.dispatch(&mut vm, StreamKind::Compute, &InstructionMsg::new_object(GPU_SYM, [1]))
		.unwrap_err();
	assert_eq!(
		invariant(err),
		InvariantViolation::WrongStream {
			instr_type: "NewObject".into(),
			expected: StreamKind::Control,
			actual: StreamKind::Compute,
		}
	);
	assert_eq!(vm.logical_object_count(), 0);
}

struct OffsetScheme;

impl IdScheme for OffsetScheme {
	fn type_id(&self, raw: i64) -> LogicalObjectId {
		LogicalObjectId(raw + 1_000)
	}

	fn value_id(&self, raw: i64) -> LogicalObjectId {
		LogicalObjectId(raw)
	}
}

#[rstest]
fn collaborators_are_pluggable(vm: VirtualMachine) {
	let mut vm = vm
		.with_id_scheme(Arc::new(OffsetScheme))
		.with_resolver(Arc::new(|machine_id: i64, _tag: &str, device_id: i64| GlobalDeviceId(machine_id * 100 + device_id)));
	run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [5])).unwrap();

	assert_eq!(vm.logical_object_ids(), [5, 1_005].map(LogicalObjectId).to_vec());
	assert_eq!(
		vm.logical_object(LogicalObjectId(5)).unwrap().global_device_ids().collect::<Vec<_>>(),
		gids(&[0, 1, 102])
	);
}

#[rstest]
#[case::range(FanoutStrategy::IterateRange)]
#[case::descriptor(FanoutStrategy::IterateDescriptor)]
fn three_machines_two_devices_give_six_mirrors(#[case] fanout: FanoutStrategy) {
	let mut vm = vm_with(&VmConfig {
		machine_id_range: MachineIdRange::new(0, 6).unwrap(),
		resource: ResourceConfig {
			max_device_num_per_machine: 2,
			cpu_device_num: 2,
			gpu_device_num: 0,
		},
		fanout,
		..VmConfig::default()
	});
	let desc = ParallelDesc::builder(DeviceType::Cpu)
		.machine(0, [0, 1])
		.machine(2, [0, 1])
		.machine(5, [0, 1])
		.build()
		.unwrap();
	vm.register_parallel_desc(1, desc);

	run(&mut vm, &InstructionMsg::new_object(1, [7])).unwrap();
	let err = run(&mut vm, &InstructionMsg::new_object(1, [7])).unwrap_err();
	assert_eq!(invariant(err), InvariantViolation::DuplicateLogicalObject { id: LogicalObjectId(-8) });

	assert_eq!(vm.mirrored_object_count(), 12);
	for id in [-8, 7].map(LogicalObjectId) {
		assert_eq!(
			vm.logical_object(id).unwrap().global_device_ids().collect::<Vec<_>>(),
			gids(&[0, 1, 4, 5, 10, 11])
		);
	}
}

#[rstest]
fn colliding_resolver_is_fatal_and_atomic(vm: VirtualMachine) {
	let mut vm = vm.with_resolver(Arc::new(|_: i64, _: &str, _: i64| GlobalDeviceId(0)));
	let err = run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [1, 2])).unwrap_err();
	assert_eq!(
		invariant(err),
		InvariantViolation::DuplicateGlobalDevice {
			id: LogicalObjectId(-2),
			global_device_id: GlobalDeviceId(0),
		}
	);
	assert_eq!(vm.logical_object_count(), 0);
	assert_eq!(vm.mirrored_object_count(), 0);
	assert!(vm.pools().get(PoolKind::Control).is_empty());

	// One device cannot collide with itself.
	run(&mut vm, &InstructionMsg::local_new_object([1])).unwrap();
	assert_eq!(vm.mirrored_object_count(), 2);
}

#[rstest]
fn machine_ids_past_the_id_space_are_fatal() {
	let last = i64::MAX - 1;
	let mut vm = vm_with(&VmConfig {
		machine_id_range: MachineIdRange::new(last, i64::MAX).unwrap(),
		resource: ResourceConfig {
			max_device_num_per_machine: 2,
			cpu_device_num: 2,
			gpu_device_num: 0,
		},
		..VmConfig::default()
	});
	vm.register_parallel_desc(1, ParallelDesc::builder(DeviceType::Cpu).machine(last, [0]).build().unwrap());

	let expected = InvariantViolation::UnaddressableDevice {
		machine_id: last,
		device_type: DeviceType::Cpu,
		device_id: 0,
	};
	let err = run(&mut vm, &InstructionMsg::new_object(1, [1])).unwrap_err();
	assert_eq!(invariant(err), expected);
	let err = run(&mut vm, &InstructionMsg::local_new_object([1])).unwrap_err();
	assert_eq!(invariant(err), expected);
	assert_eq!(vm.logical_object_count(), 0);
	assert!(vm.pools().get(PoolKind::Control).is_empty());
}

#[rstest]
fn devices_beyond_the_configured_count_are_fatal() {
	let mut vm = vm_with(&VmConfig {
		resource: ResourceConfig {
			gpu_device_num: 2,
			..config().resource
		},
		..config()
	});
	let err = run(&mut vm, &InstructionMsg::new_object(GPU_SYM, [1])).unwrap_err();
	assert_eq!(
		invariant(err),
		InvariantViolation::UnaddressableDevice {
			machine_id: 1,
			device_type: DeviceType::Gpu,
			device_id: 2,
		}
	);
	assert_eq!(vm.logical_object_count(), 0);

	run(&mut vm, &InstructionMsg::local_new_object([1])).unwrap();
	assert_eq!(vm.logical_object(LogicalObjectId(1)).unwrap().global_device_ids().collect::<Vec<_>>(), gids(&[1]));
}
