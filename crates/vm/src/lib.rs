//! Instruction-driven object identity virtual machine.
//!
//! A [`VirtualMachine`] tracks *logical objects* (cluster-wide entities bound
//! to a parallel placement) and their *mirrored objects* (one per global
//! device this runtime instance is responsible for). Objects are created and
//! destroyed only by instructions executed on the control stream:
//!
//! * `NewObject` / `LocalNewObject` create a logical object plus empty mirrors.
//! * `DeleteObject` / `LocalDeleteObject` remove a logical object and all of
//!   its mirrors, refusing if any mirror still holds a payload.
//!
//! Each instruction runs in two phases. The infer phase resolves metadata and
//! addresses *type* ids; the compute phase resolves values and addresses
//! *value* ids. [`StreamDispatcher`] routes messages to the phase handlers
//! registered in [`INSTRUCTION_TYPES`].
//!
//! Every [`VmError`] is fatal to the stream that produced it. Operations
//! validate before they commit, so a failed instruction leaves the registry as
//! it was.

pub mod arena;
pub mod dispatch;
pub mod error;
pub mod id;
pub mod instruction;
pub mod object;
pub mod registry;
pub mod stream;
mod vm;

pub use arena::{LogicalHandle, MirroredHandle, ObjectPool, PoolKind, Pools};
pub use dispatch::StreamDispatcher;
pub use error::{InvariantViolation, Result, VmError};
pub use id::{IdMapFn, IdScheme, Phase, SignedIdScheme};
pub use instruction::{
	INSTRUCTION_TYPES, InstructionMsg, InstructionSeq, InstructionTypeDef, MirrorSelector, MutOperand, Operand, find_instruction_type,
};
pub use object::{LogicalObject, MirroredObject, ObjectState, Payload, PayloadSlot};
pub use registry::ObjectRegistry;
pub use stream::StreamKind;
pub use vm::VirtualMachine;
