//! Bounded submission port of a lane.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use objvm_vm::InstructionMsg;
use tokio::sync::mpsc;

/// Unit of work accepted by a lane.
#[derive(Debug, Clone)]
pub enum LaneCommand {
	/// Infer then compute one instruction.
	Dispatch(InstructionMsg),
	/// Infer every instruction in order, then compute every instruction in order.
	Pipelined(Vec<InstructionMsg>),
	/// Exit once every command queued before this one has run.
	Stop,
}

impl LaneCommand {
	pub(crate) fn instruction_count(&self) -> usize {
		match self {
			Self::Dispatch(_) => 1,
			Self::Pipelined(msgs) => msgs.len(),
			Self::Stop => 0,
		}
	}
}

impl From<InstructionMsg> for LaneCommand {
	fn from(msg: InstructionMsg) -> Self {
		Self::Dispatch(msg)
	}
}

impl From<Vec<InstructionMsg>> for LaneCommand {
	fn from(msgs: Vec<InstructionMsg>) -> Self {
		Self::Pipelined(msgs)
	}
}

/// Cloneable enqueue port for instruction producers.
#[derive(Debug, Clone)]
pub struct LanePort {
	tx: mpsc::Sender<LaneCommand>,
	drops: Arc<AtomicU64>,
}

impl LanePort {
	pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<LaneCommand>) {
		let (tx, rx) = mpsc::channel(capacity.max(1));
		let port = Self {
			tx,
			drops: Arc::new(AtomicU64::new(0)),
		};
		(port, rx)
	}

	/// Non-blocking enqueue. Returns `Err` if queue is full or closed.
	pub fn submit(&self, cmd: impl Into<LaneCommand>) -> Result<(), mpsc::error::TrySendError<LaneCommand>> {
		let result = self.tx.try_send(cmd.into());
		if let Err(mpsc::error::TrySendError::Full(_)) = &result {
			let count = self.drops.fetch_add(1, Ordering::Relaxed);
			if count % 1024 == 0 {
				tracing::warn!(drops = count + 1, "lane.queue_full");
			}
		}
		result
	}

	/// Blocking enqueue. Waits for capacity if full.
	///
	/// Must not be called from inside an async runtime.
	pub fn submit_blocking(&self, cmd: impl Into<LaneCommand>) -> Result<(), mpsc::error::SendError<LaneCommand>> {
		self.tx.blocking_send(cmd.into())
	}

	/// Async enqueue. Waits for capacity if full.
	pub async fn submit_async(&self, cmd: impl Into<LaneCommand>) -> Result<(), mpsc::error::SendError<LaneCommand>> {
		self.tx.send(cmd.into()).await
	}

	/// Commands rejected by [`Self::submit`] because the queue was full.
	pub fn dropped(&self) -> u64 {
		self.drops.load(Ordering::Relaxed)
	}

	/// Returns true once the lane stopped receiving.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}
