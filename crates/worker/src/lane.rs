//! Serializing control lane.
//!
//! A [`ControlLane`] moves a [`VirtualMachine`] onto a dedicated named OS
//! thread and executes submitted instructions there one command at a time.
//! Because the lane owns the machine, it is the registry's only writer. The
//! first fatal error stops the lane; whatever was still queued is discarded
//! and the error is returned in the [`LaneReport`].

use objvm_config::LaneConfig;
use objvm_vm::{StreamDispatcher, StreamKind, VirtualMachine, VmError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::port::{LaneCommand, LanePort};
use crate::registry::{LaneRecord, LaneRegistry, LaneStatus};

/// Final state of a lane, returned on join.
#[derive(Debug)]
pub struct LaneReport {
	/// The machine, handed back to the caller.
	pub vm: VirtualMachine,
	/// Instructions executed to completion.
	pub executed: u64,
	/// Error that stopped the lane, if any.
	pub fatal: Option<VmError>,
}

#[derive(Debug, Error)]
pub enum LaneError {
	#[error("failed to start lane {name}: {error}")]
	Spawn { name: String, error: std::io::Error },
	#[error("lane {name} panicked")]
	Panicked { name: String },
}

/// Handle to a running control lane.
#[derive(Debug)]
pub struct ControlLane {
	name: String,
	port: LanePort,
	cancel: CancellationToken,
	thread: std::thread::JoinHandle<LaneReport>,
}

impl ControlLane {
	/// Starts a lane that owns `vm`.
	pub fn spawn(vm: VirtualMachine, config: &LaneConfig, registry: LaneRegistry) -> Result<Self, LaneError> {
		let name = config.thread_name.clone();
		let spawn_err = |error| LaneError::Spawn { name: name.clone(), error };

		let runtime = tokio::runtime::Builder::new_current_thread().build().map_err(spawn_err)?;
		let (port, rx) = LanePort::channel(config.queue_capacity);
		let cancel = CancellationToken::new();

		registry.upsert(LaneRecord::running(&name, StreamKind::Control));
		let lane = LaneLoop {
			name: name.clone(),
			vm,
			rx,
			cancel: cancel.clone(),
			registry: registry.clone(),
		};
		tracing::trace!(lane = StreamKind::Control.as_str(), name = %name, "lane.spawn_named_thread");
		let thread = std::thread::Builder::new()
			.name(name.clone())
			.spawn(move || runtime.block_on(lane.run()))
			.map_err(|error| {
				registry.remove(&name);
				spawn_err(error)
			})?;

		Ok(Self { name, port, cancel, thread })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns a cloneable enqueue port.
	pub fn port(&self) -> LanePort {
		self.port.clone()
	}

	/// Non-blocking enqueue. See [`LanePort::submit`].
	pub fn submit(&self, cmd: impl Into<LaneCommand>) -> Result<(), mpsc::error::TrySendError<LaneCommand>> {
		self.port.submit(cmd)
	}

	/// Blocking enqueue. See [`LanePort::submit_blocking`].
	pub fn submit_blocking(&self, cmd: impl Into<LaneCommand>) -> Result<(), mpsc::error::SendError<LaneCommand>> {
		self.port.submit_blocking(cmd)
	}

	/// Token that stops the lane without draining its queue.
	pub fn cancel_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// Runs everything already queued, then stops and joins the lane.
	///
	/// Blocks; must not be called from inside an async runtime.
	pub fn finish(self) -> Result<LaneReport, LaneError> {
		// Fails only if the lane already exited, which join reports.
		let _ = self.port.submit_blocking(LaneCommand::Stop);
		self.join()
	}

	/// Cancels the lane, discarding queued commands, and joins it.
	pub fn shutdown(self) -> Result<LaneReport, LaneError> {
		self.cancel.cancel();
		self.join()
	}

	fn join(self) -> Result<LaneReport, LaneError> {
		self.thread.join().map_err(|_| LaneError::Panicked { name: self.name })
	}
}

struct LaneLoop {
	name: String,
	vm: VirtualMachine,
	rx: mpsc::Receiver<LaneCommand>,
	cancel: CancellationToken,
	registry: LaneRegistry,
}

impl LaneLoop {
	async fn run(mut self) -> LaneReport {
		let dispatcher = StreamDispatcher::new();
		let mut executed = 0u64;
		let mut fatal = None;

		loop {
			let cmd = tokio::select! {
				biased;
				_ = self.cancel.cancelled() => break,
				maybe_cmd = self.rx.recv() => {
					let Some(cmd) = maybe_cmd else {
						break;
					};
					cmd
				}
			};
			let result = match &cmd {
				LaneCommand::Dispatch(msg) => dispatcher.dispatch(&mut self.vm, StreamKind::Control, msg),
				LaneCommand::Pipelined(msgs) => dispatcher.dispatch_pipelined(&mut self.vm, StreamKind::Control, msgs),
				LaneCommand::Stop => break,
			};
			match result {
				Ok(()) => {
					executed += cmd.instruction_count() as u64;
					let pending = self.rx.len();
					self.registry.update(&self.name, |rec| {
						rec.executed = executed;
						rec.pending = pending;
					});
				}
				Err(err) => {
					fatal = Some(err);
					break;
				}
			}
		}

		self.rx.close();
		let status = if fatal.is_some() { LaneStatus::Failed } else { LaneStatus::Stopped };
		let last_error = fatal.as_ref().map(ToString::to_string);
		self.registry.update(&self.name, |rec| {
			rec.status = status;
			rec.executed = executed;
			rec.pending = 0;
			rec.last_error = last_error;
		});
		match &fatal {
			Some(err) => tracing::error!(lane = %self.name, executed, error = %err, "lane.failed"),
			None => tracing::debug!(lane = %self.name, executed, "lane.stopped"),
		}

		LaneReport {
			vm: self.vm,
			executed,
			fatal,
		}
	}
}
