use std::sync::Arc;
use std::time::Duration;

use crate::{FrameDescriptor, MediaFormat};

/// A failure reported by the underlying codec engine.
///
/// This is the raw, classified form of whatever the platform surfaced. The adapter
/// translates it into [crate::Error] together with diagnostic context; the classification
/// here decides which taxonomy kind it becomes.
#[derive(thiserror::Error, Debug, Clone)]
pub enum EngineError {
	/// An I/O failure while handling a format payload.
	#[error("io: {0}")]
	Io(String),

	/// The engine was driven in a state it forbids.
	#[error("illegal state: {0}")]
	IllegalState(String),

	/// Any other engine-internal fault.
	#[error("{0}")]
	Other(String),
}

/// Outcome of an input-buffer dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
	/// A free input slot is available under this tag.
	Available(u32),

	/// No slot freed up within the timeout; poll again later.
	TryAgainLater,
}

/// Outcome of an output-buffer dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
	/// A decoded buffer is ready under this tag.
	Available { tag: u32, descriptor: FrameDescriptor },

	/// No output became ready within the timeout; poll again later.
	TryAgainLater,

	/// The negotiated output format changed; query it before consuming more buffers.
	FormatChanged,

	/// The output buffer set changed (legacy platforms); cached views are stale.
	BuffersChanged,
}

/// An external sink that decoded buffers may be delivered to.
///
/// Lifecycle is owned by the caller; the adapter and its engine only hold a shared
/// reference and never create or destroy the target.
pub trait RenderTarget: Send + Sync {
	/// Deliver one decoded buffer to the target.
	fn render(&self, buffer: &[u8], descriptor: &FrameDescriptor);
}

/// The contract a platform codec implementation must satisfy.
///
/// One engine wraps one codec resource. The engine owns its buffer pools; tags index
/// into them, are opaque to the adapter, and are reused after release. The engine is the
/// sole arbiter of tag validity.
pub trait CodecEngine: Send {
	/// Configure the codec with a format and an optional render target.
	///
	/// [EngineError::Io] means the format payload could not be handled;
	/// [EngineError::IllegalState] means the codec refused configuration outright.
	fn configure(
		&mut self,
		format: &MediaFormat,
		render: Option<Arc<dyn RenderTarget>>,
	) -> Result<(), EngineError>;

	/// Start accepting buffers.
	fn start(&mut self) -> Result<(), EngineError>;

	/// Stop the codec without releasing its resources.
	fn stop(&mut self);

	/// Release the codec resource. Must be idempotent.
	fn release(&mut self);

	/// The implementation's identifying name.
	///
	/// Fails with [EngineError::IllegalState] once the resource is released.
	fn name(&self) -> Result<String, EngineError>;

	/// Wait up to `timeout` for a free input slot.
	fn dequeue_input(&mut self, timeout: Duration) -> Result<InputStatus, EngineError>;

	/// Writable view of a dequeued input slot, sized to the slot's capacity.
	///
	/// `None` for tags the engine has not handed out.
	fn input_buffer(&mut self, tag: u32) -> Option<&mut [u8]>;

	/// Hand the slot back to the codec with the caller-filled descriptor.
	fn queue_input(&mut self, tag: u32, descriptor: FrameDescriptor) -> Result<(), EngineError>;

	/// Wait up to `timeout` for a decoded buffer or an out-of-band signal.
	fn dequeue_output(&mut self, timeout: Duration) -> Result<OutputStatus, EngineError>;

	/// Read-only view of a dequeued output slot.
	///
	/// `None` for tags the engine has not handed out.
	fn output_buffer(&mut self, tag: u32) -> Option<&[u8]>;

	/// Return the slot to the free pool, optionally delivering its contents to the
	/// configured render target first.
	fn release_output(&mut self, tag: u32, render: bool) -> Result<(), EngineError>;

	/// The negotiated output format.
	///
	/// May differ from the configured input format, e.g. for color format or dimension
	/// normalization.
	fn output_format(&self) -> Result<MediaFormat, EngineError>;
}
