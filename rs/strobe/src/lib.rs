//! # strobe: buffer-exchange decoder adapter
//!
//! `strobe` wraps a platform's asynchronous hardware/software codec facility behind a
//! uniform buffer-exchange contract, so a transcoding pipeline can push encoded data in
//! and pull decoded frames out without knowing codec-specific details.
//!
//! ## API
//!
//! The API is built around one adapter per decoded track:
//! - [Decoder]: the lifecycle state machine and buffer-exchange driver.
//! - [CodecBackend] / [CodecRegistry]: pluggable implementation resolution, injected at
//!   construction. Capability-aware platforms resolve through the registry; older ones
//!   fall back to instantiation by mime type.
//! - [CodecEngine]: the contract a platform codec implementation must satisfy.
//! - [MediaFormat]: the opaque key/value format descriptor consumed at initialization.
//!
//! A caller drives the adapter in a cooperative polling loop:
//! - [Decoder::dequeue_input_frame] for a free input slot (or [TRY_AGAIN_LATER]).
//! - [Decoder::get_input_frame] to fill the slot, then [Decoder::queue_input_frame].
//! - [Decoder::dequeue_output_frame] / [Decoder::get_output_frame] for decoded data.
//! - [Decoder::release_output_frame] to return the slot, optionally rendering it.
//!
//! The adapter is single-owner by contract: every exchange call takes `&mut self`, so
//! the borrow checker enforces the one-driver rule that the platform facility demands.
//!
//! The optional `ffmpeg` feature provides a software backend implementing the same
//! contract, useful on hosts without a platform codec service.

mod decoder;
mod engine;
mod error;
mod format;
mod frame;
mod registry;
mod timestamp;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use decoder::*;
pub use engine::*;
pub use error::*;
pub use format::*;
pub use frame::*;
pub use registry::*;
pub use timestamp::*;
