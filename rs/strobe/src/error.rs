use std::fmt;

use crate::{DecoderState, EngineError, MediaFormat};

/// Diagnostic context attached to initialization failures.
///
/// Callers logging a failure are expected to preserve this payload verbatim: it records
/// what was requested, what (if anything) was resolved, and what the capability registry
/// looked like at the time.
#[derive(Debug, Clone)]
pub struct Diagnostics {
	/// The format that initialization was asked to satisfy.
	pub format: MediaFormat,

	/// The resolved implementation name, if a codec was created.
	pub codec: Option<String>,

	/// The registry state, if a capability registry was consulted.
	pub registry: Option<String>,
}

impl fmt::Display for Diagnostics {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "format=[{}]", self.format)?;
		write!(f, " codec={}", self.codec.as_deref().unwrap_or("<none>"))?;
		write!(f, " registry={}", self.registry.as_deref().unwrap_or("<none>"))
	}
}

/// A list of possible failures reported by the decoder adapter.
///
/// Transient "no buffer ready" outcomes are never errors; those are sentinel values
/// returned by the dequeue calls.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// No implementation could be resolved for the requested format.
	#[error("decoder not found: {context}")]
	NotFound { context: Diagnostics },

	/// The platform reported a format-related I/O failure while creating or
	/// configuring the codec.
	#[error("decoder format not found: {context}")]
	FormatNotFound {
		context: Diagnostics,
		#[source]
		source: EngineError,
	},

	/// The platform rejected configuration of an otherwise-created codec.
	///
	/// The partially-created codec was already torn down by the time this surfaces.
	#[error("decoder configuration failed: {context}")]
	Configuration {
		context: Diagnostics,
		#[source]
		source: EngineError,
	},

	/// An unexpected fault inside an already-configured codec.
	#[error("internal codec error")]
	Internal(#[source] EngineError),

	/// The underlying codec resource has already been released.
	#[error("codec is in released state")]
	Released,

	/// An operation was invoked in a lifecycle state that forbids it.
	#[error("invalid state: {op} while {state:?}")]
	InvalidState { op: &'static str, state: DecoderState },
}

pub type Result<T> = std::result::Result<T, Error>;
