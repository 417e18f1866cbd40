use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timestamp overflow")]
pub struct TimestampOverflow;

/// A presentation timestamp in microseconds.
///
/// Microseconds are what the codec facility exchanges on its buffer descriptors, so the
/// unit is fixed rather than generic.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(u64);

impl Timestamp {
	/// The zero timestamp.
	pub const ZERO: Self = Self(0);

	pub const fn from_micros(micros: u64) -> Self {
		Self(micros)
	}

	pub const fn from_millis(millis: u64) -> Result<Self, TimestampOverflow> {
		match millis.checked_mul(1000) {
			Some(micros) => Ok(Self(micros)),
			None => Err(TimestampOverflow),
		}
	}

	pub const fn from_secs(seconds: u64) -> Result<Self, TimestampOverflow> {
		match seconds.checked_mul(1_000_000) {
			Some(micros) => Ok(Self(micros)),
			None => Err(TimestampOverflow),
		}
	}

	/// Get the timestamp as microseconds.
	pub const fn as_micros(self) -> u64 {
		self.0
	}

	/// Get the timestamp as milliseconds.
	pub const fn as_millis(self) -> u64 {
		self.0 / 1000
	}

	/// Get the timestamp as seconds.
	pub const fn as_secs(self) -> u64 {
		self.0 / 1_000_000
	}

	pub const fn checked_add(self, rhs: Self) -> Option<Self> {
		match self.0.checked_add(rhs.0) {
			Some(micros) => Some(Self(micros)),
			None => None,
		}
	}

	pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
		match self.0.checked_sub(rhs.0) {
			Some(micros) => Some(Self(micros)),
			None => None,
		}
	}
}

impl TryFrom<Duration> for Timestamp {
	type Error = TimestampOverflow;

	fn try_from(duration: Duration) -> Result<Self, Self::Error> {
		let micros = duration.as_micros().try_into().map_err(|_| TimestampOverflow)?;
		Ok(Self(micros))
	}
}

impl From<Timestamp> for Duration {
	fn from(timestamp: Timestamp) -> Self {
		Duration::from_micros(timestamp.0)
	}
}

impl std::fmt::Debug for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}µs", self.0)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}µs", self.0)
	}
}
