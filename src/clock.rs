//! Time sources used for expiry decisions.

// self
use crate::_prelude::*;

/// Supplies the current instant.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the instant treated as "now".
	fn now(&self) -> OffsetDateTime;
}

/// Wall clock backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock(RwLock<OffsetDateTime>);
impl FixedClock {
	/// Creates a clock frozen at `instant`.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(RwLock::new(instant))
	}

	/// Moves the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.write() = instant;
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		*self.0.write() += delta;
	}
}
impl Clock for FixedClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.read()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn fixed_clock_moves_only_when_told() {
		let clock = FixedClock::new(macros::datetime!(2025-10-02 00:00 UTC));

		assert_eq!(clock.now(), macros::datetime!(2025-10-02 00:00 UTC));

		clock.advance(Duration::minutes(3));

		assert_eq!(clock.now(), macros::datetime!(2025-10-02 00:03 UTC));

		clock.set(macros::datetime!(2026-01-01 00:00 UTC));

		assert_eq!(clock.now(), macros::datetime!(2026-01-01 00:00 UTC));
	}
}
