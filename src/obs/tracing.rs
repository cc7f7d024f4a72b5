// self
use crate::{_prelude::*, obs::Operation};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by provider operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: Operation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("account_tokens.op", op = op.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when a caller starts a new network refresh.
pub fn refresh_started(generation: u64) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(generation, "Starting token refresh.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = generation;
	}
}

/// Emits a debug event when a caller joins the refresh that is already in flight.
pub fn refresh_joined(generation: u64) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(generation, "Joining in-flight token refresh.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = generation;
	}
}

/// Emits an event once a refresh settles; failures are logged at `warn`.
pub fn refresh_settled(generation: u64, outcome: Result<(), &Error>) {
	#[cfg(feature = "tracing")]
	{
		match outcome {
			Ok(()) => tracing::debug!(generation, "Token refresh succeeded."),
			Err(error) => tracing::warn!(generation, %error, "Token refresh failed."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (generation, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn op_span_noop_without_tracing() {
		let _span = OpSpan::new(Operation::GetToken, "test");

		refresh_started(1);
		refresh_joined(1);
		refresh_settled(1, Err(&Error::RefreshAborted));
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OpSpan::new(Operation::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
