//! Hooks notified when a refresh fails.

// self
use crate::_prelude::*;

/// Boxed future returned by [`RefreshErrorHandler::on_refresh_error`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Reacts to failed refreshes, e.g. by signing the account out after an invalid grant.
///
/// The handler runs once per failed refresh, after the in-flight handle has been cleared and
/// before any caller observes the error.
pub trait RefreshErrorHandler
where
	Self: Send + Sync,
{
	/// Called with the error every joined caller is about to receive.
	fn on_refresh_error<'a>(&'a self, error: &'a Error) -> HandlerFuture<'a>;
}
impl<F> RefreshErrorHandler for F
where
	F: Send + Sync + Fn(&Error),
{
	fn on_refresh_error<'a>(&'a self, error: &'a Error) -> HandlerFuture<'a> {
		self(error);

		Box::pin(std::future::ready(()))
	}
}
