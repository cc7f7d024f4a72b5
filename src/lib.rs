//! Account token provider for authenticated API clients: hands out access tokens, refreshes them
//! against an identity server, and collapses concurrent refreshes into a single in-flight call.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod identity;
pub mod obs;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use tokio::sync::Semaphore;
	// self
	use crate::{
		auth::{TokenGrant, UserId},
		clock::FixedClock,
		coordinator::AccountTokenProvider,
		identity::{RefreshFuture, TokenRefresher},
		store::{MemoryTokenStore, TokenStore},
	};

	/// Scripted [`TokenRefresher`] that counts calls, replays queued outcomes, and can hold every
	/// call open until the test releases it.
	#[derive(Debug, Default)]
	pub struct ScriptedRefresher {
		calls: AtomicUsize,
		outcomes: Mutex<VecDeque<Result<TokenGrant>>>,
		seen_refresh_tokens: Mutex<Vec<String>>,
		gate: Option<Semaphore>,
	}
	impl ScriptedRefresher {
		/// Creates a refresher that answers immediately.
		pub fn open() -> Self {
			Self::default()
		}

		/// Creates a refresher whose calls block until [`ScriptedRefresher::release`] is called.
		pub fn gated() -> Self {
			Self { gate: Some(Semaphore::new(0)), ..Self::default() }
		}

		/// Queues the outcome returned by the next unanswered call.
		pub fn push(&self, outcome: Result<TokenGrant>) -> &Self {
			self.outcomes.lock().push_back(outcome);

			self
		}

		/// Queues a successful grant with a one hour lifetime.
		pub fn push_grant(&self, access: &str, refresh: &str) -> &Self {
			self.push(Ok(TokenGrant::new(access, Some(refresh), Some(Duration::hours(1)))))
		}

		/// Lets `count` blocked calls proceed.
		pub fn release(&self, count: usize) {
			if let Some(gate) = &self.gate {
				gate.add_permits(count);
			}
		}

		/// Number of refresh calls observed so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		/// Refresh tokens presented to the refresher, in call order.
		pub fn seen_refresh_tokens(&self) -> Vec<String> {
			self.seen_refresh_tokens.lock().clone()
		}
	}
	impl TokenRefresher for ScriptedRefresher {
		fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);
				self.seen_refresh_tokens.lock().push(refresh_token.to_owned());

				if let Some(gate) = &self.gate {
					gate.acquire()
						.await
						.map_err(|_| Error::RefreshAborted)?
						.forget();
				}

				self.outcomes.lock().pop_front().unwrap_or(Err(Error::RefreshAborted))
			})
		}
	}

	/// Fixed "now" used by fixtures: 2025-10-02 00:00 UTC.
	pub const FIXTURE_NOW: OffsetDateTime = time::macros::datetime!(2025-10-02 00:00 UTC);

	/// Builds a memory store signed in as `user-1` with the provided tokens.
	pub fn signed_in_store(
		access: &str,
		refresh: &str,
		expires_at: Option<OffsetDateTime>,
	) -> Arc<MemoryTokenStore> {
		let store = MemoryTokenStore::default();
		let user = UserId::new("user-1").expect("Fixture user identifier should be valid.");

		store.sign_in(user, access, refresh, expires_at);

		Arc::new(store)
	}

	/// Builds a provider over the given store and refresher with the fixture clock.
	pub fn build_test_provider(
		store: Arc<MemoryTokenStore>,
		refresher: Arc<ScriptedRefresher>,
	) -> AccountTokenProvider {
		let store: Arc<dyn TokenStore> = store;

		AccountTokenProvider::new(store, refresher)
			.with_clock(Arc::new(FixedClock::new(FIXTURE_NOW)))
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
