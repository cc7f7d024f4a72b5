//! Access-token provider that coalesces concurrent refreshes into a single identity call.
//!
//! [`AccountTokenProvider`] is the only component that talks to both the [`TokenStore`] and the
//! [`TokenRefresher`]. At most one refresh is in flight at any time: the first caller of
//! [`AccountTokenProvider::refresh_token`] spawns it, and every caller arriving while it runs
//! (through `refresh_token`, `get_token`, or `get_valid_token`) awaits the same shared result.
//!
//! The refresh runs on its own Tokio task, so dropping a waiting caller never cancels it. The task
//! clears the in-flight handle before publishing its result; a caller that observes the outcome
//! therefore always finds the provider idle again, and a later request starts a new call. A task
//! that panics, or that a shutting-down runtime drops before it ever runs, clears the handle too
//! and its waiters receive [`Error::RefreshAborted`].

mod handler;
mod metrics;

pub use handler::*;
pub use metrics::RefreshMetrics;

// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::{runtime::Handle, sync::oneshot};
// self
use crate::{
	_prelude::*,
	auth::CredentialStatus,
	clock::{Clock, SystemClock},
	error::ConfigError,
	identity::TokenRefresher,
	obs::{self, OpOutcome, OpSpan, Operation},
	store::TokenStore,
};

type SharedRefresh = Shared<BoxFuture<'static, Result<String>>>;
type SharedHandler = Arc<RwLock<Option<Arc<dyn RefreshErrorHandler>>>>;

/// Whether a refresh is currently in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshState {
	/// No refresh is running.
	Idle,
	/// A refresh is running; new requests join it.
	Refreshing,
}

/// Hands out access tokens for the active account and refreshes them on demand.
#[derive(Clone)]
pub struct AccountTokenProvider {
	store: Arc<dyn TokenStore>,
	refresher: Arc<dyn TokenRefresher>,
	clock: Arc<dyn Clock>,
	refresh_window: Duration,
	error_handler: SharedHandler,
	slot: Arc<Mutex<RefreshSlot>>,
	metrics: Arc<RefreshMetrics>,
}
impl AccountTokenProvider {
	/// Window before expiry in which [`AccountTokenProvider::get_valid_token`] refreshes.
	pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::minutes(5);

	/// Creates an idle provider backed by the system clock and the default refresh window.
	pub fn new(store: Arc<dyn TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
		Self {
			store,
			refresher,
			clock: Arc::new(SystemClock),
			refresh_window: Self::DEFAULT_REFRESH_WINDOW,
			error_handler: Default::default(),
			slot: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the clock used for expiry decisions.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides how close to expiry a token may get before
	/// [`AccountTokenProvider::get_valid_token`] refreshes it.
	pub fn with_refresh_window(mut self, window: Duration) -> Self {
		self.refresh_window = window;

		self
	}

	/// Installs a handler notified once per failed refresh.
	pub fn with_refresh_error_handler(self, handler: Arc<dyn RefreshErrorHandler>) -> Self {
		self.set_refresh_error_handler(Some(handler));

		self
	}

	/// Installs or removes the failed-refresh handler.
	///
	/// The change applies to refreshes that settle afterwards, including one already in flight.
	pub fn set_refresh_error_handler(&self, handler: Option<Arc<dyn RefreshErrorHandler>>) {
		*self.error_handler.write() = handler;
	}

	/// Returns the current access token.
	///
	/// While a refresh is in flight this awaits it and returns the refreshed token (or its error);
	/// otherwise it reads the store. It never starts a refresh.
	pub async fn get_token(&self) -> Result<String> {
		const OP: Operation = Operation::GetToken;

		let span = OpSpan::new(OP, "get_token");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				match self.join_in_flight() {
					Some(task) => task.await,
					None => self.stored_access_token().await,
				}
			})
			.await;

		record_result(OP, &result);

		result
	}

	/// Refreshes the token pair and returns the new access token.
	///
	/// Joins the refresh already in flight when there is one; otherwise starts a new one that
	/// reads the stored refresh token, exchanges it, and persists the returned pair.
	pub async fn refresh_token(&self) -> Result<String> {
		const OP: Operation = Operation::Refresh;

		let span = OpSpan::new(OP, "refresh_token");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span.instrument(self.request_refresh()).await;

		record_result(OP, &result);

		result
	}

	/// Returns an access token that is not within the refresh window of its expiry.
	///
	/// Joins an in-flight refresh, refreshes when the stored token is expired or expiring soon,
	/// and otherwise returns the stored token. Tokens whose expiry is unknown, or cannot be read,
	/// are returned as stored.
	pub async fn get_valid_token(&self) -> Result<String> {
		const OP: Operation = Operation::GetValidToken;

		let span = OpSpan::new(OP, "get_valid_token");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				if let Some(task) = self.join_in_flight() {
					return task.await;
				}

				let expires_at = self.store.access_token_expiration().await.ok().flatten();
				let status =
					CredentialStatus::classify(expires_at, self.clock.now(), self.refresh_window);

				if status.needs_refresh() {
					self.request_refresh().await
				} else {
					self.stored_access_token().await
				}
			})
			.await;

		record_result(OP, &result);

		result
	}

	/// Returns `true` while a refresh is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.slot.lock().current.is_some()
	}

	/// Returns the refresh state machine's current state.
	pub fn state(&self) -> RefreshState {
		if self.is_refreshing() { RefreshState::Refreshing } else { RefreshState::Idle }
	}

	/// Returns refresh counters for this provider and its clones.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	async fn stored_access_token(&self) -> Result<String> {
		Ok(self.store.get_access_token().await?.into_inner())
	}

	async fn request_refresh(&self) -> Result<String> {
		self.metrics.record_request();

		self.join_or_start()?.await
	}

	fn join_in_flight(&self) -> Option<SharedRefresh> {
		let slot = self.slot.lock();
		let in_flight = slot.current.as_ref()?;

		self.metrics.record_joined();
		obs::refresh_joined(in_flight.generation);

		Some(in_flight.task.clone())
	}

	fn join_or_start(&self) -> Result<SharedRefresh> {
		let mut slot = self.slot.lock();

		if let Some(in_flight) = &slot.current {
			self.metrics.record_joined();
			obs::refresh_joined(in_flight.generation);

			return Ok(in_flight.task.clone());
		}

		let runtime = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
		let generation = slot.next_generation;
		let (sender, receiver) = oneshot::channel::<Result<String>>();
		let task =
			async move { receiver.await.unwrap_or(Err(Error::RefreshAborted)) }.boxed().shared();

		slot.next_generation = generation.wrapping_add(1);
		slot.current = Some(InFlight { generation, task: task.clone() });

		drop(slot);

		let job = RefreshJob {
			store: self.store.clone(),
			refresher: self.refresher.clone(),
			clock: self.clock.clone(),
			error_handler: self.error_handler.clone(),
			metrics: self.metrics.clone(),
		};
		let clear = ClearSlot { slot: self.slot.clone(), generation };
		let span = OpSpan::new(Operation::Refresh, "network_refresh");

		self.metrics.record_network_call();
		obs::refresh_started(generation);

		// The slot is filled and unlocked here: dropping the job at any point, even unpolled by a
		// runtime that is shutting down, clears it and resolves waiters with `RefreshAborted`.
		runtime.spawn(span.instrument(job.run(clear, sender)));

		Ok(task)
	}
}
impl Debug for AccountTokenProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccountTokenProvider")
			.field("refresh_window", &self.refresh_window)
			.field("state", &self.state())
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

#[derive(Default)]
struct RefreshSlot {
	next_generation: u64,
	current: Option<InFlight>,
}

struct InFlight {
	generation: u64,
	task: SharedRefresh,
}

struct RefreshJob {
	store: Arc<dyn TokenStore>,
	refresher: Arc<dyn TokenRefresher>,
	clock: Arc<dyn Clock>,
	error_handler: SharedHandler,
	metrics: Arc<RefreshMetrics>,
}
impl RefreshJob {
	async fn run(self, clear: ClearSlot, sender: oneshot::Sender<Result<String>>) {
		let generation = clear.generation;
		let result = self.perform().await;

		drop(clear);

		match &result {
			Ok(_) => self.metrics.record_success(),
			Err(e) => {
				self.metrics.record_failure();

				let handler = self.error_handler.read().clone();

				if let Some(handler) = handler {
					handler.on_refresh_error(e).await;
				}
			},
		}

		obs::refresh_settled(generation, result.as_ref().map(|_| ()));

		// Every waiter may be gone already.
		let _ = sender.send(result);
	}

	async fn perform(&self) -> Result<String> {
		let refresh_token = self.store.get_refresh_token().await?;
		let grant = self.refresher.refresh(refresh_token.expose()).await?;
		let access_token = grant.access_token.expose().to_owned();
		let credentials = grant.into_credentials(refresh_token, self.clock.now())?;

		self.store.set_tokens(credentials).await?;

		Ok(access_token)
	}
}

struct ClearSlot {
	slot: Arc<Mutex<RefreshSlot>>,
	generation: u64,
}
impl Drop for ClearSlot {
	fn drop(&mut self) {
		let mut slot = self.slot.lock();

		if slot.current.as_ref().is_some_and(|in_flight| in_flight.generation == self.generation) {
			slot.current = None;
		}
	}
}

fn record_result<T>(op: Operation, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_op_outcome(op, OpOutcome::Success),
		Err(_) => obs::record_op_outcome(op, OpOutcome::Failure),
	}
}
