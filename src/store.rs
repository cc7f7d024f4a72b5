//! Storage contracts and built-in credential stores.
//!
//! A store keeps credentials for any number of accounts and designates one of them as the
//! active session. Every [`TokenStore`] method operates on the active session and fails with
//! [`StoreError::NoActiveSession`] when there is none.

pub mod file;
pub mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret, UserId},
};

/// Boxed future returned by [`TokenStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistent credential storage for the active session.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the active session's access token.
	fn get_access_token(&self) -> StoreFuture<'_, TokenSecret>;

	/// Returns the active session's refresh token.
	fn get_refresh_token(&self) -> StoreFuture<'_, TokenSecret>;

	/// Returns the active session's access token expiry, if one was recorded.
	fn access_token_expiration(&self) -> StoreFuture<'_, Option<OffsetDateTime>>;

	/// Replaces the active session's credentials.
	fn set_tokens(&self, credentials: Credentials) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// No account is active, or the active account holds no credentials.
	#[error("No active session is available.")]
	NoActiveSession,
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Credentials for every known account plus the active-account pointer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBook {
	/// Account whose credentials back the [`TokenStore`] methods.
	pub active: Option<UserId>,
	/// Credentials keyed by account.
	pub accounts: HashMap<UserId, Credentials>,
}
impl AccountBook {
	/// Returns the active account's credentials.
	pub fn active_credentials(&self) -> Result<&Credentials, StoreError> {
		self.active
			.as_ref()
			.and_then(|user| self.accounts.get(user))
			.ok_or(StoreError::NoActiveSession)
	}

	/// Replaces the active account's credentials.
	pub fn set_active_credentials(&mut self, credentials: Credentials) -> Result<(), StoreError> {
		let user = self.active.clone().ok_or(StoreError::NoActiveSession)?;

		self.accounts.insert(user, credentials);

		Ok(())
	}

	/// Stores credentials for `user` and makes it the active account.
	pub fn sign_in(&mut self, user: UserId, credentials: Credentials) {
		self.accounts.insert(user.clone(), credentials);
		self.active = Some(user);
	}

	/// Switches the active account; returns `false` when the account is unknown.
	pub fn activate(&mut self, user: &UserId) -> bool {
		if !self.accounts.contains_key(user) {
			return false;
		}

		self.active = Some(user.clone());

		true
	}

	/// Drops an account's credentials, clearing the active pointer if it referenced the account.
	pub fn remove(&mut self, user: &UserId) -> Option<Credentials> {
		if self.active.as_ref() == Some(user) {
			self.active = None;
		}

		self.accounts.remove(user)
	}
}
