//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret, UserId},
	store::{AccountBook, StoreError, StoreFuture, TokenStore},
};

type SharedBook = Arc<RwLock<AccountBook>>;

/// Storage backend that keeps credentials in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(SharedBook);
impl MemoryTokenStore {
	/// Stores credentials for `user` and makes it the active session.
	pub fn sign_in(
		&self,
		user: UserId,
		access_token: &str,
		refresh_token: &str,
		expires_at: Option<OffsetDateTime>,
	) {
		self.0.write().sign_in(user, Credentials::new(access_token, refresh_token, expires_at));
	}

	/// Switches the active session; returns `false` when the account is unknown.
	pub fn activate(&self, user: &UserId) -> bool {
		self.0.write().activate(user)
	}

	/// Removes an account's credentials.
	pub fn sign_out(&self, user: &UserId) -> Option<Credentials> {
		self.0.write().remove(user)
	}

	/// Returns a copy of the credentials stored for `user`.
	pub fn credentials(&self, user: &UserId) -> Option<Credentials> {
		self.0.read().accounts.get(user).cloned()
	}

	/// Returns the active account, if any.
	pub fn active_user(&self) -> Option<UserId> {
		self.0.read().active.clone()
	}

	fn read_active<T>(
		map: SharedBook,
		f: impl FnOnce(&Credentials) -> T,
	) -> Result<T, StoreError> {
		map.read().active_credentials().map(f)
	}
}
impl TokenStore for MemoryTokenStore {
	fn get_access_token(&self) -> StoreFuture<'_, TokenSecret> {
		let map = self.0.clone();

		Box::pin(async move { Self::read_active(map, |c| c.access_token.clone()) })
	}

	fn get_refresh_token(&self) -> StoreFuture<'_, TokenSecret> {
		let map = self.0.clone();

		Box::pin(async move { Self::read_active(map, |c| c.refresh_token.clone()) })
	}

	fn access_token_expiration(&self) -> StoreFuture<'_, Option<OffsetDateTime>> {
		let map = self.0.clone();

		Box::pin(async move { Self::read_active(map, |c| c.expires_at) })
	}

	fn set_tokens(&self, credentials: Credentials) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { map.write().set_active_credentials(credentials) })
	}
}
