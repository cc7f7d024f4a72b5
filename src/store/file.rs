//! File-backed [`TokenStore`] that persists the account book as JSON after each mutation.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret, UserId},
	store::{AccountBook, StoreError, StoreFuture, TokenStore},
};

/// Persists credentials to a JSON file, replacing it atomically on every write.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
	path: PathBuf,
	inner: Arc<RwLock<AccountBook>>,
}
impl FileTokenStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let book = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(book)) })
	}

	/// Stores credentials for `user`, makes it the active session, and persists the change.
	pub fn sign_in(&self, user: UserId, credentials: Credentials) -> Result<(), StoreError> {
		self.commit(|book| {
			book.sign_in(user, credentials);

			Ok(())
		})
	}

	/// Switches the active session; returns `Ok(false)` when the account is unknown.
	pub fn activate(&self, user: &UserId) -> Result<bool, StoreError> {
		self.commit(|book| Ok(book.activate(user)))
	}

	/// Removes an account's credentials and persists the change.
	pub fn sign_out(&self, user: &UserId) -> Result<Option<Credentials>, StoreError> {
		self.commit(|book| Ok(book.remove(user)))
	}

	/// Applies `change` to a copy of the book and swaps it in only once the copy is on disk, so a
	/// failed write leaves both the file and the in-memory view untouched.
	fn commit<T>(
		&self,
		change: impl FnOnce(&mut AccountBook) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();
		let value = change(&mut next)?;

		self.persist_locked(&next)?;
		*guard = next;

		Ok(value)
	}

	fn load_snapshot(path: &Path) -> Result<AccountBook, StoreError> {
		if !path.exists() {
			return Ok(AccountBook::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(AccountBook::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, book: &AccountBook) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(book).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize account book: {e}"),
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileTokenStore {
	fn get_access_token(&self) -> StoreFuture<'_, TokenSecret> {
		Box::pin(async move {
			self.inner.read().active_credentials().map(|c| c.access_token.clone())
		})
	}

	fn get_refresh_token(&self) -> StoreFuture<'_, TokenSecret> {
		Box::pin(async move {
			self.inner.read().active_credentials().map(|c| c.refresh_token.clone())
		})
	}

	fn access_token_expiration(&self) -> StoreFuture<'_, Option<OffsetDateTime>> {
		Box::pin(async move { self.inner.read().active_credentials().map(|c| c.expires_at) })
	}

	fn set_tokens(&self, credentials: Credentials) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.commit(|book| book.set_active_credentials(credentials)) })
	}
}
