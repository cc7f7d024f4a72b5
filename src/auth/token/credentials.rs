//! Stored credential pairs and the grants that rotate them.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret, error::DecodingError};

/// Lifecycle status of stored credentials at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// No expiry is known; the access token is assumed usable.
	Unbounded,
	/// Access token is valid and outside the refresh window.
	Active,
	/// Access token expires within the refresh window.
	ExpiringSoon,
	/// Access token reached its expiry instant.
	Expired,
}
impl CredentialStatus {
	/// Classifies an access token expiring at `expires_at`, treating the last `window` before
	/// expiry as [`CredentialStatus::ExpiringSoon`].
	pub fn classify(
		expires_at: Option<OffsetDateTime>,
		now: OffsetDateTime,
		window: Duration,
	) -> Self {
		let Some(expires_at) = expires_at else {
			return Self::Unbounded;
		};

		if now >= expires_at {
			return Self::Expired;
		}
		if expires_at - now <= window {
			return Self::ExpiringSoon;
		}

		Self::Active
	}

	/// Returns `true` when the access token should be refreshed before use.
	pub fn needs_refresh(self) -> bool {
		matches!(self, Self::ExpiringSoon | Self::Expired)
	}
}

/// Access/refresh token pair owned by a token store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret exchanged for new pairs.
	pub refresh_token: TokenSecret,
	/// Expiry instant of the access token, when the server reported one.
	pub expires_at: Option<OffsetDateTime>,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(
		access_token: impl Into<TokenSecret>,
		refresh_token: impl Into<TokenSecret>,
		expires_at: Option<OffsetDateTime>,
	) -> Self {
		Self { access_token: access_token.into(), refresh_token: refresh_token.into(), expires_at }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Tokens returned by the identity server for a refresh exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
	/// Newly minted access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, if the server issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token relative to the moment it was received.
	pub expires_in: Option<Duration>,
}
impl TokenGrant {
	/// Creates a grant from raw token values.
	pub fn new(
		access_token: &str,
		refresh_token: Option<&str>,
		expires_in: Option<Duration>,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: refresh_token.map(TokenSecret::new),
			expires_in,
		}
	}

	/// Builds the credentials to persist, keeping `previous_refresh` when the server did not
	/// rotate the refresh token.
	///
	/// Fails with [`DecodingError::ExpiresInOutOfRange`] when `received_at + expires_in` is not a
	/// representable instant.
	pub fn into_credentials(
		self,
		previous_refresh: TokenSecret,
		received_at: OffsetDateTime,
	) -> Result<Credentials, DecodingError> {
		let expires_at = match self.expires_in {
			Some(lifetime) => Some(
				received_at.checked_add(lifetime).ok_or(DecodingError::ExpiresInOutOfRange)?,
			),
			None => None,
		};

		Ok(Credentials {
			access_token: self.access_token,
			refresh_token: self.refresh_token.unwrap_or(previous_refresh),
			expires_at,
		})
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn status_covers_window_boundaries() {
		let window = Duration::minutes(5);
		let expires_at = Some(macros::datetime!(2025-10-02 00:05 UTC));
		let at = |now: OffsetDateTime| CredentialStatus::classify(expires_at, now, window);

		assert_eq!(at(macros::datetime!(2025-10-01 23:59 UTC)), CredentialStatus::Active);
		assert_eq!(at(macros::datetime!(2025-10-02 00:00 UTC)), CredentialStatus::ExpiringSoon);
		assert_eq!(at(macros::datetime!(2025-10-02 00:05 UTC)), CredentialStatus::Expired);
		assert!(!CredentialStatus::Active.needs_refresh());
		assert!(CredentialStatus::ExpiringSoon.needs_refresh());
	}

	#[test]
	fn unknown_expiry_is_unbounded() {
		assert_eq!(
			CredentialStatus::classify(None, OffsetDateTime::now_utc(), Duration::minutes(5)),
			CredentialStatus::Unbounded
		);
		assert!(!CredentialStatus::Unbounded.needs_refresh());
	}

	#[test]
	fn grant_keeps_previous_refresh_when_not_rotated() {
		let received = macros::datetime!(2025-10-02 00:00 UTC);
		let grant = TokenGrant::new("access-new", None, Some(Duration::hours(1)));
		let credentials = grant
			.into_credentials(TokenSecret::new("refresh-old"), received)
			.expect("A one hour lifetime should produce a valid expiry.");

		assert_eq!(credentials.access_token.expose(), "access-new");
		assert_eq!(credentials.refresh_token.expose(), "refresh-old");
		assert_eq!(credentials.expires_at, Some(macros::datetime!(2025-10-02 01:00 UTC)));
	}

	#[test]
	fn unrepresentable_expiry_is_rejected() {
		let received = macros::datetime!(2025-10-02 00:00 UTC);
		let grant = TokenGrant::new("access-new", None, Some(Duration::seconds(1_000_000_000_000)));
		let err = grant
			.into_credentials(TokenSecret::new("refresh-old"), received)
			.expect_err("An expiry past the supported calendar range must be rejected.");

		assert!(matches!(err, DecodingError::ExpiresInOutOfRange));
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let grant = TokenGrant::new("access-secret", Some("refresh-secret"), None);
		let rendered = format!("{grant:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
	}
}
