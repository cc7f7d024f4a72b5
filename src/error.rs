//! Crate-level error types shared by the coordinator, the identity client, and token stores.
//!
//! Every error is `Clone` because a single refresh failure fans out to every caller joined to the
//! in-flight refresh.

// self
use crate::{_prelude::*, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// The token store has no active session (no account, or no tokens for it).
	#[error("No active session is available.")]
	NoActiveSession,
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	NetworkFailure(#[from] TransportError),
	/// The identity server answered with a body that could not be decoded.
	#[error(transparent)]
	DecodingFailure(#[from] DecodingError),
	/// Storage-layer failure other than a missing session.
	#[error("{0}")]
	Storage(#[source] StoreError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Identity server rejected the refresh token; the session cannot be renewed.
	#[error("Identity server rejected the refresh token: {reason}.")]
	InvalidGrant {
		/// Server- or crate-supplied reason string.
		reason: String,
	},
	/// Identity server refused the request for a reason other than an invalid grant.
	#[error("Identity server rejected the refresh request: {message}.")]
	Rejected {
		/// Server- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The spawned refresh task ended without producing a result (panic or runtime shutdown).
	#[error("The in-flight refresh ended without producing a result.")]
	RefreshAborted,
}
impl Error {
	/// Returns `true` when the failure means the stored refresh token is no longer usable.
	pub fn is_invalid_grant(&self) -> bool {
		matches!(self, Self::InvalidGrant { .. })
	}
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::NoActiveSession => Self::NoActiveSession,
			other => Self::Storage(other),
		}
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: Arc<oauth2::http::Error>,
	},
	/// No token endpoint was configured.
	#[error("Missing identity token endpoint.")]
	MissingTokenEndpoint,
	/// Identity endpoint cannot be parsed.
	#[error("Identity endpoint is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Identity endpoint does not use HTTPS.
	#[error("The identity endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Client identifier is empty or contains whitespace.
	#[error("Client identifier `{client_id}` is invalid.")]
	InvalidClientId {
		/// Rejected client identifier.
		client_id: String,
	},
	/// No Tokio runtime is available to drive the refresh task.
	#[error("A Tokio runtime is required to run token refreshes.")]
	MissingRuntime,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Malformed or out-of-range refresh responses.
#[derive(Clone, Debug, ThisError)]
pub enum DecodingError {
	/// Identity server responded with JSON that could not be parsed.
	#[error("Identity server returned malformed JSON.")]
	Json {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Identity server returned an unexpected payload that the OAuth client could not accept.
	#[error("Identity server returned an unexpected response: {message}.")]
	Unexpected {
		/// Client-supplied description of the rejected payload.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// `expires_in` does not fit into the supported range.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// `expires_in` is zero.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity server.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity server.")]
	Io {
		/// IO failure.
		#[source]
		source: Arc<std::io::Error>,
	},
	/// Transport failed without a typed error.
	#[error("HTTP client error occurred while calling the identity server: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn missing_session_store_error_maps_to_no_active_session() {
		let err: Error = StoreError::NoActiveSession.into();

		assert!(matches!(err, Error::NoActiveSession));
	}

	#[test]
	fn backend_store_error_keeps_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let err: Error = store_error.clone().into();

		assert!(matches!(err, Error::Storage(_)));
		assert!(err.to_string().contains("disk unavailable"));

		let source = StdError::source(&err)
			.expect("Storage error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn cloned_network_errors_share_their_source() {
		let err = Error::from(TransportError::from(std::io::Error::other("connection reset")));
		let cloned = err.clone();

		assert!(matches!(cloned, Error::NetworkFailure(TransportError::Io { .. })));
		assert_eq!(err.to_string(), cloned.to_string());
		assert!(StdError::source(&cloned).is_some());
	}

	#[test]
	fn invalid_grant_helper_matches_only_invalid_grant() {
		assert!(Error::InvalidGrant { reason: "expired".into() }.is_invalid_grant());
		assert!(!Error::NoActiveSession.is_invalid_grant());
	}
}
