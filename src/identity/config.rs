//! Identity-server configuration and its validating builder.

// self
use crate::{_prelude::*, error::ConfigError};

/// Validated identity-server settings consumed by the identity client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
	/// Token endpoint receiving `grant_type=refresh_token` requests.
	pub token_endpoint: Url,
	/// Public client identifier sent in the form body.
	pub client_id: String,
}
impl IdentityConfig {
	/// Client identifier used when none is configured.
	pub const DEFAULT_CLIENT_ID: &'static str = "mobile";
	/// Path of the token endpoint relative to an identity base URL.
	pub const TOKEN_PATH: &'static str = "connect/token";

	/// Creates a new builder.
	pub fn builder() -> IdentityConfigBuilder {
		IdentityConfigBuilder::default()
	}
}

/// Builder for [`IdentityConfig`] values.
#[derive(Debug, Default)]
pub struct IdentityConfigBuilder {
	token_endpoint: Option<Url>,
	base_url: Option<Url>,
	client_id: Option<String>,
	allow_insecure: bool,
}
impl IdentityConfigBuilder {
	/// Sets the token endpoint explicitly.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Derives the token endpoint as `<base>/connect/token`; an explicit token endpoint wins.
	pub fn identity_base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Overrides the client identifier (defaults to [`IdentityConfig::DEFAULT_CLIENT_ID`]).
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Permits plain-HTTP endpoints, for local development servers only.
	pub fn allow_insecure(mut self, allow: bool) -> Self {
		self.allow_insecure = allow;

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<IdentityConfig, ConfigError> {
		let token_endpoint = match (self.token_endpoint, self.base_url) {
			(Some(url), _) => url,
			(None, Some(base)) => token_endpoint_from_base(base)?,
			(None, None) => return Err(ConfigError::MissingTokenEndpoint),
		};

		if !self.allow_insecure && token_endpoint.scheme() != "https" {
			return Err(ConfigError::InsecureEndpoint { url: token_endpoint.to_string() });
		}

		let client_id =
			self.client_id.unwrap_or_else(|| IdentityConfig::DEFAULT_CLIENT_ID.to_owned());

		if client_id.is_empty() || client_id.chars().any(char::is_whitespace) {
			return Err(ConfigError::InvalidClientId { client_id });
		}

		Ok(IdentityConfig { token_endpoint, client_id })
	}
}

fn token_endpoint_from_base(mut base: Url) -> Result<Url, ConfigError> {
	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base.join(IdentityConfig::TOKEN_PATH).map_err(|source| ConfigError::InvalidEndpoint { source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse identity URL fixture.")
	}

	#[test]
	fn base_url_keeps_existing_path_segments() {
		let config = IdentityConfig::builder()
			.identity_base_url(url("https://vault.example.com/identity"))
			.build()
			.expect("Base URL config should build.");

		assert_eq!(
			config.token_endpoint.as_str(),
			"https://vault.example.com/identity/connect/token"
		);
		assert_eq!(config.client_id, "mobile");
	}

	#[test]
	fn insecure_endpoints_need_opt_in() {
		let err = IdentityConfig::builder()
			.token_endpoint(url("http://127.0.0.1:8080/connect/token"))
			.build()
			.expect_err("Plain HTTP must be rejected by default.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { .. }));

		IdentityConfig::builder()
			.token_endpoint(url("http://127.0.0.1:8080/connect/token"))
			.allow_insecure(true)
			.build()
			.expect("Plain HTTP should be accepted after opting in.");
	}

	#[test]
	fn missing_endpoint_and_bad_client_id_are_rejected() {
		assert!(matches!(
			IdentityConfig::builder().build(),
			Err(ConfigError::MissingTokenEndpoint)
		));
		assert!(matches!(
			IdentityConfig::builder()
				.token_endpoint(url("https://identity.example.com/connect/token"))
				.client_id("two words")
				.build(),
			Err(ConfigError::InvalidClientId { .. })
		));
	}
}
