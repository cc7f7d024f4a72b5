//! Identity-server refresh exchange built on the `oauth2` client.
//!
//! [`IdentityClient`] sends `grant_type=refresh_token` requests with the configured public
//! client identifier and maps every failure into the crate taxonomy: transport problems become
//! [`Error::NetworkFailure`], unreadable bodies [`Error::DecodingFailure`], and OAuth error
//! responses either [`Error::InvalidGrant`] or [`Error::Rejected`].

mod classify;
pub mod config;

pub use config::*;

// crates.io
use oauth2::{
	AuthType, ClientId, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::TokenGrant,
	error::{ConfigError, DecodingError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type ConfiguredClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenGrant>> + 'a + Send>>;

/// Transport capable of exchanging a refresh token for a new token pair.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Exchanges `refresh_token` for a fresh grant.
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a>;
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_metadata: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) =>
				if inner.is_builder() {
					ConfigError::from(*inner).into()
				} else {
					TransportError::from(*inner).into()
				},
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::from(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message }.into(),
			_ => TransportError::Other { message: "unrecognized transport failure".into() }.into(),
		}
	}
}

/// Identity client specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestIdentityClient = IdentityClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// [`TokenRefresher`] that talks to an OAuth 2.0 identity server.
pub struct IdentityClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: IdentityConfig,
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> IdentityClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: IdentityConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(config.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			config,
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}

	/// Returns the configuration the client was built from.
	pub fn config(&self) -> &IdentityConfig {
		&self.config
	}
}
#[cfg(feature = "reqwest")]
impl IdentityClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client backed by a fresh reqwest transport that never follows redirects.
	pub fn new(config: IdentityConfig) -> Result<Self> {
		Self::with_http_client(config, ReqwestHttpClient::new()?, ReqwestTransportErrorMapper)
	}
}
impl<C, M> TokenRefresher for IdentityClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

			map_refresh_response(response)
		})
	}
}
impl<C, M> Debug for IdentityClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityClient").field("config", &self.config).finish()
	}
}

fn map_refresh_response(response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = match response.expires_in() {
		Some(lifetime) => {
			let secs = i64::try_from(lifetime.as_secs())
				.map_err(|_| DecodingError::ExpiresInOutOfRange)?;

			if secs <= 0 {
				return Err(DecodingError::NonPositiveExpiresIn.into());
			}

			Some(Duration::seconds(secs))
		},
		None => None,
	};

	Ok(TokenGrant::new(
		response.access_token().secret(),
		response.refresh_token().map(|token| token.secret().as_str()),
		expires_in,
	))
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let status = meta.as_ref().and_then(|value| value.status);
	let error_status = meta.as_ref().is_some_and(ResponseMetadata::is_error_status);

	match err {
		RequestTokenError::ServerResponse(response) => classify::server_response(
			status,
			response.error().as_ref(),
			response.error_description().map(String::as_str),
		),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta.as_ref(), error),
		RequestTokenError::Parse(_, body) if error_status =>
			classify::unstructured_body(status, &String::from_utf8_lossy(&body)),
		RequestTokenError::Parse(source, _) =>
			DecodingError::Json { source: Arc::new(source), status }.into(),
		RequestTokenError::Other(message) if error_status => Error::Rejected { message, status },
		RequestTokenError::Other(message) => DecodingError::Unexpected { message, status }.into(),
	}
}
