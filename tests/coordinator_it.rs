#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use account_tokens::{
	auth::UserId,
	coordinator::AccountTokenProvider,
	error::{DecodingError, Error},
	identity::{IdentityClient, IdentityConfig},
	store::{MemoryTokenStore, TokenStore},
	url::Url,
};

const ROTATED_BODY: &str = "{\"access_token\":\"access-2\",\"refresh_token\":\"refresh-2\",\"token_type\":\"bearer\",\"expires_in\":1800}";

fn user() -> UserId {
	UserId::new("user-1").expect("Fixture user identifier should be valid.")
}

fn build_provider(server: &MockServer) -> (AccountTokenProvider, Arc<MemoryTokenStore>) {
	let config = IdentityConfig::builder()
		.identity_base_url(
			Url::parse(&server.base_url())
				.expect("Mock server base URL should parse successfully."),
		)
		.allow_insecure(true)
		.build()
		.expect("Identity config should build for the mock server.");
	let client = IdentityClient::new(config).expect("Identity client should build successfully.");
	let store = Arc::new(MemoryTokenStore::default());

	store.sign_in(user(), "access-1", "refresh-1", None);

	(AccountTokenProvider::new(store.clone(), Arc::new(client)), store)
}

#[tokio::test]
async fn refresh_persists_rotated_pair() {
	let server = MockServer::start_async().await;
	let (provider, store) = build_provider(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token").body_includes("refresh_token=refresh-1");
			then.status(200).header("content-type", "application/json").body(ROTATED_BODY);
		})
		.await;
	let token = provider.refresh_token().await.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(token, "access-2");
	assert_eq!(provider.get_token().await.expect("Stored token should be readable."), "access-2");

	let credentials = store.credentials(&user()).expect("Credentials should remain stored.");

	assert_eq!(credentials.refresh_token.expose(), "refresh-2");
	assert!(credentials.expires_at.is_some());
	assert!(!provider.is_refreshing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_issue_a_single_request() {
	let server = MockServer::start_async().await;
	let (provider, _store) = build_provider(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(200))
				.body(ROTATED_BODY);
		})
		.await;
	let handles = (0..16)
		.map(|i| {
			let provider = provider.clone();

			tokio::spawn(async move {
				if i % 2 == 0 { provider.refresh_token().await } else { provider.get_token().await }
			})
		})
		.collect::<Vec<_>>();
	let mut refreshed = 0;

	for handle in handles {
		let token = handle
			.await
			.expect("Caller task should not panic.")
			.expect("Every caller should receive a token.");

		if token == "access-2" {
			refreshed += 1;
		}
	}

	mock.assert_calls_async(1).await;

	assert!(refreshed >= 8, "Every refresh caller should observe the new token.");
	assert_eq!(provider.metrics().network_calls(), 1);
}

#[tokio::test]
async fn invalid_grant_reaches_every_caller_and_the_handler() {
	let server = MockServer::start_async().await;
	let (provider, store) = build_provider(&server);
	let signed_out = store.clone();
	let provider = provider.with_refresh_error_handler(Arc::new(move |err: &Error| {
		if err.is_invalid_grant() {
			signed_out.sign_out(&user());
		}
	}));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(400)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(50))
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let (a, b) = tokio::join!(provider.refresh_token(), provider.refresh_token());

	mock.assert_calls_async(1).await;

	assert!(a.expect_err("First caller should fail.").is_invalid_grant());
	assert!(b.expect_err("Joined caller should fail.").is_invalid_grant());
	assert!(store.credentials(&user()).is_none());
	assert!(matches!(provider.get_token().await, Err(Error::NoActiveSession)));
}

#[tokio::test]
async fn non_rotating_response_keeps_the_refresh_token() {
	let server = MockServer::start_async().await;
	let (provider, store) = build_provider(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-2\",\"token_type\":\"bearer\"}");
		})
		.await;

	provider.refresh_token().await.expect("Refresh should succeed.");
	mock.assert_async().await;

	let refresh = store.get_refresh_token().await.expect("Refresh token should remain stored.");

	assert_eq!(refresh.expose(), "refresh-1");
	assert_eq!(store.access_token_expiration().await.expect("Expiry should be readable."), None);
}

#[tokio::test]
async fn malformed_response_leaves_the_store_untouched() {
	let server = MockServer::start_async().await;
	let (provider, store) = build_provider(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(200).header("content-type", "application/json").body("not json");
		})
		.await;
	let err = provider.refresh_token().await.expect_err("Malformed body must fail.");

	mock.assert_async().await;

	assert!(matches!(err, Error::DecodingFailure(_)), "Unexpected error: {err:?}.");
	assert_eq!(
		store.get_access_token().await.expect("Access token should remain stored.").expose(),
		"access-1"
	);
}

#[tokio::test]
async fn out_of_range_lifetime_is_a_decoding_failure() {
	let server = MockServer::start_async().await;
	let (provider, store) = build_provider(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/connect/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-2\",\"token_type\":\"bearer\",\"expires_in\":1000000000000}",
			);
		})
		.await;
	let err = provider.refresh_token().await.expect_err("Unrepresentable expiry must fail.");

	mock.assert_async().await;

	assert!(
		matches!(err, Error::DecodingFailure(DecodingError::ExpiresInOutOfRange)),
		"Unexpected error: {err:?}."
	);
	assert_eq!(provider.metrics().failures(), 1);
	assert!(!provider.is_refreshing());
	assert_eq!(
		store.get_access_token().await.expect("Access token should remain stored.").expose(),
		"access-1"
	);
}
