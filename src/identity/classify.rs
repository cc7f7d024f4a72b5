//! Classification of identity-server error responses.
//!
//! Structured OAuth fields win; plain bodies fall back to keyword matching. Only an invalid grant
//! is singled out, because it is the one failure that ends the session.

// self
use crate::_prelude::*;

const BODY_PREVIEW_LIMIT: usize = 256;

/// Maps a parsed OAuth error response into the crate taxonomy.
pub(crate) fn server_response(
	status: Option<u16>,
	oauth_error: &str,
	description: Option<&str>,
) -> Error {
	let message = match description {
		Some(description) => format!("{oauth_error}: {description}"),
		None => oauth_error.to_owned(),
	};

	if is_invalid_grant(oauth_error) || description.is_some_and(mentions_invalid_grant) {
		Error::InvalidGrant { reason: message }
	} else {
		Error::Rejected { message, status }
	}
}

/// Maps a non-2xx response whose body is not an OAuth error document.
pub(crate) fn unstructured_body(status: Option<u16>, body: &str) -> Error {
	let preview = truncate_preview(body.trim());

	if mentions_invalid_grant(&preview) {
		return Error::InvalidGrant { reason: preview };
	}

	let message = if preview.is_empty() {
		format!("HTTP {}", status.map_or_else(|| "error".to_owned(), |code| code.to_string()))
	} else {
		preview
	};

	Error::Rejected { message, status }
}

fn is_invalid_grant(value: &str) -> bool {
	value.eq_ignore_ascii_case("invalid_grant")
}

fn mentions_invalid_grant(text: &str) -> bool {
	text.to_ascii_lowercase().contains("invalid_grant")
}

fn truncate_preview(body: &str) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.to_owned();
	}

	let mut buf: String = body.chars().take(BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}
