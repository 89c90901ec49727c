//! Shared HTTP plumbing for both store clients.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};

use tablesync_connector::{StoreError, StoreResult};

/// Build a client that sends the given bearer token on every request.
pub(crate) fn build_client(api_key: &str) -> StoreResult<Client> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| StoreError::invalid_configuration("api key is not a valid header value"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| StoreError::connection_failed_with_source("failed to build HTTP client", e))
}

/// Map a transport-level failure onto a store error.
pub(crate) fn transport_error(operation: &str, err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::connection_failed_with_source(format!("{operation}: request timed out"), err)
    } else if err.is_connect() {
        StoreError::connection_failed_with_source(format!("{operation}: connect failed"), err)
    } else if err.is_decode() {
        StoreError::invalid_response_with_source(format!("{operation}: undecodable body"), err)
    } else {
        StoreError::operation_failed_with_source(operation.to_string(), err)
    }
}

/// Turn a non-success status into the matching store error.
pub(crate) fn check_status(operation: &str, response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::AuthenticationFailed,
        StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited {
            retry_after_secs: retry_after_secs(&response),
        },
        s if s.is_server_error() => {
            StoreError::connection_failed(format!("{operation}: platform returned {s}"))
        }
        s => StoreError::operation_failed(format!("{operation}: platform returned {s}")),
    };
    Err(err)
}

fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
