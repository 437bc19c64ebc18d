//! Abort handler: turns an intercepted response into the HTTP response.
//!
//! The captured body goes out verbatim with the status and headers the
//! interceptor left behind.

use axum::body::Body;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rulecache_core::ConflictError;

use crate::service::Intercepted;

impl IntoResponse for Intercepted {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Response telling the client (or a retrying proxy) to repeat the request
/// after a storage conflict.
#[must_use]
pub fn conflict_response(conflict: &ConflictError, retry_after_secs: u64) -> Response {
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, conflict.to_string()).into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}
