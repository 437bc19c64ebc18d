//! Tower integration: runs the dispatcher around an HTTP service.
//!
//! Per request, in order:
//! 1. build a [`CacheRequest`]; the published resource is read from the
//!    request extensions, where routing put it
//! 2. `intercept`; an abort is answered by the abort handler and the inner
//!    service never runs
//! 3. call the inner service
//! 4. run the [`TransformChain`] over the body unless disabled
//! 5. merge headers set during intercept, then `mutate` the final headers
//!
//! A [`DispatchError::Conflict`] from either hook becomes `503` with
//! `Retry-After`. A body that fails while buffered for the transforms becomes
//! `502` and `mutate` does not run.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{to_bytes, Body, HttpBody};
use axum::extract::Request;
use axum::http::header::CONTENT_LENGTH;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rulecache_core::{CacheRequest, CacheResponse, Published};
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::handlers::conflict_response;
use super::transform::TransformChain;
use crate::service::{CacheDispatcher, DispatchError, Interception};

// ---------------------------------------------------------------------------
// CachingLayer
// ---------------------------------------------------------------------------

/// Tower layer wrapping services with the caching hooks.
#[derive(Clone)]
pub struct CachingLayer {
    dispatcher: Arc<CacheDispatcher>,
    transforms: Arc<TransformChain>,
}

impl CachingLayer {
    #[must_use]
    pub fn new(dispatcher: Arc<CacheDispatcher>) -> Self {
        Self {
            dispatcher,
            transforms: Arc::new(TransformChain::new()),
        }
    }

    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformChain) -> Self {
        self.transforms = Arc::new(transforms);
        self
    }
}

impl<S> Layer<S> for CachingLayer {
    type Service = CachingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CachingService {
            inner,
            dispatcher: Arc::clone(&self.dispatcher),
            transforms: Arc::clone(&self.transforms),
        }
    }
}

// ---------------------------------------------------------------------------
// CachingService
// ---------------------------------------------------------------------------

/// Service wrapper running `intercept` before and `mutate` after the inner
/// service.
#[derive(Clone)]
pub struct CachingService<S> {
    inner: S,
    dispatcher: Arc<CacheDispatcher>,
    transforms: Arc<TransformChain>,
}

impl<S> Service<Request> for CachingService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // The clone is not guaranteed ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let dispatcher = Arc::clone(&self.dispatcher);
        let transforms = Arc::clone(&self.transforms);

        Box::pin(async move {
            let cache_request = cache_request(&request);
            let retry_after = dispatcher.config().conflict_retry_after_secs;

            let mut intercepted = CacheResponse::new();
            match dispatcher.intercept(&cache_request, &mut intercepted) {
                Ok(Interception::Continue) => {}
                Ok(Interception::Abort(response)) => return Ok(response.into_response()),
                Err(DispatchError::Conflict(conflict)) => {
                    return Ok(conflict_response(&conflict, retry_after));
                }
            }

            let response = inner.call(request).await?;
            let (mut parts, body) = response.into_parts();

            let body = if transforms.applies_to(&cache_request) {
                let limit = dispatcher.config().max_body_bytes;
                match transform_body(&transforms, &cache_request, body, limit).await {
                    Transformed::Changed(bytes) => {
                        parts.headers.remove(CONTENT_LENGTH);
                        Body::from(bytes)
                    }
                    Transformed::Unchanged(body) => body,
                    Transformed::Failed => {
                        return Ok((
                            StatusCode::BAD_GATEWAY,
                            "upstream response body could not be read",
                        )
                            .into_response());
                    }
                }
            } else {
                body
            };

            let mut final_response =
                CacheResponse::from_parts(parts.status, std::mem::take(&mut parts.headers));
            final_response.extend_headers(intercepted.into_headers());
            if let Err(DispatchError::Conflict(conflict)) =
                dispatcher.mutate(&cache_request, &mut final_response)
            {
                return Ok(conflict_response(&conflict, retry_after));
            }

            parts.status = final_response.status();
            parts.headers = final_response.into_headers();
            Ok(Response::from_parts(parts, body))
        })
    }
}

/// Request view handed to the dispatcher.
fn cache_request(request: &Request) -> CacheRequest {
    let cache_request = CacheRequest::new(request.method().clone(), request.uri().path())
        .with_headers(request.headers().clone());
    match request.extensions().get::<Published>() {
        Some(published) => cache_request.with_published(published.clone()),
        None => cache_request,
    }
}

enum Transformed {
    Changed(bytes::Bytes),
    Unchanged(Body),
    Failed,
}

/// Buffers the body and runs the transform chain over it. Bodies without a
/// known size within `limit` are streamed through untouched.
async fn transform_body(
    transforms: &TransformChain,
    request: &CacheRequest,
    body: Body,
    limit: usize,
) -> Transformed {
    let bounded = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= limit as u64);
    if !bounded {
        debug!(path = %request.path, limit, "body too large or unbounded, skipping transforms");
        return Transformed::Unchanged(body);
    }

    match to_bytes(body, limit).await {
        Ok(bytes) => Transformed::Changed(transforms.apply(request, bytes)),
        Err(err) => {
            warn!(path = %request.path, error = %err, "failed to read response body for transforms");
            Transformed::Failed
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::header::RETRY_AFTER;
    use axum::routing::get;
    use axum::Router;
    use bytes::Bytes;
    use http_body::{Frame, SizeHint};
    use rulecache_core::{
        headers::{X_CACHE_OPERATION, X_CACHE_RULE},
        Settings,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::network::transform::Transform;
    use crate::service::DispatchConfig;
    use crate::testing::{cache_settings, fixture_registry, FixedLookup};

    struct Upper;

    impl Transform for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn transform(&self, _request: &CacheRequest, body: Bytes) -> anyhow::Result<Bytes> {
            Ok(Bytes::from(body.to_ascii_uppercase()))
        }
    }

    fn dispatcher(settings: Settings, lookup: FixedLookup) -> Arc<CacheDispatcher> {
        Arc::new(CacheDispatcher::new(
            Arc::new(Arc::new(settings)),
            Arc::new(lookup),
            Arc::new(fixture_registry()),
            DispatchConfig::default(),
        ))
    }

    fn app(layer: CachingLayer, calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/doc",
                get(move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        ([("x-resource", "1")], "hello")
                    }
                }),
            )
            .layer(layer)
    }

    fn published_request() -> Request {
        Request::builder()
            .uri("/doc")
            .extension(Published::new("document", "view"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_of(response: Response) -> Bytes {
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn abort_short_circuits_inner_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CachingLayer::new(dispatcher(
            cache_settings(true, &[("testrule", "op.header")], &[("testrule", "op.abort")]),
            FixedLookup::rule("testrule"),
        ))
        .with_transforms(TransformChain::new().with(Upper));

        let response = app(layer, Arc::clone(&calls))
            .oneshot(published_request())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers().get(X_CACHE_RULE).unwrap(), "testrule");
        assert_eq!(response.headers().get(X_CACHE_OPERATION).unwrap(), "op.abort");
        assert!(response.headers().get("x-cache-foo").is_none());
        assert_eq!(body_of(response).await, "foo");
    }

    #[tokio::test]
    async fn mutation_headers_reach_final_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CachingLayer::new(dispatcher(
            cache_settings(true, &[("testrule", "op.header")], &[("testrule", "op.header2")]),
            FixedLookup::rule("testrule"),
        ))
        .with_transforms(TransformChain::new().with(Upper));

        let response = app(layer, Arc::clone(&calls))
            .oneshot(published_request())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("x-resource").unwrap(), "1");
        assert_eq!(headers.get("x-cache-foo").unwrap(), "foo");
        assert_eq!(headers.get_all(X_CACHE_RULE).iter().count(), 1);
        assert_eq!(headers.get(X_CACHE_OPERATION).unwrap(), "op.header");
        assert_eq!(body_of(response).await, "HELLO");
    }

    #[tokio::test]
    async fn unpublished_request_passes_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CachingLayer::new(dispatcher(
            cache_settings(true, &[("testrule", "op.header")], &[("testrule", "op.abort")]),
            FixedLookup::rule("testrule"),
        ));
        let request = Request::builder().uri("/doc").body(Body::empty()).unwrap();

        let response = app(layer, Arc::clone(&calls)).oneshot(request).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(response.headers().get(X_CACHE_RULE).is_none());
        assert_eq!(body_of(response).await, "hello");
    }

    #[tokio::test]
    async fn oversized_body_skips_transforms() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(CacheDispatcher::new(
            Arc::new(Arc::new(cache_settings(true, &[], &[]))),
            Arc::new(FixedLookup::rule("testrule")),
            Arc::new(fixture_registry()),
            DispatchConfig {
                max_body_bytes: 2,
                ..DispatchConfig::default()
            },
        ));
        let layer = CachingLayer::new(dispatcher).with_transforms(TransformChain::new().with(Upper));

        let response = app(layer, calls).oneshot(published_request()).await.unwrap();
        assert_eq!(body_of(response).await, "hello");
    }

    #[tokio::test]
    async fn intercept_conflict_returns_503() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CachingLayer::new(dispatcher(
            cache_settings(true, &[], &[("testrule", "op.conflict")]),
            FixedLookup::rule("testrule"),
        ));

        let response = app(layer, Arc::clone(&calls))
            .oneshot(published_request())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "1");
    }

    #[tokio::test]
    async fn mutate_conflict_returns_503() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CachingLayer::new(dispatcher(
            cache_settings(true, &[("testrule", "op.conflict")], &[]),
            FixedLookup::rule("testrule"),
        ));

        let response = app(layer, Arc::clone(&calls))
            .oneshot(published_request())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn swallowed_fault_still_serves_resource() {
        let calls = Arc::new(AtomicUsize::new(0));
        let layer = CachingLayer::new(dispatcher(
            cache_settings(true, &[("testrule", "op.fail")], &[("testrule", "op.fail")]),
            FixedLookup::rule("testrule"),
        ));

        let response = app(layer, Arc::clone(&calls))
            .oneshot(published_request())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(X_CACHE_OPERATION).unwrap(), "op.fail");
        assert_eq!(body_of(response).await, "hello");
    }

    /// Announces five bytes, then fails on the first read.
    struct ResetBody;

    impl HttpBody for ResetBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
            Poll::Ready(Some(Err(io::Error::other("upstream reset"))))
        }

        fn size_hint(&self) -> SizeHint {
            SizeHint::with_exact(5)
        }
    }

    #[tokio::test]
    async fn unreadable_body_is_bad_gateway_without_mutation() {
        let layer = CachingLayer::new(dispatcher(
            cache_settings(true, &[("testrule", "op.header")], &[]),
            FixedLookup::rule("testrule"),
        ))
        .with_transforms(TransformChain::new().with(Upper));
        let app = Router::new()
            .route("/doc", get(|| async { Body::new(ResetBody) }))
            .layer(layer);

        let response = app.oneshot(published_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get("x-cache-foo").is_none());
        assert!(response.headers().get(X_CACHE_RULE).is_none());
    }
}
