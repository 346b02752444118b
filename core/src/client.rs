//! Request execution: options in, decoded response or classified error out.
//!
//! # Design
//! `Client` owns its options, its transport handle and its cache policy.
//! Verb methods only rewrite the options and apply them to the handle; the
//! `prepare_*` variants stop there so a configured client can be executed
//! later with `exec()`. Execution is blocking and single-threaded: the only
//! suspension point is the transport call (or the cache lookup).
//!
//! Everything `exec()` derives from the request (the snapshot stored in the
//! response, cache eligibility, the cache key) comes from what was last
//! applied to the handle, never from options edited since.
//!
//! Classification order: an error status on the final hop's header block
//! beats a transport failure, and both carry the decoded response.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{fingerprint, CacheDependency, CachePolicy, CachedTransfer, ResultCache};
use crate::error::Error;
use crate::handle::{TransportFailure, TransportHandle};
use crate::hooks::RequestHooks;
use crate::http::{Payload, RequestLine};
use crate::options::{RequestOption, RequestOptions};
use crate::response::Response;
use crate::transport::{RawResponse, Transport};

/// Result of a call that did not fail.
#[derive(Debug)]
pub enum Outcome {
    Executed(Response),
    /// `RequestHooks::before_request` vetoed the call; nothing was sent.
    Cancelled,
}

impl Outcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Outcome::Executed(response) => Some(response),
            Outcome::Cancelled => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Outcome::Executed(response) => Some(response),
            Outcome::Cancelled => None,
        }
    }
}

/// A reusable single-request HTTP client over a [`Transport`].
pub struct Client<T> {
    transport: T,
    options: RequestOptions,
    /// Options as last applied to `handle`.
    applied: Option<RequestOptions>,
    handle: Option<TransportHandle>,
    cache_store: Option<Arc<dyn ResultCache>>,
    cache_policy: CachePolicy,
    cache_key: Option<String>,
    hooks: Option<Box<dyn RequestHooks>>,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            options: RequestOptions::new(),
            applied: None,
            handle: None,
            cache_store: None,
            cache_policy: CachePolicy::default(),
            cache_key: None,
            hooks: None,
        }
    }

    pub fn with_cache_store(mut self, store: Arc<dyn ResultCache>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn with_hooks(mut self, hooks: impl RequestHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The handle, created on first access.
    pub fn handle(&mut self) -> &mut TransportHandle {
        self.handle.get_or_insert_with(TransportHandle::new)
    }

    /// Install a handle. Its settings are not trusted: the next `exec()`
    /// applies the options first unless a `prepare_*` call comes before it.
    pub fn set_handle(&mut self, handle: TransportHandle) -> &mut Self {
        self.handle = Some(handle);
        self.applied = None;
        self
    }

    pub fn take_handle(&mut self) -> Option<TransportHandle> {
        self.applied = None;
        self.handle.take()
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut RequestOptions {
        &mut self.options
    }

    pub fn set_options(&mut self, options: RequestOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Opt this client into caching. Ignored for mutating requests and when
    /// no cache store is attached.
    pub fn cache(&mut self, duration: Duration, dependency: Option<CacheDependency>) -> &mut Self {
        self.cache_policy = CachePolicy::enabled(duration, dependency);
        self
    }

    pub fn no_cache(&mut self) -> &mut Self {
        self.cache_policy = CachePolicy::default();
        self
    }

    pub fn cache_policy(&self) -> &CachePolicy {
        &self.cache_policy
    }

    /// Replace the computed fingerprint with a fixed key.
    pub fn set_cache_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn clear_cache_key(&mut self) -> &mut Self {
        self.cache_key = None;
        self
    }

    /// The key override, or the fingerprint of the options last applied to
    /// the handle (the current options if nothing was applied yet).
    pub fn cache_key(&self) -> String {
        self.cache_key.clone().unwrap_or_else(|| {
            fingerprint(self.applied.as_ref().unwrap_or(&self.options))
        })
    }

    /// Apply the current options to the handle.
    pub fn prepare_request(&mut self) -> &mut Self {
        let handle = self.handle.get_or_insert_with(TransportHandle::new);
        self.options.apply_to(&self.transport, handle);
        self.applied = Some(self.options.clone());
        self
    }

    pub fn prepare_get(&mut self, url: &str) -> &mut Self {
        self.options
            .set_url(url)
            .set_post(false)
            .set_no_body(false)
            .unset(RequestOption::CustomRequest);
        self.prepare_request()
    }

    pub fn prepare_head(&mut self, url: &str) -> &mut Self {
        self.options
            .set_url(url)
            .set_no_body(true)
            .set_post(false)
            .unset(RequestOption::CustomRequest);
        self.prepare_request()
    }

    pub fn prepare_post(&mut self, url: &str, data: impl Into<Payload>) -> &mut Self {
        self.options
            .set_url(url)
            .set_post_fields(data.into().encode())
            .set_post(true)
            .set_no_body(false)
            .unset(RequestOption::CustomRequest);
        self.prepare_request()
    }

    pub fn prepare_put(&mut self, url: &str, data: impl Into<Payload>) -> &mut Self {
        self.options
            .set_url(url)
            .set_post_fields(data.into().encode())
            .set_post(true)
            .set_no_body(false)
            .set_custom_request("PUT");
        self.prepare_request()
    }

    pub fn prepare_delete(&mut self, url: &str) -> &mut Self {
        self.options
            .set_url(url)
            .set_custom_request("DELETE")
            .set_post(false)
            .set_no_body(false)
            .unset(RequestOption::PostFields);
        self.prepare_request()
    }

    pub fn get(&mut self, url: &str) -> Result<Outcome, Error> {
        self.prepare_get(url).exec()
    }

    pub fn head(&mut self, url: &str) -> Result<Outcome, Error> {
        self.prepare_head(url).exec()
    }

    pub fn post(&mut self, url: &str, data: impl Into<Payload>) -> Result<Outcome, Error> {
        self.prepare_post(url, data).exec()
    }

    pub fn put(&mut self, url: &str, data: impl Into<Payload>) -> Result<Outcome, Error> {
        self.prepare_put(url, data).exec()
    }

    pub fn delete(&mut self, url: &str) -> Result<Outcome, Error> {
        self.prepare_delete(url).exec()
    }

    /// Run the prepared request. A client that was never prepared applies
    /// its current options first.
    pub fn exec(&mut self) -> Result<Outcome, Error> {
        if self.applied.is_none() {
            self.prepare_request();
        }
        let applied = self.applied.clone().unwrap_or_default();
        let handle = self.handle();
        let handle_id = handle.id();
        let settings = handle.settings();
        let request = RequestLine {
            method: settings.method(),
            url: settings.url.clone().unwrap_or_default(),
        };
        let mutating = settings.is_mutating();
        let capture_headers = settings.capture_headers;
        let span = tracing::debug_span!(
            "exec",
            handle = %handle_id,
            method = %request.method,
            url = %request.url
        );
        let _enter = span.enter();

        if let Some(hooks) = &self.hooks {
            if !hooks.before_request(&applied) {
                debug!("request cancelled by before_request hook");
                return Ok(Outcome::Cancelled);
            }
        }

        let cache = self.eligible_cache(&applied, mutating);
        let key = cache.as_ref().map(|_| {
            self.cache_key
                .clone()
                .unwrap_or_else(|| fingerprint(&applied))
        });
        let cached = match (&cache, &key) {
            (Some(store), Some(key)) => read_cache(store.as_ref(), key),
            _ => None,
        };

        let mut failure = None;
        let raw = match cached {
            Some(raw) => raw,
            None => {
                let handle = self.handle.get_or_insert_with(TransportHandle::new);
                handle.clear_error();
                let raw = self.transport.execute(handle);
                failure = self.transport.last_error(handle);
                debug!(
                    status = raw.status,
                    header_size = raw.header_size,
                    total_size = raw.total_size(),
                    "transfer finished"
                );
                if let (Some(store), Some(key)) = (&cache, &key) {
                    self.write_cache(store.as_ref(), key, &raw, failure.as_ref());
                }
                raw
            }
        };

        let response = classify(Response::decode(request, raw, capture_headers), failure)?;

        if let Some(hooks) = &self.hooks {
            hooks.after_request(&response);
        }
        Ok(Outcome::Executed(response))
    }

    fn eligible_cache(&self, applied: &RequestOptions, mutating: bool) -> Option<Arc<dyn ResultCache>> {
        if mutating || !self.cache_policy.applies_to(applied) {
            if self.cache_policy.is_enabled() {
                debug!("caching skipped for mutating request");
            }
            return None;
        }
        if self.cache_store.is_none() {
            debug!("caching requested without a cache store");
        }
        self.cache_store.clone()
    }

    fn write_cache(
        &self,
        store: &dyn ResultCache,
        key: &str,
        raw: &RawResponse,
        failure: Option<&TransportFailure>,
    ) {
        if let Some(failure) = failure {
            debug!(key, %failure, "not caching failed transfer");
            return;
        }
        match CachedTransfer::encode(raw) {
            Ok(bytes) => {
                store.set(
                    key,
                    bytes,
                    self.cache_policy.duration(),
                    self.cache_policy.dependency(),
                );
                debug!(key, "cached transfer");
            }
            Err(err) => warn!(key, error = %err, "failed to encode transfer for cache"),
        }
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .field("applied", &self.applied)
            .field("handle", &self.handle)
            .field("cache_policy", &self.cache_policy)
            .field("cache_key", &self.cache_key)
            .field("has_cache_store", &self.cache_store.is_some())
            .field("has_hooks", &self.hooks.is_some())
            .finish_non_exhaustive()
    }
}

fn read_cache(store: &dyn ResultCache, key: &str) -> Option<RawResponse> {
    let Some(bytes) = store.get(key) else {
        debug!(key, "cache miss");
        return None;
    };
    match CachedTransfer::decode(&bytes) {
        Ok(raw) => {
            debug!(key, "cache hit");
            Some(raw)
        }
        Err(err) => {
            warn!(key, error = %err, "ignoring unreadable cache entry");
            None
        }
    }
}

/// An error status on the final hop wins over a transport failure.
fn classify(response: Response, failure: Option<TransportFailure>) -> Result<Response, Error> {
    let status = response
        .last_header_block()
        .and_then(|block| block.status())
        .filter(|status| *status >= 400);
    if let Some(status) = status {
        return Err(Error::HttpStatus {
            status,
            response: Box::new(response),
        });
    }
    if let Some(TransportFailure { code, message }) = failure {
        return Err(Error::Transport {
            code,
            message,
            response: Box::new(response),
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    fn response(headers: &str) -> Response {
        Response::decode(
            RequestLine {
                method: Method::Get,
                url: "http://localhost/".to_string(),
            },
            RawResponse {
                bytes: headers.as_bytes().to_vec(),
                status: 0,
                header_size: headers.len(),
            },
            true,
        )
    }

    #[test]
    fn classify_passes_success_through() {
        let result = classify(response("HTTP/1.1 200 OK\r\n\r\n"), None);
        assert_eq!(result.unwrap().status_code(), Some(200));
    }

    #[test]
    fn classify_prefers_http_status_over_transport_failure() {
        let failure = TransportFailure::new(28, "timed out");
        let err = classify(response("HTTP/1.1 503 Unavailable\r\n\r\n"), Some(failure)).unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    }

    #[test]
    fn classify_reports_transport_failure() {
        let failure = TransportFailure::new(7, "connection refused");
        let err = classify(response(""), Some(failure)).unwrap_err();
        match err {
            Error::Transport { code, message, response } => {
                assert_eq!(code, 7);
                assert_eq!(message, "connection refused");
                assert_eq!(response.body(), None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn classify_uses_only_the_final_hop() {
        let headers = "HTTP/1.1 404 Not Found\r\n\r\nHTTP/1.1 200 OK\r\n\r\n";
        assert!(classify(response(headers), None).is_ok());
    }
}
