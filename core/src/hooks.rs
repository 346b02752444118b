//! Lifecycle callbacks around `Client::exec`.

use crate::options::RequestOptions;
use crate::response::Response;

/// Callbacks a host application can attach to a [`crate::Client`].
///
/// `before_request` may veto execution by returning `false`; the client then
/// returns `Outcome::Cancelled` without calling the transport.
/// `after_request` only observes successful responses.
pub trait RequestHooks: Send {
    fn before_request(&self, _options: &RequestOptions) -> bool {
        true
    }

    fn after_request(&self, _response: &Response) {}
}

/// Hooks built from closures.
#[derive(Default)]
pub struct FnHooks {
    before: Option<Box<dyn Fn(&RequestOptions) -> bool + Send>>,
    after: Option<Box<dyn Fn(&Response) + Send>>,
}

impl FnHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, hook: impl Fn(&RequestOptions) -> bool + Send + 'static) -> Self {
        self.before = Some(Box::new(hook));
        self
    }

    pub fn after(mut self, hook: impl Fn(&Response) + Send + 'static) -> Self {
        self.after = Some(Box::new(hook));
        self
    }
}

impl RequestHooks for FnHooks {
    fn before_request(&self, options: &RequestOptions) -> bool {
        self.before.as_ref().map_or(true, |hook| hook(options))
    }

    fn after_request(&self, response: &Response) {
        if let Some(hook) = &self.after {
            hook(response);
        }
    }
}
