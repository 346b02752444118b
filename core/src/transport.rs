//! The seam between the client and whatever performs the network call.
//!
//! # Design
//! The core never does I/O itself. A `Transport` receives the applied
//! options through `configure`, performs the exchange in `execute`, and
//! reports low-level failures through `last_error`. Both `configure` and
//! `last_error` default to storing into and reading from the handle, so most
//! implementations only write `execute`.
//!
//! A transport that follows redirects itself must write every hop's header
//! block, each terminated by an empty line, ahead of the final body and count
//! all of them in `header_size`.

use std::sync::Arc;

use crate::handle::{TransportFailure, TransportHandle};
use crate::options::{OptionValue, RequestOption};

/// Unprocessed output of one transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// Header blocks followed by the body.
    pub bytes: Vec<u8>,
    /// Status code of the final hop as seen by the transport.
    pub status: u16,
    /// Length in bytes of the header portion of `bytes`.
    pub header_size: usize,
}

impl RawResponse {
    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Metadata about a completed transfer, kept on the decoded response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferInfo {
    pub status: u16,
    pub header_size: usize,
    pub total_size: usize,
}

impl From<&RawResponse> for TransferInfo {
    fn from(raw: &RawResponse) -> Self {
        Self {
            status: raw.status,
            header_size: raw.header_size,
            total_size: raw.total_size(),
        }
    }
}

/// Performs HTTP exchanges for a [`crate::Client`].
///
/// Calls are blocking and a handle is never used by two calls at once.
pub trait Transport {
    fn configure(&self, handle: &mut TransportHandle, option: RequestOption, value: &OptionValue) {
        handle.settings_mut().apply(option, value);
    }

    /// Run the request described by the handle's settings. Failures are
    /// recorded on the handle; whatever bytes were received are still
    /// returned.
    fn execute(&self, handle: &mut TransportHandle) -> RawResponse;

    fn last_error(&self, handle: &TransportHandle) -> Option<TransportFailure> {
        handle.last_error().cloned()
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn configure(&self, handle: &mut TransportHandle, option: RequestOption, value: &OptionValue) {
        (**self).configure(handle, option, value)
    }

    fn execute(&self, handle: &mut TransportHandle) -> RawResponse {
        (**self).execute(handle)
    }

    fn last_error(&self, handle: &TransportHandle) -> Option<TransportFailure> {
        (**self).last_error(handle)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn configure(&self, handle: &mut TransportHandle, option: RequestOption, value: &OptionValue) {
        (**self).configure(handle, option, value)
    }

    fn execute(&self, handle: &mut TransportHandle) -> RawResponse {
        (**self).execute(handle)
    }

    fn last_error(&self, handle: &TransportHandle) -> Option<TransportFailure> {
        (**self).last_error(handle)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn configure(&self, handle: &mut TransportHandle, option: RequestOption, value: &OptionValue) {
        (**self).configure(handle, option, value)
    }

    fn execute(&self, handle: &mut TransportHandle) -> RawResponse {
        (**self).execute(handle)
    }

    fn last_error(&self, handle: &TransportHandle) -> Option<TransportFailure> {
        (**self).last_error(handle)
    }
}
