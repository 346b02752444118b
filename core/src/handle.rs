//! The per-client transport session.
//!
//! # Design
//! A `TransportHandle` is plain owned state: the settings the options were
//! applied as, plus the last error the transport recorded. The owning
//! `Client` creates it lazily and it is dropped with the client. Exclusive
//! use during a call is enforced by `&mut` borrows, never by locks.

use std::time::Duration;

use uuid::Uuid;

use crate::http::Method;
use crate::options::{OptionValue, RequestOption};

/// Transport-level settings produced by applying request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportSettings {
    pub url: Option<String>,
    pub post: bool,
    pub custom_request: Option<String>,
    pub no_body: bool,
    pub post_fields: Option<String>,
    pub capture_headers: bool,
    pub follow_location: bool,
    pub return_transfer: bool,
    /// `None` means no limit.
    pub timeout: Option<Duration>,
    pub encoding: Option<String>,
    pub verify_peer: bool,
    pub user_agent: Option<String>,
    pub http_headers: Vec<String>,
    pub max_redirects: Option<u32>,
}

impl TransportSettings {
    /// Store one option. Values of the wrong kind are ignored; options are
    /// validated before they get here.
    pub fn apply(&mut self, option: RequestOption, value: &OptionValue) {
        match option {
            RequestOption::Url => self.url = value.as_text().map(str::to_string),
            RequestOption::CustomRequest => {
                self.custom_request = value.as_text().map(str::to_string)
            }
            RequestOption::PostFields => self.post_fields = value.as_text().map(str::to_string),
            RequestOption::Post => self.post = value.as_flag().unwrap_or(false),
            RequestOption::Header => self.capture_headers = value.as_flag().unwrap_or(false),
            RequestOption::FollowLocation => {
                self.follow_location = value.as_flag().unwrap_or(false)
            }
            RequestOption::ReturnTransfer => {
                self.return_transfer = value.as_flag().unwrap_or(false)
            }
            RequestOption::Timeout => {
                // Zero disables the timeout.
                self.timeout = value
                    .as_number()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
            }
            RequestOption::Encoding => self.encoding = value.as_text().map(str::to_string),
            RequestOption::SslVerifyPeer => self.verify_peer = value.as_flag().unwrap_or(false),
            RequestOption::UserAgent => self.user_agent = value.as_text().map(str::to_string),
            RequestOption::NoBody => self.no_body = value.as_flag().unwrap_or(false),
            RequestOption::HttpHeader => {
                self.http_headers = value.as_list().map(<[String]>::to_vec).unwrap_or_default()
            }
            RequestOption::MaxRedirects => {
                self.max_redirects = value
                    .as_number()
                    .map(|max| u32::try_from(max).unwrap_or(u32::MAX))
            }
        }
    }

    pub fn method(&self) -> Method {
        Method::resolve(self.no_body, self.custom_request.as_deref(), self.post)
    }

    /// Same rule as `RequestOptions::is_mutating`, on the applied settings.
    pub fn is_mutating(&self) -> bool {
        let custom = self
            .custom_request
            .as_deref()
            .is_some_and(|custom| !custom.trim().is_empty());
        custom || self.post || self.method().is_mutating()
    }
}

/// A low-level failure reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct TransportFailure {
    pub code: i32,
    pub message: String,
}

impl TransportFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Opaque transport session owned by a single client.
#[derive(Debug)]
pub struct TransportHandle {
    id: Uuid,
    settings: TransportSettings,
    last_error: Option<TransportFailure>,
}

impl TransportHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            settings: TransportSettings::default(),
            last_error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TransportSettings {
        &mut self.settings
    }

    pub fn reset_settings(&mut self) {
        self.settings = TransportSettings::default();
    }

    pub fn last_error(&self) -> Option<&TransportFailure> {
        self.last_error.as_ref()
    }

    pub fn record_error(&mut self, failure: TransportFailure) {
        self.last_error = Some(failure);
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }
}

impl Default for TransportHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RequestOptions;
    use crate::transport::{RawResponse, Transport};

    struct Inert;

    impl Transport for Inert {
        fn execute(&self, _handle: &mut TransportHandle) -> RawResponse {
            RawResponse::default()
        }
    }

    #[test]
    fn applying_defaults_populates_settings() {
        let mut handle = TransportHandle::new();
        let mut options = RequestOptions::new();
        options.set_url("http://localhost/x");
        options.apply_to(&Inert, &mut handle);

        let settings = handle.settings();
        assert_eq!(settings.url.as_deref(), Some("http://localhost/x"));
        assert!(settings.capture_headers);
        assert!(settings.follow_location);
        assert!(settings.return_transfer);
        assert!(!settings.verify_peer);
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.encoding.as_deref(), Some("gzip"));
        assert_eq!(settings.method(), Method::Get);
    }

    #[test]
    fn reapplying_clears_stale_settings() {
        let mut handle = TransportHandle::new();
        let mut options = RequestOptions::new();
        options.set_url("http://localhost/").set_custom_request("DELETE");
        options.apply_to(&Inert, &mut handle);
        assert_eq!(handle.settings().method(), Method::Delete);

        options.unset(RequestOption::CustomRequest);
        options.apply_to(&Inert, &mut handle);
        assert_eq!(handle.settings().method(), Method::Get);
        assert!(handle.settings().custom_request.is_none());
    }

    #[test]
    fn zero_timeout_means_unlimited() {
        let mut settings = TransportSettings::default();
        settings.apply(RequestOption::Timeout, &OptionValue::Number(0));
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn applied_writes_are_mutating() {
        let mut settings = TransportSettings::default();
        assert!(!settings.is_mutating());

        settings.post = true;
        assert!(settings.is_mutating());

        settings.post = false;
        settings.custom_request = Some("GET".to_string());
        assert!(settings.is_mutating());

        settings.custom_request = Some("  ".to_string());
        assert!(!settings.is_mutating());
    }

    #[test]
    fn handles_get_distinct_ids() {
        assert_ne!(TransportHandle::new().id(), TransportHandle::new().id());
    }
}
