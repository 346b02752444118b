//! Blocking [`Transport`] over `ureq`.
//!
//! # Overview
//! `UreqTransport` performs the network exchange for a `hop_core::Client`.
//! It reads everything it needs from the handle's `TransportSettings` and
//! writes its output in the shape the core decoder expects: one header block
//! per hop, each terminated by an empty line, followed by the final body.
//!
//! # Design
//! - ureq's own redirect handling is disabled. Redirects are followed here,
//!   hop by hop, so every intermediate header block can be written out and
//!   counted in `header_size`, exactly like a transport that concatenates
//!   the redirect chain.
//! - Failures are recorded on the handle with curl-compatible numeric codes
//!   (see [`code`]) so callers can branch on the familiar values.
//! - A new agent is built per call from the current settings; connection
//!   reuse across calls is not attempted.

use std::io::{self, Write};

use hop_core::{Method, RawResponse, Transport, TransportFailure, TransportHandle, TransportSettings};
use tracing::{debug, trace};
use ureq::http::{self, header, Response, StatusCode, Version};
use ureq::{Agent, Body};
use url::Url;

/// Redirect limit when `maxRedirs` is not set.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Largest body read into memory unless overridden.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// Numeric failure codes, matching libcurl's `CURLcode` values.
pub mod code {
    pub const FAILED: i32 = 1;
    pub const URL_MALFORMAT: i32 = 3;
    pub const COULDNT_RESOLVE_HOST: i32 = 6;
    pub const COULDNT_CONNECT: i32 = 7;
    pub const WRITE_ERROR: i32 = 23;
    pub const OPERATION_TIMEDOUT: i32 = 28;
    pub const SSL_CONNECT_ERROR: i32 = 35;
    pub const TOO_MANY_REDIRECTS: i32 = 47;
    pub const RECV_ERROR: i32 = 56;
}

/// Blocking HTTP transport backed by `ureq`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    max_body_size: u64,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_max_body_size(mut self, limit: u64) -> Self {
        self.max_body_size = limit;
        self
    }

    fn transfer(&self, settings: &TransportSettings, raw: &mut RawResponse) -> Result<(), TransportFailure> {
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| TransportFailure::new(code::URL_MALFORMAT, "No URL set"))?;
        let mut url = Url::parse(url)
            .map_err(|err| TransportFailure::new(code::URL_MALFORMAT, format!("malformed URL: {err}")))?;

        let agent = agent(settings);
        let max_redirects = settings.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS);
        let mut method = settings.method();
        let mut body = settings.post_fields.clone();
        let mut redirects = 0;

        loop {
            let mut response = send(&agent, settings, &method, &url, body.as_deref())?;
            let status = response.status();
            trace!(%url, status = status.as_u16(), "hop");

            write_header_block(&mut raw.bytes, &response);
            raw.header_size = raw.bytes.len();
            raw.status = status.as_u16();

            if settings.follow_location {
                if let Some(next) = redirect_target(&response, &url) {
                    if redirects >= max_redirects {
                        return Err(TransportFailure::new(
                            code::TOO_MANY_REDIRECTS,
                            format!("Maximum ({max_redirects}) redirects followed"),
                        ));
                    }
                    redirects += 1;
                    if switches_to_get(status, &method) {
                        method = Method::Get;
                        body = None;
                    }
                    debug!(from = %url, to = %next, status = status.as_u16(), "following redirect");
                    url = next;
                    continue;
                }
            }

            if method == Method::Head {
                return Ok(());
            }
            let bytes = response
                .body_mut()
                .with_config()
                .limit(self.max_body_size)
                .read_to_vec()
                .map_err(|err| failure(&err))?;
            if settings.return_transfer {
                raw.bytes.extend_from_slice(&bytes);
            } else {
                write_stdout(&bytes)?;
            }
            return Ok(());
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, handle: &mut TransportHandle) -> RawResponse {
        let settings = handle.settings().clone();
        let mut raw = RawResponse::default();
        if let Err(failure) = self.transfer(&settings, &mut raw) {
            debug!(code = failure.code, message = %failure.message, "transfer failed");
            handle.record_error(failure);
        }
        raw
    }
}

fn agent(settings: &TransportSettings) -> Agent {
    let tls = ureq::tls::TlsConfig::builder()
        .disable_verification(!settings.verify_peer)
        .build();
    Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(0)
        .max_redirects_will_error(false)
        .allow_non_standard_methods(true)
        .timeout_global(settings.timeout)
        .tls_config(tls)
        .build()
        .new_agent()
}

fn send(
    agent: &Agent,
    settings: &TransportSettings,
    method: &Method,
    url: &Url,
    body: Option<&str>,
) -> Result<Response<Body>, TransportFailure> {
    let mut builder = http::Request::builder()
        .method(method.as_str())
        .uri(url.as_str());
    if let Some(user_agent) = &settings.user_agent {
        builder = builder.header(header::USER_AGENT, user_agent.as_str());
    }
    if let Some(encoding) = settings.encoding.as_deref().filter(|e| !e.is_empty()) {
        builder = builder.header(header::ACCEPT_ENCODING, encoding);
    }
    let mut has_content_type = false;
    for line in &settings.http_headers {
        if let Some((name, value)) = line.split_once(':') {
            has_content_type |= name.trim().eq_ignore_ascii_case("content-type");
            builder = builder.header(name.trim(), value.trim());
        }
    }

    let result = match body {
        Some(body) if !matches!(method, Method::Get | Method::Head) => {
            if !has_content_type {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            }
            let request = builder
                .body(body.as_bytes().to_vec())
                .map_err(|err| TransportFailure::new(code::URL_MALFORMAT, err.to_string()))?;
            agent.run(request)
        }
        _ => {
            let request = builder
                .body(())
                .map_err(|err| TransportFailure::new(code::URL_MALFORMAT, err.to_string()))?;
            agent.run(request)
        }
    };
    result.map_err(|err| failure(&err))
}

/// Status line and fields, CRLF-terminated, followed by the empty line.
fn write_header_block<B>(out: &mut Vec<u8>, response: &Response<B>) {
    let status = response.status();
    let status_line = format!(
        "{} {} {}\r\n",
        version_name(response.version()),
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    out.extend_from_slice(status_line.as_bytes());
    for (name, value) in response.headers() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

fn version_name(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "HTTP/0.9"
    } else if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else if version == Version::HTTP_2 {
        "HTTP/2"
    } else if version == Version::HTTP_3 {
        "HTTP/3"
    } else {
        "HTTP/1.1"
    }
}

fn redirect_target<B>(response: &Response<B>, base: &Url) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
    base.join(location).ok()
}

/// 303 turns everything but HEAD into GET; 301 and 302 only turn POST into
/// GET.
fn switches_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => *method != Method::Head,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => *method == Method::Post,
        _ => false,
    }
}

fn write_stdout(bytes: &[u8]) -> Result<(), TransportFailure> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.flush())
        .map_err(|err| TransportFailure::new(code::WRITE_ERROR, format!("failed writing body: {err}")))
}

fn failure(err: &ureq::Error) -> TransportFailure {
    let code = match err {
        ureq::Error::HostNotFound => code::COULDNT_RESOLVE_HOST,
        ureq::Error::ConnectionFailed => code::COULDNT_CONNECT,
        ureq::Error::Timeout(_) => code::OPERATION_TIMEDOUT,
        ureq::Error::Tls(_) => code::SSL_CONNECT_ERROR,
        ureq::Error::BadUri(_) => code::URL_MALFORMAT,
        ureq::Error::TooManyRedirects => code::TOO_MANY_REDIRECTS,
        ureq::Error::Io(io) => match io.kind() {
            io::ErrorKind::ConnectionRefused => code::COULDNT_CONNECT,
            io::ErrorKind::TimedOut => code::OPERATION_TIMEDOUT,
            _ => code::RECV_ERROR,
        },
        _ => code::FAILED,
    };
    TransportFailure::new(code, err.to_string())
}
