//! Decoding raw transport output into headers and body.
//!
//! # Design
//! The header/body boundary is the transport-reported `header_size` and
//! nothing else. Header text of a redirect chain is itself a sequence of
//! well-formed header blocks separated by empty lines, so scanning for the
//! first blank line would cut at the first hop. Block splitting is only ever
//! applied to the header text once it has been sliced off.
//!
//! The last block describes the final hop and is the only source of the
//! status code used for error classification.

use std::borrow::Cow;

use crate::http::RequestLine;
use crate::transport::{RawResponse, TransferInfo};

/// A response decoded from a [`RawResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    request: RequestLine,
    headers: String,
    body: Option<Vec<u8>>,
    info: TransferInfo,
}

impl Response {
    /// Split `raw` at its `header_size`. With header capture disabled the
    /// whole buffer is body. A captured response whose remaining body is
    /// empty gets an absent body rather than an empty one.
    pub fn decode(request: RequestLine, raw: RawResponse, capture_headers: bool) -> Self {
        let info = TransferInfo::from(&raw);
        let mut bytes = raw.bytes;
        if !capture_headers {
            return Self {
                request,
                headers: String::new(),
                body: Some(bytes),
                info,
            };
        }

        let split = raw.header_size.min(bytes.len());
        let body = bytes.split_off(split);
        let headers = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        Self {
            request,
            headers,
            body: (!body.is_empty()).then_some(body),
            info,
        }
    }

    pub fn request(&self) -> &RequestLine {
        &self.request
    }

    /// Every header block received, concatenated as the transport wrote them.
    pub fn headers(&self) -> &str {
        &self.headers
    }

    /// `None` when the transfer carried no body.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.body.as_deref().map(String::from_utf8_lossy)
    }

    pub fn into_body(self) -> Option<Vec<u8>> {
        self.body
    }

    pub fn info(&self) -> &TransferInfo {
        &self.info
    }

    /// One block per hop, in the order they were received.
    pub fn header_blocks(&self) -> HeaderBlocks<'_> {
        HeaderBlocks::new(&self.headers)
    }

    pub fn last_header_block(&self) -> Option<HeaderBlock<'_>> {
        self.header_blocks().last()
    }

    /// Status code of the final hop.
    pub fn status_code(&self) -> Option<u16> {
        self.last_header_block().and_then(|block| block.status())
    }

    /// Look up a field of the final hop, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.last_header_block().and_then(|block| block.get(name))
    }

    pub fn is_error(&self) -> bool {
        self.status_code().is_some_and(|status| status >= 400)
    }
}

/// Iterator over the header blocks of a response.
///
/// Cloning restarts iteration from the current position without touching
/// the response.
#[derive(Debug, Clone)]
pub struct HeaderBlocks<'a> {
    rest: &'a str,
}

impl<'a> HeaderBlocks<'a> {
    pub fn new(headers: &'a str) -> Self {
        Self { rest: headers }
    }
}

impl<'a> Iterator for HeaderBlocks<'a> {
    type Item = HeaderBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let (block, rest) = match find_separator(self.rest) {
                Some((at, len)) => (&self.rest[..at], &self.rest[at + len..]),
                None => (self.rest, ""),
            };
            self.rest = rest;
            if !block.trim().is_empty() {
                return Some(HeaderBlock { raw: block });
            }
        }
        None
    }
}

/// Position and length of the first empty-line separator.
fn find_separator(text: &str) -> Option<(usize, usize)> {
    let crlf = text.find("\r\n\r\n").map(|at| (at, 4));
    let lf = text.find("\n\n").map(|at| (at, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// The status line and fields of one hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBlock<'a> {
    raw: &'a str,
}

impl<'a> HeaderBlock<'a> {
    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    pub fn status_line(&self) -> Option<&'a str> {
        self.raw
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
    }

    /// Code from a `HTTP/x.y NNN reason` status line.
    pub fn status(&self) -> Option<u16> {
        let line = self.status_line()?;
        if !line.starts_with("HTTP/") {
            return None;
        }
        line.split_whitespace().nth(1)?.parse().ok()
    }

    pub fn reason(&self) -> Option<&'a str> {
        let line = self.status_line()?;
        let mut parts = line.splitn(3, ' ');
        parts.next()?;
        parts.next()?;
        parts.next().map(str::trim)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim(), value.trim()))
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.fields()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    fn request() -> RequestLine {
        RequestLine {
            method: Method::Get,
            url: "http://localhost/".to_string(),
        }
    }

    fn raw(headers: &str, body: &str) -> RawResponse {
        RawResponse {
            bytes: format!("{headers}{body}").into_bytes(),
            status: 200,
            header_size: headers.len(),
        }
    }

    #[test]
    fn splits_at_header_size() {
        let response = Response::decode(request(), raw("HTTP/1.1 200 OK\r\nX: 1\r\n\r\n", "body"), true);
        assert_eq!(response.headers(), "HTTP/1.1 200 OK\r\nX: 1\r\n\r\n");
        assert_eq!(response.body(), Some(&b"body"[..]));
        assert_eq!(response.status_code(), Some(200));
        assert_eq!(response.header("x"), Some("1"));
    }

    #[test]
    fn split_trusts_header_size_over_content() {
        // The body itself looks like a header block.
        let body = "HTTP/1.1 500 Oops\r\n\r\n";
        let response = Response::decode(request(), raw("HTTP/1.1 200 OK\r\n\r\n", body), true);
        assert_eq!(response.status_code(), Some(200));
        assert_eq!(response.text().as_deref(), Some(body));
    }

    #[test]
    fn last_block_wins_after_redirect() {
        let headers = "HTTP/1.1 302 Found\r\nLocation: /next\r\n\r\nHTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n";
        let response = Response::decode(request(), raw(headers, "done"), true);

        assert_eq!(response.header_blocks().count(), 2);
        let last = response.last_header_block().unwrap();
        assert_eq!(last.as_str(), "HTTP/1.1 200 OK\r\nContent-Type: text/plain");
        assert_eq!(response.status_code(), Some(200));
        assert_eq!(response.header("location"), None);
        assert_eq!(response.header_blocks().next().unwrap().status(), Some(302));
    }

    #[test]
    fn header_blocks_are_restartable() {
        let headers = "HTTP/1.1 301 Moved\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n";
        let response = Response::decode(request(), raw(headers, ""), true);
        let blocks = response.header_blocks();
        let first: Vec<_> = blocks.clone().map(|b| b.status()).collect();
        let second: Vec<_> = blocks.map(|b| b.status()).collect();
        assert_eq!(first, vec![Some(301), Some(204)]);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_body_is_absent() {
        let headers = "HTTP/1.1 204 No Content\r\n\r\n";
        let response = Response::decode(request(), raw(headers, ""), true);
        assert_eq!(response.body(), None);
        assert_eq!(response.info().total_size, headers.len());
    }

    #[test]
    fn header_size_past_end_is_clamped() {
        let mut raw = raw("HTTP/1.1 200 OK\r\n\r\n", "");
        raw.header_size = 1000;
        let response = Response::decode(request(), raw, true);
        assert_eq!(response.status_code(), Some(200));
        assert_eq!(response.body(), None);
    }

    #[test]
    fn without_capture_everything_is_body() {
        let response = Response::decode(request(), raw("HTTP/1.1 200 OK\r\n\r\n", "x"), false);
        assert_eq!(response.headers(), "");
        assert_eq!(response.status_code(), None);
        assert_eq!(response.text().as_deref(), Some("HTTP/1.1 200 OK\r\n\r\nx"));
    }

    #[test]
    fn bare_newline_separators_are_tolerated() {
        let headers = "HTTP/1.0 302 Found\nLocation: /a\n\nHTTP/1.0 404 Not Found\n\n";
        let response = Response::decode(request(), raw(headers, ""), true);
        assert_eq!(response.status_code(), Some(404));
        assert!(response.is_error());
        assert_eq!(response.last_header_block().unwrap().reason(), Some("Not Found"));
    }
}
