//! The closed set of request options and their default bundle.
//!
//! # Design
//! Options are keyed by the `RequestOption` enum, so the recognized set is
//! fixed at compile time; string names are resolved at the boundary and
//! anything unknown fails with `Error::InvalidOption` before the map is
//! touched. Only explicitly set values are stored. Defaults are overlaid by
//! `effective()`, a pure function, so there is no hidden "materialized" state
//! and reading never mutates.
//!
//! Values live in a `BTreeMap`, which makes iteration order (and therefore
//! `serialize()`) independent of insertion order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::handle::TransportHandle;
use crate::http::Method;
use crate::transport::Transport;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("hop/", env!("CARGO_PKG_VERSION"));

/// Timeout in seconds applied when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Every option a request understands.
///
/// Declaration order is the canonical serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestOption {
    Url,
    CustomRequest,
    PostFields,
    Post,
    Header,
    FollowLocation,
    ReturnTransfer,
    Timeout,
    Encoding,
    SslVerifyPeer,
    UserAgent,
    NoBody,
    HttpHeader,
    MaxRedirects,
}

impl RequestOption {
    pub const ALL: [RequestOption; 14] = [
        RequestOption::Url,
        RequestOption::CustomRequest,
        RequestOption::PostFields,
        RequestOption::Post,
        RequestOption::Header,
        RequestOption::FollowLocation,
        RequestOption::ReturnTransfer,
        RequestOption::Timeout,
        RequestOption::Encoding,
        RequestOption::SslVerifyPeer,
        RequestOption::UserAgent,
        RequestOption::NoBody,
        RequestOption::HttpHeader,
        RequestOption::MaxRedirects,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RequestOption::Url => "url",
            RequestOption::CustomRequest => "customRequest",
            RequestOption::PostFields => "postFields",
            RequestOption::Post => "post",
            RequestOption::Header => "header",
            RequestOption::FollowLocation => "followLocation",
            RequestOption::ReturnTransfer => "returnTransfer",
            RequestOption::Timeout => "timeout",
            RequestOption::Encoding => "encoding",
            RequestOption::SslVerifyPeer => "sslVerifyPeer",
            RequestOption::UserAgent => "userAgent",
            RequestOption::NoBody => "nobody",
            RequestOption::HttpHeader => "httpHeader",
            RequestOption::MaxRedirects => "maxRedirs",
        }
    }

    pub fn kind(self) -> OptionKind {
        match self {
            RequestOption::Url
            | RequestOption::CustomRequest
            | RequestOption::PostFields
            | RequestOption::Encoding
            | RequestOption::UserAgent => OptionKind::Text,
            RequestOption::Post
            | RequestOption::Header
            | RequestOption::FollowLocation
            | RequestOption::ReturnTransfer
            | RequestOption::SslVerifyPeer
            | RequestOption::NoBody => OptionKind::Flag,
            RequestOption::Timeout | RequestOption::MaxRedirects => OptionKind::Number,
            RequestOption::HttpHeader => OptionKind::List,
        }
    }

    /// The value used when the option was never set.
    pub fn default_value(self) -> Option<OptionValue> {
        match self {
            RequestOption::UserAgent => Some(OptionValue::Text(DEFAULT_USER_AGENT.to_string())),
            RequestOption::Header
            | RequestOption::FollowLocation
            | RequestOption::ReturnTransfer => Some(OptionValue::Flag(true)),
            RequestOption::Timeout => Some(OptionValue::Number(DEFAULT_TIMEOUT_SECS)),
            RequestOption::Encoding => Some(OptionValue::Text("gzip".to_string())),
            RequestOption::SslVerifyPeer => Some(OptionValue::Flag(false)),
            _ => None,
        }
    }
}

impl fmt::Display for RequestOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RequestOption {
    type Err = Error;

    /// Names match case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestOption::ALL
            .into_iter()
            .find(|option| option.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidOption(s.to_string()))
    }
}

impl Serialize for RequestOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for RequestOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// The shape of value an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Text,
    Flag,
    Number,
    List,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptionKind::Text => "text",
            OptionKind::Flag => "flag",
            OptionKind::Number => "number",
            OptionKind::List => "list",
        })
    }
}

/// A single option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Number(u64),
    Text(String),
    List(Vec<String>),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Flag(_) => OptionKind::Flag,
            OptionValue::Number(_) => OptionKind::Number,
            OptionValue::Text(_) => OptionKind::Text,
            OptionValue::List(_) => OptionKind::List,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            OptionValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::List(items) => Some(items),
            _ => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            OptionValue::Flag(flag) => serde_json::Value::Bool(*flag),
            OptionValue::Number(n) => serde_json::Value::from(*n),
            OptionValue::Text(text) => serde_json::Value::String(text.clone()),
            OptionValue::List(items) => items.iter().cloned().map(serde_json::Value::String).collect(),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

/// Options for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequestOptions {
    values: BTreeMap<RequestOption, OptionValue>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs, failing on the first unknown name.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let mut options = Self::new();
        for (name, value) in pairs {
            options.set(name.as_ref(), value)?;
        }
        Ok(options)
    }

    /// Set an option by name. Unknown names and mismatched value kinds leave
    /// the options untouched.
    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<&mut Self, Error> {
        let option: RequestOption = name.parse()?;
        self.set_option(option, value)
    }

    pub fn set_option(
        &mut self,
        option: RequestOption,
        value: impl Into<OptionValue>,
    ) -> Result<&mut Self, Error> {
        let value = value.into();
        if value.kind() != option.kind() {
            return Err(Error::InvalidOptionValue {
                option,
                expected: option.kind(),
            });
        }
        self.values.insert(option, value);
        Ok(self)
    }

    pub fn unset(&mut self, option: RequestOption) -> &mut Self {
        self.values.remove(&option);
        self
    }

    pub fn is_set(&self, option: RequestOption) -> bool {
        self.values.contains_key(&option)
    }

    /// The stored value, falling back to the option's default.
    pub fn get(&self, option: RequestOption) -> Option<OptionValue> {
        self.values
            .get(&option)
            .cloned()
            .or_else(|| option.default_value())
    }

    pub fn get_named(&self, name: &str) -> Result<Option<OptionValue>, Error> {
        let option: RequestOption = name.parse()?;
        Ok(self.get(option))
    }

    /// Explicitly set values only, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (RequestOption, &OptionValue)> {
        self.values.iter().map(|(option, value)| (*option, value))
    }

    /// Stored values overlaid on the default bundle.
    pub fn effective(&self) -> BTreeMap<RequestOption, OptionValue> {
        RequestOption::ALL
            .into_iter()
            .filter_map(|option| self.get(option).map(|value| (option, value)))
            .collect()
    }

    /// Canonical JSON of the effective options. Equal option values always
    /// produce identical output regardless of the order they were set in.
    pub fn serialize(&self) -> String {
        let object: serde_json::Map<String, serde_json::Value> = self
            .effective()
            .iter()
            .map(|(option, value)| (option.name().to_string(), value.to_json()))
            .collect();
        serde_json::Value::Object(object).to_string()
    }

    /// Reset the handle's settings and hand every effective option to the
    /// transport.
    pub fn apply_to<T: Transport + ?Sized>(&self, transport: &T, handle: &mut TransportHandle) {
        handle.reset_settings();
        for (option, value) in self.effective() {
            transport.configure(handle, option, &value);
        }
    }

    /// The verb these options resolve to.
    pub fn method(&self) -> Method {
        Method::resolve(
            self.flag(RequestOption::NoBody),
            self.text(RequestOption::CustomRequest).as_deref(),
            self.flag(RequestOption::Post),
        )
    }

    /// True when the request may change server state: the resolved verb is
    /// mutating, or `post` or a custom method is set at all.
    pub fn is_mutating(&self) -> bool {
        let custom = self
            .text(RequestOption::CustomRequest)
            .is_some_and(|custom| !custom.trim().is_empty());
        custom || self.flag(RequestOption::Post) || self.method().is_mutating()
    }

    pub fn url(&self) -> Option<&str> {
        self.values.get(&RequestOption::Url).and_then(OptionValue::as_text)
    }

    /// Effective value of a flag option; unset flags without a default are
    /// `false`.
    pub fn flag(&self, option: RequestOption) -> bool {
        self.get(option)
            .and_then(|value| value.as_flag())
            .unwrap_or(false)
    }

    pub fn text(&self, option: RequestOption) -> Option<String> {
        match self.get(option) {
            Some(OptionValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn number(&self, option: RequestOption) -> Option<u64> {
        self.get(option).and_then(|value| value.as_number())
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.insert(RequestOption::Url, OptionValue::Text(url.into()))
    }

    pub fn set_custom_request(&mut self, method: impl Into<String>) -> &mut Self {
        self.insert(RequestOption::CustomRequest, OptionValue::Text(method.into()))
    }

    pub fn set_post_fields(&mut self, body: impl Into<String>) -> &mut Self {
        self.insert(RequestOption::PostFields, OptionValue::Text(body.into()))
    }

    pub fn set_post(&mut self, post: bool) -> &mut Self {
        self.insert(RequestOption::Post, OptionValue::Flag(post))
    }

    pub fn set_header(&mut self, capture: bool) -> &mut Self {
        self.insert(RequestOption::Header, OptionValue::Flag(capture))
    }

    pub fn set_follow_location(&mut self, follow: bool) -> &mut Self {
        self.insert(RequestOption::FollowLocation, OptionValue::Flag(follow))
    }

    pub fn set_return_transfer(&mut self, buffer: bool) -> &mut Self {
        self.insert(RequestOption::ReturnTransfer, OptionValue::Flag(buffer))
    }

    pub fn set_timeout(&mut self, seconds: u64) -> &mut Self {
        self.insert(RequestOption::Timeout, OptionValue::Number(seconds))
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) -> &mut Self {
        self.insert(RequestOption::Encoding, OptionValue::Text(encoding.into()))
    }

    pub fn set_ssl_verify_peer(&mut self, verify: bool) -> &mut Self {
        self.insert(RequestOption::SslVerifyPeer, OptionValue::Flag(verify))
    }

    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
        self.insert(RequestOption::UserAgent, OptionValue::Text(user_agent.into()))
    }

    pub fn set_no_body(&mut self, no_body: bool) -> &mut Self {
        self.insert(RequestOption::NoBody, OptionValue::Flag(no_body))
    }

    /// Extra request headers, each formatted as `Name: value`.
    pub fn set_http_headers<I, S>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let headers = headers.into_iter().map(Into::into).collect();
        self.insert(RequestOption::HttpHeader, OptionValue::List(headers))
    }

    pub fn set_max_redirects(&mut self, max: u64) -> &mut Self {
        self.insert(RequestOption::MaxRedirects, OptionValue::Number(max))
    }

    fn insert(&mut self, option: RequestOption, value: OptionValue) -> &mut Self {
        debug_assert_eq!(option.kind(), value.kind());
        self.values.insert(option, value);
        self
    }
}

impl<'de> Deserialize<'de> for RequestOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, OptionValue>::deserialize(deserializer)?;
        RequestOptions::from_pairs(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_option_is_rejected_without_mutation() {
        let mut options = RequestOptions::new();
        options.set_url("http://localhost/");
        let before = options.clone();

        let err = options.set("unknownOption", 1u64).unwrap_err();
        assert!(matches!(err, Error::InvalidOption(ref name) if name == "unknownOption"));
        assert_eq!(options, before);
    }

    #[test]
    fn wrong_value_kind_is_rejected_without_mutation() {
        let mut options = RequestOptions::new();
        let err = options.set("timeout", "soon").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOptionValue {
                option: RequestOption::Timeout,
                expected: OptionKind::Number
            }
        ));
        assert!(!options.is_set(RequestOption::Timeout));
    }

    #[test]
    fn names_match_case_insensitively() {
        let mut options = RequestOptions::new();
        options.set("FOLLOWLOCATION", false).unwrap();
        options.set("customrequest", "PATCH").unwrap();
        assert!(!options.flag(RequestOption::FollowLocation));
        assert_eq!(options.text(RequestOption::CustomRequest).as_deref(), Some("PATCH"));
    }

    #[test]
    fn defaults_fill_unset_options() {
        let options = RequestOptions::new();
        assert_eq!(options.text(RequestOption::UserAgent).as_deref(), Some(DEFAULT_USER_AGENT));
        assert!(options.flag(RequestOption::Header));
        assert!(options.flag(RequestOption::FollowLocation));
        assert!(options.flag(RequestOption::ReturnTransfer));
        assert_eq!(options.number(RequestOption::Timeout), Some(30));
        assert_eq!(options.text(RequestOption::Encoding).as_deref(), Some("gzip"));
        assert!(!options.flag(RequestOption::SslVerifyPeer));
        assert_eq!(options.get(RequestOption::Url), None);
        // Reading never stores anything.
        assert_eq!(options.iter().count(), 0);
    }

    #[test]
    fn explicit_value_overrides_default() {
        let mut options = RequestOptions::new();
        options.set_timeout(5).set_encoding("identity");
        assert_eq!(options.number(RequestOption::Timeout), Some(5));
        assert_eq!(options.get_named("encoding").unwrap(), Some(OptionValue::from("identity")));
    }

    #[test]
    fn serialize_ignores_insertion_order() {
        let mut a = RequestOptions::new();
        a.set_url("http://example.com/a").set_timeout(10).set_post(false);

        let mut b = RequestOptions::new();
        b.set_post(false).set_timeout(10).set_url("http://example.com/a");

        assert_eq!(a.serialize(), b.serialize());
    }

    #[test]
    fn serialize_includes_defaults() {
        let json: serde_json::Value = serde_json::from_str(&RequestOptions::new().serialize()).unwrap();
        assert_eq!(json["timeout"], 30);
        assert_eq!(json["encoding"], "gzip");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn method_precedence() {
        let mut options = RequestOptions::new();
        assert_eq!(options.method(), Method::Get);

        options.set_post(true);
        assert_eq!(options.method(), Method::Post);

        options.set_custom_request("PUT");
        assert_eq!(options.method(), Method::Put);

        options.set_no_body(true);
        assert_eq!(options.method(), Method::Head);
    }

    #[test]
    fn any_custom_method_counts_as_mutating() {
        let mut options = RequestOptions::new();
        assert!(!options.is_mutating());

        options.set_custom_request("GET");
        assert_eq!(options.method(), Method::Get);
        assert!(options.is_mutating());

        options.unset(RequestOption::CustomRequest).set_no_body(true);
        assert!(!options.is_mutating());
    }

    #[test]
    fn deserializes_and_validates_names() {
        let options: RequestOptions =
            serde_json::from_str(r#"{"url":"http://x/","timeout":3,"httpHeader":["A: b"]}"#).unwrap();
        assert_eq!(options.url(), Some("http://x/"));
        assert_eq!(options.number(RequestOption::Timeout), Some(3));
        assert_eq!(
            options.get(RequestOption::HttpHeader),
            Some(OptionValue::List(vec!["A: b".to_string()]))
        );

        let result: Result<RequestOptions, _> = serde_json::from_str(r#"{"bogus":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn from_pairs_builds_options() {
        let options =
            RequestOptions::from_pairs([("url", OptionValue::from("http://x/")), ("post", true.into())])
                .unwrap();
        assert_eq!(options.method(), Method::Post);
        assert!(RequestOptions::from_pairs([("nope", true)]).is_err());
    }
}
