//! Plain HTTP data types shared by the client and transports.
//!
//! # Design
//! `Method` is resolved from option flags rather than stored directly, so the
//! precedence between `nobody`, `customRequest` and `post` lives in one
//! place (`Method::resolve`). `RequestLine` is the owned snapshot a response
//! keeps of the request that produced it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Custom(String),
}

impl Method {
    /// Most specific flag wins: `nobody` forces HEAD, a custom method beats
    /// `post`, and `post` beats the GET default.
    pub fn resolve(no_body: bool, custom_request: Option<&str>, post: bool) -> Method {
        if no_body {
            return Method::Head;
        }
        match custom_request {
            Some(custom) if !custom.trim().is_empty() => Method::from(custom),
            _ if post => Method::Post,
            _ => Method::Get,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Custom(name) => name,
        }
    }

    /// POST, PUT, DELETE and every custom method may change server state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get | Method::Head)
    }
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        let name = name.trim().to_ascii_uppercase();
        match name.as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            _ => Method::Custom(name),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The method and URL a response was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    pub method: Method,
    pub url: String,
}

/// Body for POST and PUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Sent exactly as given.
    Raw(String),
    /// Encoded as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

impl Payload {
    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Payload::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn encode(&self) -> String {
        match self {
            Payload::Raw(body) => body.clone(),
            Payload::Form(pairs) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Form(Vec::new())
    }
}

impl From<&str> for Payload {
    fn from(body: &str) -> Self {
        Payload::Raw(body.to_string())
    }
}

impl From<String> for Payload {
    fn from(body: String) -> Self {
        Payload::Raw(body)
    }
}

impl From<Vec<(String, String)>> for Payload {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Payload::Form(pairs)
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Payload {
    fn from(pairs: [(K, V); N]) -> Self {
        Payload::form(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_body_wins_over_everything() {
        assert_eq!(Method::resolve(true, Some("DELETE"), true), Method::Head);
    }

    #[test]
    fn custom_request_wins_over_post() {
        assert_eq!(Method::resolve(false, Some("put"), true), Method::Put);
        assert_eq!(
            Method::resolve(false, Some("PATCH"), false),
            Method::Custom("PATCH".to_string())
        );
    }

    #[test]
    fn blank_custom_request_is_ignored() {
        assert_eq!(Method::resolve(false, Some(" "), true), Method::Post);
        assert_eq!(Method::resolve(false, None, false), Method::Get);
    }

    #[test]
    fn mutating_methods() {
        assert!(!Method::Get.is_mutating());
        assert!(!Method::Head.is_mutating());
        assert!(Method::Post.is_mutating());
        assert!(Method::Put.is_mutating());
        assert!(Method::Delete.is_mutating());
        assert!(Method::Custom("PATCH".to_string()).is_mutating());
    }

    #[test]
    fn form_payload_is_url_encoded() {
        let payload = Payload::from([("name", "a b"), ("tag", "x&y")]);
        assert_eq!(payload.encode(), "name=a+b&tag=x%26y");
    }

    #[test]
    fn raw_payload_is_untouched() {
        assert_eq!(Payload::from("{\"a\":1}").encode(), "{\"a\":1}");
    }
}
