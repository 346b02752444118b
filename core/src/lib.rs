//! Single-request HTTP client over a pluggable transport.
//!
//! # Overview
//! A [`Client`] turns a closed set of [`RequestOptions`] into transport
//! settings, runs the request through a [`Transport`] (optionally served from
//! a [`ResultCache`]), decodes the raw output into headers and body, and
//! classifies failures. The core performs no I/O of its own.
//!
//! # Design
//! - Options are enum-keyed and validated at the boundary; defaults are a pure
//!   overlay computed on read.
//! - The header/body split uses the transport-reported header size only, so
//!   redirect chains (several concatenated header blocks) decode correctly.
//! - An error status on the final hop beats a transport failure; both carry
//!   the decoded response.
//! - Mutating requests never touch the cache.
//! - Lifecycle hooks are an explicit trait object passed to the client; a
//!   veto is the `Outcome::Cancelled` value, not an error.

pub mod cache;
pub mod client;
pub mod error;
pub mod handle;
pub mod hooks;
pub mod http;
pub mod options;
pub mod response;
pub mod transport;

pub use cache::{fingerprint, CacheDependency, CachePolicy, MemoryCache, ResultCache};
pub use client::{Client, Outcome};
pub use error::Error;
pub use handle::{TransportFailure, TransportHandle, TransportSettings};
pub use hooks::{FnHooks, RequestHooks};
pub use http::{Method, Payload, RequestLine};
pub use options::{OptionKind, OptionValue, RequestOption, RequestOptions};
pub use response::{HeaderBlock, HeaderBlocks, Response};
pub use transport::{RawResponse, TransferInfo, Transport};
