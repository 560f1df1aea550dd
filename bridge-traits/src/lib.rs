//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host
//! environment embedding the federation core.
//!
//! ## Overview
//!
//! This crate defines the contract between the core crates and the host's
//! I/O machinery. The core never talks to the network directly; every
//! provider call goes through the [`HttpClient`](http::HttpClient) trait so
//! hosts can supply their own transport (and tests can supply mocks).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with bearer
//!   auth and per-request timeouts
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should:
//!
//! - Convert transport-specific errors to `BridgeError`
//! - Provide actionable error messages
//! - Include error context (e.g., timeout vs. connection failure)
//!
//! Transport status codes are not errors at this layer: a completed exchange
//! yields an [`HttpResponse`](http::HttpResponse) whatever its status, and
//! callers decide what a 401 or 429 means for their domain. Implementations
//! must not retry on their own; retry policy belongs to the caller.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
