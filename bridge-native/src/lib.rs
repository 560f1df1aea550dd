//! # Native Bridge Implementations
//!
//! Default implementations of bridge traits for native targets
//! (macOS, Windows, Linux servers and desktops).
//!
//! ## Overview
//!
//! This crate provides a production-ready implementation of the HTTP bridge
//! using native-appropriate libraries:
//! - `HttpClient` using `reqwest` with rustls
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_native::ReqwestHttpClient;
//! use bridge_traits::HttpClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
//!
//!     // Use in federation configuration
//! }
//! ```

mod http;

pub use http::ReqwestHttpClient;
