//! Workspace facade crate.
//!
//! Host applications can depend on `sfc-workspace` and reach the whole
//! federation surface through the re-exports below instead of wiring each
//! workspace crate individually. The default `native` feature pulls in the
//! `reqwest`-backed HTTP bridge; disable it when supplying a custom
//! `HttpClient` implementation.

pub use core_federation as federation;

#[cfg(feature = "native")]
pub use bridge_native as native;
