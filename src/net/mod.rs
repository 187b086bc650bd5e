//! Network boundary for the worker.
//!
//! This module defines the request/response model shared by the cache
//! stores and routing policies (`Request`, `Fingerprint`, `Snapshot`) and
//! the `Fetch` trait with its reqwest-backed `HttpClient` implementation.

pub mod client;
pub mod error;
pub mod types;

pub use client::{Fetch, HttpClient};
pub use error::FetchError;
pub use types::{Fingerprint, Method, Request, Snapshot};
