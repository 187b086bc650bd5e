//! Offline-first resource delivery for the Calcagnini Trails map app.
//!
//! The worker intercepts every outgoing resource request from the page and
//! decides, per request, whether to answer from a local cache store or the
//! network. Requests fall into two independent lifecycle classes:
//!
//! - app-shell resources live in a versioned cache that is replaced
//!   wholesale on each deployment
//! - map tiles live in a persistent cache that is never purged
//!
//! [`Worker`] composes the lifecycle controller, the request router, and the
//! two cache policies over a [`CacheStorage`] backend and a [`Fetch`]
//! network boundary.

pub mod cache;
pub mod config;
pub mod net;
pub mod worker;

pub use cache::{CacheStorage, CacheStore, DiskStorage, MemoryStorage};
pub use config::WorkerConfig;
pub use net::{Fetch, FetchError, Fingerprint, HttpClient, Method, Request, Snapshot};
pub use worker::{
    FetchOutcome, LifecycleController, LifecycleError, Route, Worker, WorkerState,
};
