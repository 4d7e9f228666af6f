//! Client side of the Carryofy REST backend.
//!
//! The composer only talks to the backend through the [`BroadcastBackend`]
//! trait. `http` is the production implementation; `memory` serves local
//! development and tests.

mod backend;
pub mod backoff;
mod factory;
mod http_backend;
mod memory_backend;

pub use backend::{
    BackendError, BackendOperation, BackendResult, BroadcastBackend, BroadcastProduct,
    ProductQuery,
};
pub use backoff::{BackoffConfig, ExponentialBackoff, RetryPolicy};
pub use factory::create_broadcast_backend;
pub use http_backend::HttpBackend;
pub use memory_backend::{MemoryBackend, RecordedBroadcast};
