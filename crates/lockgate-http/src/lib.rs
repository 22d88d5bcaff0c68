//! HTTP transport for the lockgate distributed lock backend.
//!
//! [`backend_router`]/[`run_backend_server`] expose any
//! [`DistributedLockerBackend`](lockgate_distributed::DistributedLockerBackend)
//! over three JSON POST endpoints; [`HttpBackend`] is the matching client,
//! itself a backend, so a
//! [`DistributedLocker`](lockgate_distributed::DistributedLocker) works
//! against a remote server exactly as against a local store.

mod client;
mod server;
pub mod wire;

pub use client::HttpBackend;
pub use server::{backend_router, run_backend_server};
