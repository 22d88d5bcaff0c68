//! Core types and traits for the lockgate named lock service.
//!
//! This crate defines the pieces shared by every lock engine: the
//! [`Locker`] contract, [`LockHandle`], [`AcquireOptions`] with its wait
//! callbacks, and the [`LockError`] taxonomy whose canonical texts survive
//! the HTTP wire.

pub mod debug;
pub mod error;
pub mod handle;
pub mod locker;
pub mod options;

pub use error::{LockError, LockResult, SerializableError};
pub use handle::LockHandle;
pub use locker::{with_acquire, Locker};
pub use options::{AcquireOptions, BoxFuture, DoWait, OnLostLeaseFn, OnWaitFn};
