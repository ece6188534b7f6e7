//! A first-fit, boundary-tag `malloc` replacement.
//!
//! One contiguous arena grows from a [`MemorySource`]; every chunk carries
//! its size and state at both ends, and free chunks form a single
//! address-ordered list that is coalesced on every release. A single lock
//! serializes all operations.

extern crate libc;

pub mod api;
pub mod config;
pub mod error;
mod fork;
pub mod global_alloc;
pub mod heap;
pub mod init;
pub mod log;
pub mod platform;
pub mod sync;
pub mod util;

pub use error::AllocError;
pub use global_alloc::TagMalloc;
pub use heap::{Heap, HeapReport};
pub use platform::{MemorySource, ReservedRegion};
