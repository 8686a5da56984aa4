//! Object storage abstraction.
//!
//! This module provides a **provider-agnostic trait** for object storage
//! ([`ObjectIO`]: S3, GCS, Azure Blob) together with an in-memory fake.
//!
//! ## Synchronous by Design
//! Cloud SDKs are usually async-first; [`ObjectIO`] is blocking, matching the
//! writer's execution model. Implementations can use `tokio` or similar
//! internally, but expose a blocking interface.
//!
//! ## Usage
//! ```
//! use rowsink::io::cloud::*;
//!
//! # fn main() -> CloudResult<()> {
//! let storage = FakeObjectIO::new();
//! storage.put_object("bucket", "key", b"data")?;
//! assert!(storage.object_exists("bucket", "key")?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`CloudResult<T>`] where the error is [`CloudIOError`],
//! categorized by [`ErrorKind`]. `Network`, `Timeout`, `ServiceUnavailable`
//! and `RateLimited` are transient. A [`CloudIOError`] converts into an
//! [`std::io::Error`] with the closest matching kind.

pub mod fake;
pub mod helpers;
pub mod traits;

pub use fake::*;
pub use traits::*;
