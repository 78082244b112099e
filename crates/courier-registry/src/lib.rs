//! Type-keyed handler registry for Courier.
//!
//! The receiving side of the messenger: a map from wire type tag to a
//! handler function plus the input shape it expects. Registration is
//! rare and lookup is on the hot path, so the table is a
//! read-write-locked map — lookups share the read lock, registration
//! takes the write lock briefly.
//!
//! There is no fallback handler. A lookup miss is a first-class error
//! that the messenger reports back to the original sender.

mod error;
mod registry;

pub use error::InvokeError;
pub use registry::{HandlerRegistry, RegisteredHandler};
