//! In-memory backends.
//!
//! [`MemoryStore`] implements the select/put/delete contract of the attribute
//! store closely enough to drive cursors and saves end to end: token
//! pagination with a per-page cap, the count projection, simple equality
//! filters, single-attribute ordering and conditional writes.

mod blob;
mod store;
#[cfg(test)]
mod tests;

pub use blob::MemoryBlobStore;
pub use store::{MemoryStore, SelectCall, WriteCall};
