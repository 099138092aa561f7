//! beads-core: the issue store behind the beads tracker.
//!
//! # Conventions
//!
//! - **Errors**: store operations return [`StoreResult`]; loaders use their own
//!   `thiserror` enums, each carrying an [`ErrorCode`].
//! - **Logging**: `tracing` macros; commits log at `debug`, loads at `info`,
//!   rollbacks at `warn`.

pub mod clock;
pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod lock;
pub mod model;
pub mod persist;
pub mod store;
pub mod tenant;

pub use error::{ErrorCode, ErrorKind, PersistError, StoreError, StoreResult};
pub use store::{BeadRef, IssueStore, Mutation, StoreOptions};
