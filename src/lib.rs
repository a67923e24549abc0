//! Flakegen: time-ordered 64-bit identifiers without a central allocator.
//!
//! Each id packs a millisecond timestamp, a caller-assigned node id and a
//! per-millisecond sequence number into one signed 64-bit integer, so ids
//! from one node sort by issue time and ids from distinct nodes never collide.
//!
//! # Architecture
//!
//! - **Bit layout**: pure encode/decode of `(timestamp, node, sequence)`
//! - **Clock guard**: serialized sequence advance with rollback protection
//! - **Persistence**: optional durable last-timestamp across restarts
//!
//! # Modules
//!
//! - [`clock`]: Wall clock and fake clock sources
//! - [`config`]: CLI and environment configuration
//! - [`counter`]: Counter-backed generator variant (external INCR store)
//! - [`generator`]: The id generator itself
//! - [`layout`]: Bit layout and id decoding
//! - [`observability`]: Tracing setup
//! - [`shutdown`]: Signal-driven and scoped flushing of generator state
//! - [`storage`]: Durable last-timestamp stores
//!
//! # Example
//!
//! ```
//! use flakegen::{Generator, Layout};
//!
//! let generator = Generator::new(1).unwrap();
//! let id = generator.next_id().unwrap();
//! let decoded = Layout::default().decode(id);
//! assert_eq!(decoded.node_id, 1);
//! ```

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // generator::GeneratorError is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc,      // Panic docs can be verbose
    clippy::similar_names            // seq/step/sequence are fine
)]

pub mod clock;
pub mod config;
pub mod counter;
pub mod generator;
pub mod layout;
pub mod observability;
pub mod shutdown;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use generator::{Generator, GeneratorError, GeneratorOptions};
pub use layout::{DecodedId, Layout, LayoutError};
pub use storage::{FileStore, MemoryStore, StorageError, TimestampStore};
