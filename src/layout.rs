//! Bit layout of generated ids.
//!
//! Default layout, most significant bit first:
//!
//! ```text
//! | timestamp delta (42) | node id (10) | sequence (12) |
//!   bits 63..22            bits 21..12    bits 11..0
//! ```
//!
//! The timestamp delta is milliseconds since [`DEFAULT_EPOCH_MS`]
//! (2023-01-01T00:00:00Z). Ids already issued with the default layout stay
//! decodable only if the epoch and both bit widths are preserved.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// 2023-01-01T00:00:00Z in milliseconds since the Unix epoch.
pub const DEFAULT_EPOCH_MS: i64 = 1_672_531_200_000;

/// Bits reserved for the node id in the default layout.
pub const DEFAULT_NODE_BITS: u8 = 10;

/// Bits reserved for the per-millisecond sequence in the default layout.
pub const DEFAULT_STEP_BITS: u8 = 12;

/// Node and sequence bits together may not exceed this many bits.
pub const MAX_LOW_BITS: u8 = 32;

/// Error type for layout construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error(
        "invalid bit widths: node_bits={node_bits}, step_bits={step_bits} \
         (each must be at least 1 and together at most 32)"
    )]
    InvalidBits { node_bits: u8, step_bits: u8 },
}

/// Immutable description of how ids are packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    epoch_ms: i64,
    node_bits: u8,
    step_bits: u8,
}

impl Layout {
    /// Create a layout with a custom epoch and bit widths.
    pub fn new(epoch_ms: i64, node_bits: u8, step_bits: u8) -> Result<Self, LayoutError> {
        if node_bits == 0
            || step_bits == 0
            || u16::from(node_bits) + u16::from(step_bits) > u16::from(MAX_LOW_BITS)
        {
            return Err(LayoutError::InvalidBits {
                node_bits,
                step_bits,
            });
        }

        Ok(Self {
            epoch_ms,
            node_bits,
            step_bits,
        })
    }

    /// The default layout with a different epoch.
    pub fn with_epoch(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            ..Self::default()
        }
    }

    pub fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    pub fn node_bits(&self) -> u8 {
        self.node_bits
    }

    pub fn step_bits(&self) -> u8 {
        self.step_bits
    }

    /// Largest valid node id (`2^node_bits - 1`).
    pub fn node_max(&self) -> i64 {
        -1 ^ (-1 << self.node_bits)
    }

    /// Largest sequence value within one millisecond (`2^step_bits - 1`).
    pub fn step_max(&self) -> i64 {
        -1 ^ (-1 << self.step_bits)
    }

    fn time_shift(&self) -> u8 {
        self.node_bits + self.step_bits
    }

    /// Pack already-validated fields into an id.
    ///
    /// `timestamp_delta` is milliseconds since this layout's epoch.
    pub fn encode(&self, timestamp_delta: i64, node_id: i64, sequence: i64) -> i64 {
        (timestamp_delta << self.time_shift()) | (node_id << self.step_bits) | sequence
    }

    /// Split an id back into its fields.
    pub fn decode(&self, id: i64) -> DecodedId {
        let timestamp_delta = id >> self.time_shift();
        DecodedId {
            timestamp_delta,
            timestamp_millis: timestamp_delta + self.epoch_ms,
            node_id: (id >> self.step_bits) & self.node_max(),
            sequence: id & self.step_max(),
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            epoch_ms: DEFAULT_EPOCH_MS,
            node_bits: DEFAULT_NODE_BITS,
            step_bits: DEFAULT_STEP_BITS,
        }
    }
}

/// The fields of a decoded id.
///
/// Field order matters: the derived ordering compares timestamp first, then
/// node, then sequence, which matches the numeric order of the packed ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DecodedId {
    /// Milliseconds since the layout's epoch
    pub timestamp_delta: i64,
    /// Milliseconds since the Unix epoch
    pub timestamp_millis: i64,
    pub node_id: i64,
    pub sequence: i64,
}

impl DecodedId {
    /// Issue time as a UTC datetime, if representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_millis)
    }
}
