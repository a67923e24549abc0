//! Configuration parsing for the flakegen CLI.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Defaults matching the interoperable id layout

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::generator::GeneratorOptions;
use crate::layout::{Layout, LayoutError, DEFAULT_EPOCH_MS, DEFAULT_NODE_BITS, DEFAULT_STEP_BITS};

/// Flakegen: time-ordered 64-bit id generator.
#[derive(Parser, Debug, Clone)]
#[command(name = "flakegen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Config {
    /// Node id of this generator (0-1023 with the default layout)
    #[arg(
        short,
        long,
        env = "FLAKEGEN_NODE_ID",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub node_id: i64,

    /// File holding the last issued timestamp (enables persistent mode)
    #[arg(short, long, env = "FLAKEGEN_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Layout epoch in milliseconds since the Unix epoch
    #[arg(long, env = "FLAKEGEN_EPOCH_MS", default_value_t = DEFAULT_EPOCH_MS)]
    pub epoch_ms: i64,

    /// Bits reserved for the node id
    #[arg(long, env = "FLAKEGEN_NODE_BITS", default_value_t = DEFAULT_NODE_BITS)]
    pub node_bits: u8,

    /// Bits reserved for the per-millisecond sequence
    #[arg(long, env = "FLAKEGEN_STEP_BITS", default_value_t = DEFAULT_STEP_BITS)]
    pub step_bits: u8,

    /// Longest one id may wait on a stalled clock, in milliseconds (unbounded if unset)
    #[arg(long, env = "FLAKEGEN_MAX_STALL_MS")]
    pub max_stall_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate ids and print them
    Next {
        /// Number of ids to generate
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Decode an id into timestamp, node id and sequence
    Decode {
        /// The id to decode
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Emit ids periodically until interrupted
    Stream {
        /// Delay between ids in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many ids
        #[arg(short, long)]
        limit: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The id layout described by the epoch and bit-width options.
    pub fn layout(&self) -> Result<Layout, LayoutError> {
        Layout::new(self.epoch_ms, self.node_bits, self.step_bits)
    }

    /// Generator options described by this configuration.
    pub fn generator_options(&self) -> Result<GeneratorOptions, LayoutError> {
        Ok(GeneratorOptions {
            layout: self.layout()?,
            max_stall: self.max_stall_ms.map(Duration::from_millis),
        })
    }

    /// Create a configuration for testing.
    #[cfg(test)]
    pub fn test_config(command: Command) -> Self {
        Self {
            log_level: "debug".into(),
            command,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: 0,
            state_file: None,
            epoch_ms: DEFAULT_EPOCH_MS,
            node_bits: DEFAULT_NODE_BITS,
            step_bits: DEFAULT_STEP_BITS,
            max_stall_ms: None,
            log_level: "warn".into(),
            output: OutputFormat::Text,
            command: Command::Next { count: 1 },
        }
    }
}
