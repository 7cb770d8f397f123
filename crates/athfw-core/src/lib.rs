//! athfw-core: codec for ath10k/ath11k board-data and firmware containers.
//!
//! The wireless drivers load two kinds of signed container files:
//! `board-2.bin`, which bundles many named board-data images (and, on
//! ath11k, regulatory databases), and `firmware-N.bin`, which carries the
//! firmware images together with version, timestamp and feature metadata.
//! Both are a fixed signature followed by length-prefixed, 4-byte aligned
//! information elements.
//!
//! # Architecture
//!
//! - **Codec**: signature and element framing, feature bitmaps, constants
//! - **Board**: nested board/regdb containers and JSON mapping files
//! - **Firmware**: flat firmware containers, field updates
//! - **Diff**: entry-level comparison and external summary diffs
//! - **Events**: observer handle for decode/encode diagnostics
//! - **Config**: TOML tool configuration and decode options
//!
//! # Example
//!
//! ```no_run
//! use athfw_core::{BoardContainer, DecodeOptions, TracingObserver};
//!
//! let data = std::fs::read("board-2.bin").unwrap();
//! let board = BoardContainer::decode(&data, &DecodeOptions::default(), &TracingObserver).unwrap();
//! print!("{}", board.summarize(&data, true));
//! ```

pub mod board;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod firmware;

// Re-exports for convenience
pub use board::{BoardContainer, BoardEntry, BoardProduct, DuplicateName, EntryKind};
pub use config::{ConfigError, DecodeOptions, ToolConfig, UnknownElementPolicy};
pub use diff::{DiffError, DiffOutcome, DiffStat, diff_summaries, diffstat};
pub use error::CodecError;
pub use events::{CodecEvent, CodecObserver, NullObserver, RecordingObserver, TracingObserver};
pub use firmware::{FirmwareChanges, FirmwareContainer, FwElement, FwProduct, ImageKind};
