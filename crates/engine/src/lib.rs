//! `sheetpilot-engine`: response normalization and table merging.
//!
//! Pure crate: receives model text and an in-memory table, returns the
//! merged result. No file or network IO.

pub mod cell;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod table;

pub use cell::CellValue;
pub use error::EngineError;
pub use merge::{merge, MergeNote, MergeOutput, MergeResult, OutputPolicy, TableMerger};
pub use normalize::{normalize, ResponseNormalizer};
pub use table::SourceTable;
