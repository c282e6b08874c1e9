//! markdup-se - streaming duplicate marking for single-end SAM files
//!
//! Reads a coordinate-sorted SAM text stream, groups adjacent records that
//! share a reference and position, and within each group marks reads with
//! identical sequences as duplicates of the best-quality copy. Duplicates
//! that sit close together on the same flow-cell tile are tagged as optical.
//!
//! # Example
//!
//! ```ignore
//! use markdup_se::{Args, run_markdup};
//!
//! let args = Args {
//!     input: "input.sam".to_string(),
//!     output: "output.sam".to_string(),
//!     pixels: 100,
//!     large_group_size: 1000,
//!     quiet: false,
//! };
//!
//! let stats = run_markdup(&args)?;
//! stats.log_summary();
//! ```

pub mod algorithm;
pub mod args;
pub mod error;
pub mod io;
pub mod markdup;
pub mod metadata;
pub mod progress;
pub mod record;
pub mod utils;

// Re-export commonly used items
pub use algorithm::{ClassifiedGroup, DuplicateFlags, classify_group, optical_threshold, quality_score};
pub use args::Args;
pub use error::{MarkdupError, Result};
pub use markdup::{MarkdupOptions, MarkdupStats, mark_duplicates_stream, run_markdup};
pub use metadata::ReadCoords;
pub use progress::{NoProgress, PercentProgress, Progress};
pub use record::{DuplicateKind, SamRecord};
