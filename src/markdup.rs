//! Streaming duplicate marking
//!
//! Wires the group reader, the classifier and the writer together. Exactly
//! one group (plus the lookahead record) is in memory at any time.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::algorithm::{ClassifiedGroup, classify_group, optical_threshold};
use crate::args::Args;
use crate::io::{DEFAULT_LARGE_GROUP_SIZE, GroupReader, inspect_header, write_group};
use crate::progress::{NoProgress, PercentProgress, Progress};

/// Path meaning stdin or stdout
pub const STDIO_PATH: &str = "-";

/// Library-level settings derived from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdupOptions {
    /// Squared distance below which same-tile duplicates are optical
    pub optical_threshold: i64,
    /// Groups above this size are logged
    pub large_group_size: usize,
}

impl MarkdupOptions {
    pub fn from_pixels(pixels: u32) -> Self {
        Self { optical_threshold: optical_threshold(pixels), large_group_size: DEFAULT_LARGE_GROUP_SIZE }
    }

    #[must_use]
    pub fn with_large_group_size(mut self, size: usize) -> Self {
        self.large_group_size = size;
        self
    }
}

impl From<&Args> for MarkdupOptions {
    fn from(args: &Args) -> Self {
        Self::from_pixels(args.pixels).with_large_group_size(args.large_group_size)
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkdupStats {
    pub records_read: u64,
    pub bytes_read: u64,
    pub unmapped_skipped: u64,
    pub records_written: u64,
    pub groups: u64,
    pub singleton_groups: u64,
    pub large_groups: u64,
    pub duplicates: u64,
    pub optical_duplicates: u64,
    /// Header declared a sort order other than `coordinate`
    pub header_unsorted: bool,
}

impl MarkdupStats {
    fn add_group(&mut self, group: &ClassifiedGroup) {
        self.groups += 1;
        if group.len() == 1 {
            self.singleton_groups += 1;
        }
        self.records_written += group.len() as u64;
        self.duplicates += group.flags.duplicate_count() as u64;
        self.optical_duplicates += group.flags.optical_count() as u64;
    }

    /// Log the summary the way the binary reports it
    pub fn log_summary(&self) {
        info!(
            "  read {} records in {} bytes ({} unmapped skipped)",
            self.records_read, self.bytes_read, self.unmapped_skipped
        );
        if self.header_unsorted {
            warn!("  input header is not marked coordinate-sorted; groups may be split");
        }
        info!(
            "  formed {} position groups ({} singletons, {} large)",
            self.groups, self.singleton_groups, self.large_groups
        );
        info!(
            "  found {} duplicates, {} of them optical",
            self.duplicates, self.optical_duplicates
        );
        info!("  wrote {} records", self.records_written);
    }
}

/// Mark duplicates from `reader` into `writer`
///
/// Header lines are copied first, then every mapped record is written once,
/// grouped and in sorted order within its group.
pub fn mark_duplicates_stream<R, W, P>(
    reader: R,
    mut writer: W,
    options: MarkdupOptions,
    progress: P,
) -> crate::error::Result<MarkdupStats>
where
    R: BufRead,
    W: Write,
    P: Progress,
{
    let mut groups =
        GroupReader::new(reader, progress).with_large_group_size(options.large_group_size);

    let header = groups.read_header()?;
    let mut stats = MarkdupStats { header_unsorted: !inspect_header(&header), ..Default::default() };
    writer.write_all(&header)?;

    while let Some(group) = groups.next_group()? {
        let classified = classify_group(group, options.optical_threshold)?;
        write_group(&mut writer, &classified)?;
        stats.add_group(&classified);
    }
    writer.flush()?;

    stats.records_read = groups.records_read();
    stats.bytes_read = groups.bytes_read();
    stats.unmapped_skipped = groups.unmapped_skipped();
    stats.large_groups = groups.large_groups();
    Ok(stats)
}

/// Run duplicate marking for the command line arguments
pub fn run_markdup(args: &Args) -> Result<MarkdupStats> {
    let options = MarkdupOptions::from(args);
    info!(
        "marking duplicates with pixel radius {} (squared threshold {})",
        args.pixels, options.optical_threshold
    );

    // Input is opened before the output is created
    let input: Option<(File, u64)> = if args.input == STDIO_PATH {
        None
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open input '{}'", args.input))?;
        let total_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
        Some((file, total_bytes))
    };

    let writer: Box<dyn Write> = if args.output == STDIO_PATH {
        Box::new(BufWriter::with_capacity(1 << 20, io::stdout().lock()))
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create output '{}'", args.output))?;
        Box::new(BufWriter::with_capacity(1 << 20, file))
    };

    let stats = match input {
        None => {
            let reader = BufReader::with_capacity(1 << 20, io::stdin().lock());
            mark_duplicates_stream(reader, writer, options, NoProgress)
        }
        Some((file, _)) if args.quiet => {
            let reader = BufReader::with_capacity(1 << 20, file);
            mark_duplicates_stream(reader, writer, options, NoProgress)
        }
        Some((file, total_bytes)) => {
            let reader = BufReader::with_capacity(1 << 20, file);
            mark_duplicates_stream(reader, writer, options, PercentProgress::new(total_bytes))
        }
    }
    .with_context(|| format!("failed to mark duplicates in '{}'", args.input))?;

    Ok(stats)
}
