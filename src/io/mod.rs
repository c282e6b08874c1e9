//! SAM text I/O
//!
//! Reading is done one line at a time: header lines are copied through,
//! then records are pulled into position groups with a single record of
//! lookahead. Writing emits a classified group with its duplicate tags.

use std::io::{BufRead, Write};

use bstr::ByteSlice;
use log::{info, warn};
use noodles::sam;

use crate::algorithm::ClassifiedGroup;
use crate::error::Result;
use crate::progress::Progress;
use crate::record::SamRecord;

/// Groups larger than this are logged as a potential pathological input
pub const DEFAULT_LARGE_GROUP_SIZE: usize = 1000;

/// Splits a sorted SAM stream into groups of adjacent same-position records
///
/// Records with a `*` reference are dropped before grouping. The record that
/// ends a group is held back and starts the next one.
pub struct GroupReader<R, P> {
    reader: R,
    progress: P,
    buf: Vec<u8>,
    peeked: Option<SamRecord>,
    large_group_size: usize,
    line_number: u64,
    bytes_read: u64,
    records_read: u64,
    unmapped_skipped: u64,
    large_groups: u64,
    finished: bool,
}

impl<R: BufRead, P: Progress> GroupReader<R, P> {
    pub fn new(reader: R, progress: P) -> Self {
        Self {
            reader,
            progress,
            buf: Vec::with_capacity(512),
            peeked: None,
            large_group_size: DEFAULT_LARGE_GROUP_SIZE,
            line_number: 0,
            bytes_read: 0,
            records_read: 0,
            unmapped_skipped: 0,
            large_groups: 0,
            finished: false,
        }
    }

    #[must_use]
    pub fn with_large_group_size(mut self, size: usize) -> Self {
        self.large_group_size = size;
        self
    }

    /// Read the leading `@` header lines, returning them with terminators
    ///
    /// Must be called before the first group is read.
    pub fn read_header(&mut self) -> Result<Vec<u8>> {
        let mut header = Vec::new();
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.first() != Some(&b'@') {
                break;
            }
            let n = self.reader.read_until(b'\n', &mut header)?;
            self.line_number += 1;
            self.bytes_read += n as u64;
            if !header.ends_with(b"\n") {
                header.push(b'\n');
            }
        }
        Ok(header)
    }

    /// Next group, or `None` at end of input
    pub fn next_group(&mut self) -> Result<Option<Vec<SamRecord>>> {
        let first = match self.peeked.take() {
            Some(record) => record,
            None => match self.read_mapped()? {
                Some(record) => record,
                None => {
                    if !self.finished {
                        self.finished = true;
                        self.progress.finish();
                    }
                    return Ok(None);
                }
            },
        };

        let mut group = vec![first];
        while let Some(record) = self.read_mapped()? {
            if record.same_position(&group[0]) {
                group.push(record);
            } else {
                self.peeked = Some(record);
                break;
            }
        }

        if group.len() > self.large_group_size {
            self.large_groups += 1;
            warn!(
                "beginning large group of size {} at {}:{}",
                group.len(),
                group[0].reference(),
                group[0].position()
            );
        }

        Ok(Some(group))
    }

    /// Next record with a mapped reference
    fn read_mapped(&mut self) -> Result<Option<SamRecord>> {
        while let Some(record) = self.read_record()? {
            if record.is_unmapped() {
                self.unmapped_skipped += 1;
                continue;
            }
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn read_record(&mut self) -> Result<Option<SamRecord>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        self.bytes_read += n as u64;
        self.records_read += 1;

        let line = strip_line_terminator(&self.buf);
        let record = SamRecord::parse(line, self.line_number)?;
        self.progress.record(self.records_read, self.bytes_read);
        Ok(Some(record))
    }

    /// Alignment lines consumed so far, including unmapped ones
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn unmapped_skipped(&self) -> u64 {
        self.unmapped_skipped
    }

    pub fn large_groups(&self) -> u64 {
        self.large_groups
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: BufRead, P: Progress> Iterator for GroupReader<R, P> {
    type Item = Result<Vec<SamRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_group().transpose()
    }
}

fn strip_line_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Log what the SAM header says about the input
///
/// Returns `false` when the header declares a sort order other than
/// `coordinate`, since grouping assumes position-sorted input.
pub fn inspect_header(header: &[u8]) -> bool {
    if header.is_empty() {
        info!("input has no header");
        return true;
    }

    match header.to_str().map(|s| s.parse::<sam::Header>()) {
        Ok(Ok(parsed)) => info!(
            "header: {} reference sequences, {} read groups",
            parsed.reference_sequences().len(),
            parsed.read_groups().len()
        ),
        Ok(Err(e)) => warn!("could not parse SAM header, copying it unchanged: {}", e),
        Err(e) => warn!("SAM header is not valid UTF-8, copying it unchanged: {}", e),
    }

    let sort_order = ByteSlice::lines(header)
        .find(|line| line.starts_with(b"@HD"))
        .and_then(|hd| hd.split_str("\t").find_map(|field| field.strip_prefix(b"SO:")));
    match sort_order {
        Some(so) if so != b"coordinate" => {
            warn!("input header declares sort order '{}', expected coordinate", so.as_bstr());
            false
        }
        _ => true,
    }
}

/// Write every record of a classified group with its duplicate tag
pub fn write_group<W: Write>(writer: &mut W, group: &ClassifiedGroup) -> std::io::Result<()> {
    for (record, kind) in group.iter() {
        record.write_annotated(writer, kind)?;
    }
    Ok(())
}
