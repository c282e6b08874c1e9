//! Tab-separated SAM alignment lines
//!
//! A record keeps every field of its line as raw bytes so that anything
//! this tool does not touch is written back byte for byte. Only the flag
//! field is ever rewritten.

use std::io::Write;

use bstr::{BStr, BString, ByteSlice};
use noodles::sam::alignment::record::Flags;

use crate::error::{MarkdupError, Result};
use crate::metadata::parse_int;

pub const NAME_FIELD: usize = 0;
pub const FLAG_FIELD: usize = 1;
pub const REFERENCE_FIELD: usize = 2;
pub const POSITION_FIELD: usize = 3;
pub const SEQUENCE_FIELD: usize = 9;
pub const QUALITY_FIELD: usize = 10;

/// Minimum number of tab-separated fields in an alignment line
pub const MIN_FIELDS: usize = QUALITY_FIELD + 1;

/// Reference name of unmapped reads
pub const UNMAPPED_REFERENCE: &[u8] = b"*";

/// Annotation appended to library (PCR) duplicates
pub const LIBRARY_DUPLICATE_TAG: &[u8] = b" DT:Z:LB";

/// Annotation appended to optical duplicates
pub const OPTICAL_DUPLICATE_TAG: &[u8] = b" DT:Z:SQ";

/// How a record was classified within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    Unique,
    Library,
    Optical,
}

impl DuplicateKind {
    /// Suffix written before the line terminator, if any
    pub fn tag(self) -> Option<&'static [u8]> {
        match self {
            DuplicateKind::Unique => None,
            DuplicateKind::Library => Some(LIBRARY_DUPLICATE_TAG),
            DuplicateKind::Optical => Some(OPTICAL_DUPLICATE_TAG),
        }
    }
}

/// One alignment line split into fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamRecord {
    fields: Vec<BString>,
    flags: Flags,
    position: u64,
    line_number: u64,
}

impl SamRecord {
    /// Parse one line, without its terminator
    pub fn parse(line: &[u8], line_number: u64) -> Result<Self> {
        let fields: Vec<BString> = line.split_str("\t").map(BString::from).collect();
        if fields.len() < MIN_FIELDS {
            return Err(MarkdupError::MalformedRecord {
                line: line_number,
                reason: format!("expected at least {} fields, found {}", MIN_FIELDS, fields.len()),
            });
        }

        let flag_bits = fields[FLAG_FIELD]
            .to_str()
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| MarkdupError::MalformedRecord {
                line: line_number,
                reason: format!("invalid flag '{}'", fields[FLAG_FIELD]),
            })?;

        let position = parse_int(&fields[POSITION_FIELD])
            .and_then(|p| u64::try_from(p).ok())
            .ok_or_else(|| MarkdupError::MalformedRecord {
                line: line_number,
                reason: format!("invalid position '{}'", fields[POSITION_FIELD]),
            })?;

        Ok(Self { fields, flags: Flags::from(flag_bits), position, line_number })
    }

    #[inline]
    pub fn name(&self) -> &BStr {
        self.fields[NAME_FIELD].as_bstr()
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[inline]
    pub fn reference(&self) -> &BStr {
        self.fields[REFERENCE_FIELD].as_bstr()
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn sequence(&self) -> &BStr {
        self.fields[SEQUENCE_FIELD].as_bstr()
    }

    #[inline]
    pub fn quality(&self) -> &BStr {
        self.fields[QUALITY_FIELD].as_bstr()
    }

    /// 1-based line number this record was read from
    #[inline]
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Reads with a `*` reference are dropped before grouping
    #[inline]
    pub fn is_unmapped(&self) -> bool {
        self.reference() == UNMAPPED_REFERENCE
    }

    /// Same (reference, position) key, i.e. same group
    ///
    /// Positions are compared as written, so `100` and `0100` differ.
    #[inline]
    pub fn same_position(&self, other: &SamRecord) -> bool {
        self.fields[POSITION_FIELD] == other.fields[POSITION_FIELD]
            && self.reference() == other.reference()
    }

    /// Set the duplicate bit (0x400) and rewrite the flag field
    pub fn mark_duplicate(&mut self) {
        self.flags.insert(Flags::DUPLICATE);
        self.fields[FLAG_FIELD] = BString::from(u16::from(self.flags).to_string());
    }

    /// Write the record as one line, with the tag for `kind` before the newline
    pub fn write_annotated<W: Write>(&self, writer: &mut W, kind: DuplicateKind) -> std::io::Result<()> {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                writer.write_all(b"\t")?;
            }
            writer.write_all(field)?;
        }
        if let Some(tag) = kind.tag() {
            writer.write_all(tag)?;
        }
        writer.write_all(b"\n")
    }
}
