//! Duplicate and optical duplicate detection within a position group
//!
//! A group is every adjacent record sharing (reference, position). Records
//! are sorted by (sequence, tile number) so that identical sequences sit
//! next to each other, which lets both scans stop as soon as the sequence
//! changes.

use bstr::BStr;
use log::debug;

use crate::error::Result;
use crate::metadata::ReadCoords;
use crate::record::{DuplicateKind, SamRecord};

/// Quality score of a read: sum of `(byte - 64)` over its quality string
///
/// No range check is done, so Phred+33 strings score low or negative.
#[inline]
pub fn quality_score(quality: &[u8]) -> i64 {
    quality.iter().map(|&q| i64::from(q) - 64).sum()
}

/// Squared optical distance threshold for a pixel radius
///
/// The radius is converted with `10 * radius + 1000` before squaring, while
/// the distance it is compared to stays in raw pixel units.
#[inline]
pub fn optical_threshold(radius: u32) -> i64 {
    let converted = 10 * i64::from(radius) + 1000;
    converted * converted
}

/// Mark library duplicates among sorted sequences
///
/// For each run of equal sequences every member except the highest quality
/// one (first in sort order on ties) is marked.
pub fn find_duplicates(sequences: &[&BStr], qualities: &[i64]) -> Vec<bool> {
    let n = sequences.len();
    let mut is_dup = vec![false; n];

    for i in 0..n {
        if is_dup[i] {
            continue;
        }
        for j in (i + 1)..n {
            if sequences[i] != sequences[j] {
                break;
            }
            if qualities[i] >= qualities[j] {
                is_dup[j] = true;
            } else {
                is_dup[i] = true;
            }
        }
    }

    is_dup
}

/// Mark optical duplicates among sorted sequences
///
/// Only same-sequence pairs are compared. A tile or lane mismatch skips the
/// pair; only a change of sequence ends the scan from `i`.
pub fn find_optical_duplicates(
    sequences: &[&BStr],
    coords: &[ReadCoords],
    qualities: &[i64],
    threshold: i64,
) -> Vec<bool> {
    let n = sequences.len();
    let mut is_optical = vec![false; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if sequences[i] != sequences[j] {
                break;
            }
            if !coords[i].same_tile(&coords[j]) || !coords[i].same_lane(&coords[j]) {
                continue;
            }
            if coords[i].distance_sq(&coords[j]) < i128::from(threshold) {
                if qualities[i] >= qualities[j] {
                    is_optical[j] = true;
                } else {
                    is_optical[i] = true;
                }
            }
        }
    }

    is_optical
}

/// Per-record duplicate decisions for one group, in sorted order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateFlags {
    pub is_duplicate: Vec<bool>,
    pub is_optical_duplicate: Vec<bool>,
}

impl DuplicateFlags {
    /// Optical wins over library when both apply
    #[inline]
    pub fn kind(&self, idx: usize) -> DuplicateKind {
        if self.is_optical_duplicate[idx] {
            DuplicateKind::Optical
        } else if self.is_duplicate[idx] {
            DuplicateKind::Library
        } else {
            DuplicateKind::Unique
        }
    }

    pub fn duplicate_count(&self) -> usize {
        self.is_duplicate.iter().filter(|&&d| d).count()
    }

    pub fn optical_count(&self) -> usize {
        self.is_optical_duplicate.iter().filter(|&&d| d).count()
    }
}

/// A group after classification: records in sorted order and their decisions
#[derive(Debug, Clone)]
pub struct ClassifiedGroup {
    pub records: Vec<SamRecord>,
    pub flags: DuplicateFlags,
}

impl ClassifiedGroup {
    /// A lone record, passed through untouched
    pub fn singleton(record: SamRecord) -> Self {
        Self {
            records: vec![record],
            flags: DuplicateFlags { is_duplicate: vec![false], is_optical_duplicate: vec![false] },
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records paired with their classification
    pub fn iter(&self) -> impl Iterator<Item = (&SamRecord, DuplicateKind)> {
        self.records.iter().enumerate().map(|(i, r)| (r, self.flags.kind(i)))
    }
}

/// Classify one position group
///
/// Takes the group by value and returns it sorted, with the duplicate bit set
/// on every library duplicate. Groups of one are returned without parsing
/// read names or scoring qualities.
pub fn classify_group(mut group: Vec<SamRecord>, threshold: i64) -> Result<ClassifiedGroup> {
    if group.len() < 2 {
        return Ok(match group.pop() {
            Some(record) => ClassifiedGroup::singleton(record),
            None => ClassifiedGroup { records: group, flags: DuplicateFlags::default() },
        });
    }

    let mut keyed = group
        .drain(..)
        .map(|r| ReadCoords::from_name(r.name(), r.line_number()).map(|c| (r, c)))
        .collect::<Result<Vec<_>>>()?;

    // Stable sort keeps input order among equal (sequence, tile) keys
    keyed.sort_by(|(ra, ca), (rb, cb)| {
        ra.sequence().cmp(rb.sequence()).then_with(|| ca.tile_num.cmp(&cb.tile_num))
    });
    let (mut records, coords): (Vec<SamRecord>, Vec<ReadCoords>) = keyed.into_iter().unzip();

    let qualities: Vec<i64> = records.iter().map(|r| quality_score(r.quality())).collect();

    let (is_duplicate, is_optical_duplicate) = {
        let sequences: Vec<&BStr> = records.iter().map(|r| r.sequence()).collect();
        let is_duplicate = find_duplicates(&sequences, &qualities);
        let is_optical_duplicate =
            find_optical_duplicates(&sequences, &coords, &qualities, threshold);
        (is_duplicate, is_optical_duplicate)
    };

    for (record, &dup) in records.iter_mut().zip(&is_duplicate) {
        if dup {
            record.mark_duplicate();
        }
    }

    let flags = DuplicateFlags { is_duplicate, is_optical_duplicate };
    debug!(
        "group {}:{} size={} duplicates={} optical={}",
        records[0].reference(),
        records[0].position(),
        records.len(),
        flags.duplicate_count(),
        flags.optical_count()
    );

    Ok(ClassifiedGroup { records, flags })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarkdupError;
    use bstr::ByteSlice;

    /// Build a record at chr1:100 with the given coordinates, sequence and quality
    fn make_read(lane: u32, tile: &str, x: i64, y: i64, seq: &str, qual: &str, line: u64) -> SamRecord {
        let text = format!(
            "M:1:{lane}:{tile}:{x}:{y}\t0\tchr1\t100\t60\t{len}M\t*\t0\t0\t{seq}\t{qual}",
            len = seq.len()
        );
        SamRecord::parse(text.as_bytes(), line).unwrap()
    }

    fn seqs(v: &[&'static str]) -> Vec<&'static BStr> {
        v.iter().map(|&s| s.as_bytes().as_bstr()).collect()
    }

    fn coord(lane: u32, tile: &str, x: i64, y: i64) -> ReadCoords {
        ReadCoords::from_name(format!("M:1:{lane}:{tile}:{x}:{y}").as_bytes(), 1).unwrap()
    }

    /// Quality string whose score is exactly `score` (each 'J' is worth 10)
    fn qual_of(score: usize) -> String {
        assert_eq!(score % 10, 0);
        "J".repeat(score / 10)
    }

    #[test]
    fn test_quality_score() {
        assert_eq!(quality_score(b""), 0);
        assert_eq!(quality_score(b"@"), 0);
        assert_eq!(quality_score(b"JJ"), 20);
        assert_eq!(quality_score(b"h"), 40);
        // Phred+33 characters below '@' are not rejected
        assert_eq!(quality_score(b"!"), 33 - 64);
        assert_eq!(quality_score(b"IIII"), quality_score(b"IIII"));
    }

    #[test]
    fn test_optical_threshold() {
        assert_eq!(optical_threshold(0), 1_000_000);
        assert_eq!(optical_threshold(100), 4_000_000);
        assert!(optical_threshold(1) > 50);
    }

    #[test]
    fn test_find_duplicates_keeps_best() {
        let s = seqs(&["AAAA", "AAAA", "AAAA"]);
        let is_dup = find_duplicates(&s, &[10, 30, 20]);
        assert_eq!(is_dup, vec![true, false, true]);
    }

    #[test]
    fn test_find_duplicates_tie_keeps_first() {
        let s = seqs(&["AAAA", "AAAA", "AAAA"]);
        let is_dup = find_duplicates(&s, &[25, 25, 25]);
        assert_eq!(is_dup, vec![false, true, true]);
    }

    #[test]
    fn test_find_duplicates_tie_after_better_read() {
        // The first max-quality read survives, a later equal one does not
        let s = seqs(&["AAAA", "AAAA", "AAAA"]);
        let is_dup = find_duplicates(&s, &[10, 40, 40]);
        assert_eq!(is_dup, vec![true, false, true]);
    }

    #[test]
    fn test_find_duplicates_separate_clusters() {
        let s = seqs(&["AAAA", "AAAA", "CCCC", "GGGG", "GGGG"]);
        let is_dup = find_duplicates(&s, &[1, 2, 3, 5, 4]);
        assert_eq!(is_dup, vec![true, false, false, false, true]);
    }

    #[test]
    fn test_find_duplicates_one_survivor_per_cluster() {
        let s = seqs(&["A", "A", "A", "A", "C", "C"]);
        let q = [3, 7, 7, 1, 9, 9];
        let is_dup = find_duplicates(&s, &q);
        let survivors_a: Vec<_> = (0..4).filter(|&i| !is_dup[i]).collect();
        let survivors_c: Vec<_> = (4..6).filter(|&i| !is_dup[i]).collect();
        assert_eq!(survivors_a, vec![1]);
        assert_eq!(survivors_c, vec![4]);
    }

    #[test]
    fn test_find_optical_close_pair() {
        let s = seqs(&["AAAA", "AAAA"]);
        let c = vec![coord(1, "5", 0, 0), coord(1, "5", 5, 5)];
        let is_optical = find_optical_duplicates(&s, &c, &[50, 40], optical_threshold(1));
        assert_eq!(is_optical, vec![false, true]);
    }

    #[test]
    fn test_find_optical_lower_quality_first() {
        let s = seqs(&["AAAA", "AAAA"]);
        let c = vec![coord(1, "5", 0, 0), coord(1, "5", 5, 5)];
        let is_optical = find_optical_duplicates(&s, &c, &[10, 40], optical_threshold(1));
        assert_eq!(is_optical, vec![true, false]);
    }

    #[test]
    fn test_find_optical_far_pair() {
        let s = seqs(&["AAAA", "AAAA"]);
        let c = vec![coord(1, "5", 0, 0), coord(1, "5", 3000, 0)];
        let is_optical = find_optical_duplicates(&s, &c, &[50, 40], optical_threshold(0));
        assert_eq!(is_optical, vec![false, false]);
    }

    #[test]
    fn test_find_optical_huge_coordinates_not_close() {
        let s = seqs(&["AAAA", "AAAA"]);
        let c = vec![coord(1, "5", 4_000_000_000, 0), coord(1, "5", -4_000_000_000, 0)];
        let is_optical = find_optical_duplicates(&s, &c, &[50, 40], optical_threshold(1));
        assert_eq!(is_optical, vec![false, false]);
    }

    #[test]
    fn test_find_optical_lane_mismatch_skipped() {
        let s = seqs(&["AAAA", "AAAA"]);
        let c = vec![coord(1, "5", 0, 0), coord(2, "5", 0, 0)];
        let is_optical = find_optical_duplicates(&s, &c, &[50, 40], optical_threshold(1));
        assert_eq!(is_optical, vec![false, false]);
    }

    #[test]
    fn test_find_optical_tile_mismatch_skips_not_breaks() {
        // "05" sorts with "5" numerically but is a different tile token; the
        // pair (0, 1) is skipped and the scan still reaches index 2
        let s = seqs(&["AAAA", "AAAA", "AAAA"]);
        let c = vec![coord(1, "5", 0, 0), coord(1, "05", 0, 0), coord(1, "5", 1, 1)];
        let is_optical = find_optical_duplicates(&s, &c, &[50, 40, 30], optical_threshold(1));
        assert_eq!(is_optical, vec![false, false, true]);
    }

    #[test]
    fn test_find_optical_sequence_change_breaks() {
        let s = seqs(&["AAAA", "CCCC", "AAAA"]);
        let c = vec![coord(1, "5", 0, 0), coord(1, "5", 0, 0), coord(1, "5", 0, 0)];
        let is_optical = find_optical_duplicates(&s, &c, &[50, 40, 30], optical_threshold(1));
        assert_eq!(is_optical, vec![false, false, false]);
    }

    #[test]
    fn test_classify_group_library_duplicate() {
        let group = vec![
            make_read(1, "1", 0, 0, "ACGT", &qual_of(40), 1),
            make_read(1, "2", 9000, 9000, "ACGT", &qual_of(50), 2),
        ];
        let classified = classify_group(group, optical_threshold(1)).unwrap();
        // sorted by tile: line 1 (tile 1) first
        assert_eq!(classified.records[0].line_number(), 1);
        assert_eq!(classified.flags.kind(0), DuplicateKind::Library);
        assert_eq!(classified.flags.kind(1), DuplicateKind::Unique);
        assert!(classified.records[0].flags().is_duplicate());
        assert!(!classified.records[1].flags().is_duplicate());
    }

    #[test]
    fn test_classify_group_optical_duplicate() {
        let group = vec![
            make_read(1, "7", 0, 0, "ACGT", &qual_of(50), 1),
            make_read(1, "7", 5, 5, "ACGT", &qual_of(40), 2),
        ];
        let classified = classify_group(group, optical_threshold(1)).unwrap();
        assert_eq!(classified.flags.kind(0), DuplicateKind::Unique);
        assert_eq!(classified.flags.kind(1), DuplicateKind::Optical);
        // optical duplicates are also library duplicates underneath
        assert!(classified.flags.is_duplicate[1]);
        assert!(classified.records[1].flags().is_duplicate());
    }

    #[test]
    fn test_classify_group_sorts_by_sequence_then_tile() {
        let group = vec![
            make_read(1, "9", 0, 0, "TTTT", "JJJJ", 1),
            make_read(1, "3", 0, 0, "AAAA", "JJJJ", 2),
            make_read(1, "20", 0, 0, "AAAA", "JJJJ", 3),
            make_read(1, "4", 0, 0, "AAAA", "JJJJ", 4),
        ];
        let classified = classify_group(group, optical_threshold(1)).unwrap();
        let lines: Vec<u64> = classified.records.iter().map(|r| r.line_number()).collect();
        assert_eq!(lines, vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_classify_group_different_sequences_untouched() {
        let group = vec![
            make_read(1, "1", 0, 0, "AAAA", "JJJJ", 1),
            make_read(1, "1", 0, 0, "CCCC", "JJJJ", 2),
        ];
        let classified = classify_group(group, optical_threshold(1)).unwrap();
        assert!(classified.iter().all(|(_, kind)| kind == DuplicateKind::Unique));
        assert!(classified.records.iter().all(|r| !r.flags().is_duplicate()));
    }

    #[test]
    fn test_classify_group_optical_subset_of_duplicates() {
        let group = vec![
            make_read(1, "1", 0, 0, "AAAA", "JJJJ", 1),
            make_read(1, "1", 3, 4, "AAAA", "JJJ", 2),
            make_read(2, "1", 0, 0, "AAAA", "JJ", 3),
            make_read(1, "1", 0, 0, "CCCC", "JJJJ", 4),
            make_read(1, "1", 1, 1, "CCCC", "J", 5),
        ];
        let classified = classify_group(group, optical_threshold(1)).unwrap();
        for i in 0..classified.len() {
            if classified.flags.is_optical_duplicate[i] {
                assert!(classified.flags.is_duplicate[i]);
            }
        }
        assert_eq!(classified.flags.optical_count(), 2);
        assert_eq!(classified.flags.duplicate_count(), 3);
    }

    #[test]
    fn test_classify_group_singleton_skips_name_parsing() {
        // a name without coordinates is fine when there is nothing to compare
        let record = SamRecord::parse(b"plain\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII", 1).unwrap();
        let classified = classify_group(vec![record], optical_threshold(1)).unwrap();
        assert_eq!(classified.len(), 1);
        assert_eq!(classified.flags.kind(0), DuplicateKind::Unique);
    }

    #[test]
    fn test_classify_group_bad_name_is_fatal() {
        let a = SamRecord::parse(b"plain\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII", 6).unwrap();
        let b = SamRecord::parse(b"M:1:1:1:0:0\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII", 7).unwrap();
        let err = classify_group(vec![a, b], optical_threshold(1)).unwrap_err();
        assert!(matches!(err, MarkdupError::MalformedIdentifier { line: 6, .. }));
    }

    #[test]
    fn test_singleton_constructor() {
        let record = SamRecord::parse(b"r\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII", 1).unwrap();
        let classified = ClassifiedGroup::singleton(record);
        assert!(!classified.is_empty());
        assert_eq!(classified.flags.kind(0), DuplicateKind::Unique);
    }
}
