//! Flow-cell coordinates carried in Illumina-style read names
//!
//! Read names are split on `:`; tokens 2, 3, 4 and 5 hold the lane, tile,
//! x pixel and y pixel of the cluster. Only reads that share a position
//! with another read ever have their coordinates parsed.

use bstr::{BString, ByteSlice};

use crate::error::{MarkdupError, Result};

const LANE_TOKEN: usize = 2;
const TILE_TOKEN: usize = 3;
const X_TOKEN: usize = 4;
const Y_TOKEN: usize = 5;

/// Location of a cluster on the flow cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCoords {
    /// Lane token, compared as text
    pub lane: BString,
    /// Tile token, compared as text
    pub tile: BString,
    /// Tile token parsed as an integer, used for sort order
    pub tile_num: i64,
    pub x: i64,
    pub y: i64,
}

impl ReadCoords {
    /// Parse coordinates out of a read name
    ///
    /// `line` is only used for error reporting.
    pub fn from_name(name: &[u8], line: u64) -> Result<Self> {
        let tokens: Vec<&[u8]> = name.split_str(":").collect();
        if tokens.len() <= Y_TOKEN {
            return Err(MarkdupError::MalformedIdentifier {
                line,
                name: name.to_str_lossy().into_owned(),
                reason: format!(
                    "expected at least {} ':'-separated tokens, found {}",
                    Y_TOKEN + 1,
                    tokens.len()
                ),
            });
        }

        let int = |idx: usize, what: &str| -> Result<i64> {
            parse_int(tokens[idx]).ok_or_else(|| MarkdupError::MalformedIdentifier {
                line,
                name: name.to_str_lossy().into_owned(),
                reason: format!("{} '{}' is not an integer", what, tokens[idx].as_bstr()),
            })
        };

        Ok(Self {
            lane: BString::from(tokens[LANE_TOKEN]),
            tile: BString::from(tokens[TILE_TOKEN]),
            tile_num: int(TILE_TOKEN, "tile")?,
            x: int(X_TOKEN, "x coordinate")?,
            y: int(Y_TOKEN, "y coordinate")?,
        })
    }

    /// Squared pixel distance between two clusters
    ///
    /// Widened so that any pair of `i64` coordinates squares without overflow.
    #[inline]
    pub fn distance_sq(&self, other: &ReadCoords) -> i128 {
        let dx = i128::from(self.x) - i128::from(other.x);
        let dy = i128::from(self.y) - i128::from(other.y);
        dx * dx + dy * dy
    }

    #[inline]
    pub fn same_tile(&self, other: &ReadCoords) -> bool {
        self.tile == other.tile
    }

    #[inline]
    pub fn same_lane(&self, other: &ReadCoords) -> bool {
        self.lane == other.lane
    }
}

/// Parse a signed decimal integer from ASCII bytes
pub(crate) fn parse_int(bytes: &[u8]) -> Option<i64> {
    bytes.to_str().ok()?.parse().ok()
}
