//! MPLS label type with validation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 20-bit MPLS / segment-routing transport label (0-1048575).
///
/// # Examples
///
/// ```
/// use sdwan_types::MplsLabel;
///
/// let label = MplsLabel::new(100).unwrap();
/// assert_eq!(label.as_u32(), 100);
///
/// assert!(MplsLabel::new(1_048_576).is_err());
/// assert!(MplsLabel::try_from(MplsLabel::INVALID).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MplsLabel(u32);

impl MplsLabel {
    /// Minimum valid label.
    pub const MIN: u32 = 0;

    /// Maximum valid label (20-bit label field).
    pub const MAX: u32 = 1_048_575;

    /// Sentinel for "no label assigned yet".
    pub const INVALID: i64 = -1;

    /// Creates a new label.
    ///
    /// # Errors
    ///
    /// Returns an error if the label does not fit in 20 bits.
    pub const fn new(label: u32) -> Result<Self, ParseError> {
        if label <= Self::MAX {
            Ok(MplsLabel(label))
        } else {
            Err(ParseError::InvalidMplsLabel(label as i64))
        }
    }

    /// Returns the label as a u32.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the label widened for use as a flow rule cookie.
    pub const fn as_cookie(&self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for MplsLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MplsLabel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidMplsLabel(MplsLabel::INVALID))?;
        MplsLabel::try_from(raw)
    }
}

impl TryFrom<u32> for MplsLabel {
    type Error = ParseError;

    fn try_from(label: u32) -> Result<Self, Self::Error> {
        MplsLabel::new(label)
    }
}

impl TryFrom<i64> for MplsLabel {
    type Error = ParseError;

    fn try_from(label: i64) -> Result<Self, Self::Error> {
        u32::try_from(label)
            .map_err(|_| ParseError::InvalidMplsLabel(label))
            .and_then(MplsLabel::new)
    }
}

impl From<MplsLabel> for u32 {
    fn from(label: MplsLabel) -> u32 {
        label.0
    }
}
