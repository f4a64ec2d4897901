//! Post-decode slices
//!
//! A buffer may declare a slice that is applied after its filters have run.
//! Slices follow the usual `start:stop:step` conventions: bounds may be
//! negative (counted from the end), are clamped to the sequence, and a
//! missing step means 1. A zero step is never valid.

use core::str::FromStr;

use crate::error::{HistError, Result};

/// A `start:stop:step` selection over a decoded sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

/// Concrete bounds of a slice over a sequence of known length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
    /// Number of selected positions
    pub len: usize,
}

impl Slice {
    pub const fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// Select `start..stop` with unit step
    pub const fn range(start: i64, stop: i64) -> Self {
        Self::new(Some(start), Some(stop), None)
    }

    /// Reject a zero step
    pub fn check(&self) -> Result<()> {
        if self.step == Some(0) {
            return Err(HistError::structure("slice step cannot be zero"));
        }
        Ok(())
    }

    /// Resolve the slice against a sequence of `len` items
    pub fn indices(&self, len: usize) -> Result<SliceIndices> {
        self.check()?;
        let length = i64::try_from(len)
            .map_err(|_| HistError::structure("sequence is too long to slice"))?;
        let step = self.step.unwrap_or(1);

        let (lower, upper) = if step < 0 { (-1, length - 1) } else { (0, length) };
        let clamp = |bound: Option<i64>, default: i64| match bound {
            None => default,
            Some(b) if b < 0 => (b + length).max(lower),
            Some(b) => b.min(upper),
        };
        let start = clamp(self.start, if step < 0 { upper } else { lower });
        let stop = clamp(self.stop, if step < 0 { lower } else { upper });

        let count = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && stop < start {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };

        Ok(SliceIndices {
            start,
            stop,
            step,
            len: count as usize,
        })
    }

    /// Number of items selected from a sequence of `len` items
    pub fn len(&self, len: usize) -> Result<usize> {
        Ok(self.indices(len)?.len)
    }

    /// True if the slice selects everything in order
    pub fn is_identity(&self, len: usize) -> Result<bool> {
        let idx = self.indices(len)?;
        Ok(idx.step == 1 && idx.start == 0 && idx.len == len)
    }
}

impl SliceIndices {
    /// Selected positions, in selection order
    pub fn positions(&self) -> impl Iterator<Item = usize> {
        let SliceIndices { start, step, len, .. } = *self;
        (0..len).map(move |i| (start + i as i64 * step) as usize)
    }
}

impl core::fmt::Display for Slice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        write!(f, ":")?;
        if let Some(stop) = self.stop {
            write!(f, "{stop}")?;
        }
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        Ok(())
    }
}

/// Parse one optional bound of a slice string
fn parse_bound(text: &str, field: &'static str) -> Result<Option<i64>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<i64>()
        .map(Some)
        .map_err(|_| HistError::constraint("Slice", field, alloc::format!("{text:?} is not an integer")))
}

impl FromStr for Slice {
    type Err = HistError;

    /// Parse `start:stop` or `start:stop:step`; any part may be empty
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let start = parts.next().unwrap_or("");
        let Some(stop) = parts.next() else {
            return Err(HistError::constraint(
                "Slice",
                "stop",
                alloc::format!("{s:?} has no ':' separator"),
            ));
        };
        let step = parts.next();
        if parts.next().is_some() {
            return Err(HistError::constraint(
                "Slice",
                "step",
                alloc::format!("{s:?} has too many ':' separators"),
            ));
        }

        Ok(Slice {
            start: parse_bound(start, "start")?,
            stop: parse_bound(stop, "stop")?,
            step: match step {
                Some(step) => parse_bound(step, "step")?,
                None => None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    fn picks(slice: Slice, len: usize) -> Vec<usize> {
        slice.indices(len).unwrap().positions().collect()
    }

    #[test]
    fn test_indices_forward() {
        assert_eq!(picks(Slice::default(), 4), [0, 1, 2, 3]);
        assert_eq!(picks(Slice::range(1, 3), 5), [1, 2]);
        assert_eq!(picks(Slice::new(None, None, Some(2)), 5), [0, 2, 4]);
        assert_eq!(picks(Slice::new(Some(-2), None, None), 5), [3, 4]);
        assert_eq!(picks(Slice::range(3, 100), 5), [3, 4]);
        assert_eq!(picks(Slice::range(4, 2), 5), Vec::<usize>::new());
    }

    #[test]
    fn test_indices_backward() {
        assert_eq!(picks(Slice::new(None, None, Some(-1)), 4), [3, 2, 1, 0]);
        assert_eq!(picks(Slice::new(Some(3), Some(0), Some(-2)), 5), [3, 1]);
        assert_eq!(picks(Slice::new(Some(-100), None, Some(-1)), 5), Vec::<usize>::new());
    }

    #[test]
    fn test_zero_step() {
        let err = Slice::new(None, None, Some(0)).indices(4).unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Structure);
        assert!(Slice::new(None, None, Some(0)).check().is_err());
    }

    #[test]
    fn test_len_and_identity() {
        assert_eq!(Slice::range(2, 7).len(10), Ok(5));
        assert_eq!(Slice::default().is_identity(3), Ok(true));
        assert_eq!(Slice::range(1, 3).is_identity(3), Ok(false));
    }

    #[test]
    fn test_parse() {
        assert_eq!("1:5".parse::<Slice>(), Ok(Slice::range(1, 5)));
        assert_eq!(
            "::2".parse::<Slice>(),
            Ok(Slice::new(None, None, Some(2)))
        );
        assert_eq!(
            "-3::-1".parse::<Slice>(),
            Ok(Slice::new(Some(-3), None, Some(-1)))
        );
        assert_eq!(":".parse::<Slice>(), Ok(Slice::default()));

        // Invalid cases
        assert!("5".parse::<Slice>().is_err());
        assert!("a:b".parse::<Slice>().is_err());
        assert!("1:2:3:4".parse::<Slice>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Slice::new(Some(1), None, Some(-1)).to_string(), "1::-1");
        assert_eq!(Slice::range(0, 4).to_string(), "0:4");
    }
}
