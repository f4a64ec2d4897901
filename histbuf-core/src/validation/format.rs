//! Structural checks on index arrays and keyed lists
//!
//! This module provides pure validation functions with no I/O
//! dependencies. Failures are reported as structural errors naming the
//! offending field.

use core::hash::Hash;

use crate::error::{HistError, Result};

/// Validate a zero-started, non-decreasing offset index
///
/// Offset arrays partition a sequence of entries: entry range `i` spans
/// `offsets[i]..offsets[i + 1]`. The first offset must be zero and no range
/// may run backwards. Empty ranges are allowed.
pub fn validate_offsets(what: &str, offsets: &[u64]) -> Result<()> {
    let Some(&first) = offsets.first() else {
        return Err(HistError::structure(alloc::format!("{what} must not be empty")));
    };
    if first != 0 {
        return Err(HistError::structure(alloc::format!(
            "{what} must start with 0, not {first}"
        )));
    }
    if let Some(i) = offsets.windows(2).position(|w| w[1] < w[0]) {
        return Err(HistError::structure(alloc::format!(
            "{what} must be monotonically increasing; {} follows {} at position {}",
            offsets[i + 1],
            offsets[i],
            i + 1
        )));
    }
    Ok(())
}

/// Number of entries covered by a valid offset index
pub fn offsets_span(offsets: &[u64]) -> u64 {
    offsets.last().copied().unwrap_or(0)
}

/// True if every value exceeds its predecessor (NaN never does)
pub fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] > w[0])
}

/// True if no value is infinite or NaN
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|x| x.is_finite())
}

/// First item that occurs more than once
pub fn first_duplicate<T, I>(items: I) -> Option<T>
where
    T: Hash + Eq + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = hashbrown::HashSet::new();
    items.into_iter().find(|item| !seen.insert(item.clone()))
}

/// Validate that identifiers in a keyed list are non-empty and unique
pub fn validate_keys<'a, I>(what: &str, keys: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = hashbrown::HashSet::new();
    for key in keys {
        if key.is_empty() {
            return Err(HistError::structure(alloc::format!(
                "{what} identifiers must not be empty"
            )));
        }
        if !seen.insert(key) {
            return Err(HistError::structure(alloc::format!(
                "{what} keys must be unique; {key:?} appears more than once"
            )));
        }
    }
    Ok(())
}

/// Bit pattern used to compare reals for uniqueness, with -0.0 folded into 0.0
pub fn real_key(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    #[test]
    fn test_validate_offsets() {
        assert_eq!(validate_offsets("page_offsets", &[0, 5, 5, 12]), Ok(()));
        assert_eq!(validate_offsets("page_offsets", &[0]), Ok(()));

        // doesn't start at 0
        let err = validate_offsets("page_offsets", &[1, 5, 12]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Structure);

        // not monotonic
        assert!(validate_offsets("page_offsets", &[0, 5, 3]).is_err());
        assert!(validate_offsets("chunk_offsets", &[]).is_err());
    }

    #[test]
    fn test_offsets_span() {
        assert_eq!(offsets_span(&[0, 5, 12]), 12);
        assert_eq!(offsets_span(&[]), 0);
    }

    #[test]
    fn test_strictly_increasing() {
        assert!(is_strictly_increasing(&[0.0, 1.0, 3.0]));
        assert!(is_strictly_increasing(&[0.0]));
        assert!(!is_strictly_increasing(&[0.0, 1.0, 1.0, 2.0]));
        assert!(!is_strictly_increasing(&[0.0, f64::NAN]));
        assert!(all_finite(&[0.0, -1.0]));
        assert!(!all_finite(&[0.0, f64::INFINITY]));
    }

    #[test]
    fn test_duplicates() {
        assert_eq!(first_duplicate([1, 2, 3]), None);
        assert_eq!(first_duplicate([1, 2, 1]), Some(1));
        assert_eq!(real_key(-0.0), real_key(0.0));
        assert_eq!(validate_keys("objects", ["a", "b"]), Ok(()));
        assert!(validate_keys("objects", ["a", "a"]).is_err());
        assert!(validate_keys("objects", [""]).is_err());
    }
}
