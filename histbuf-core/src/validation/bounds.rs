//! Shape and byte-length arithmetic
//!
//! This module provides pure mathematical validation functions for
//! shape computations with overflow protection.

use crate::error::{HistError, Result};

/// Number of elements described by a shape
///
/// The empty shape describes a single element.
pub fn shape_product(shape: &[usize]) -> Result<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| {
        acc.checked_mul(dim).ok_or_else(|| {
            HistError::structure(alloc::format!("shape {shape:?} overflows the address space"))
        })
    })
}

/// Number of whole elements in a byte range
pub fn element_count(byte_len: usize, itemsize: usize) -> Result<usize> {
    if itemsize == 0 || byte_len % itemsize != 0 {
        return Err(HistError::structure(alloc::format!(
            "{byte_len} bytes is not a whole number of {itemsize}-byte elements"
        )));
    }
    Ok(byte_len / itemsize)
}

/// Byte length of `count` elements of `itemsize` bytes
pub fn byte_length(count: usize, itemsize: usize) -> Result<usize> {
    count.checked_mul(itemsize).ok_or_else(|| {
        HistError::structure(alloc::format!(
            "{count} elements of {itemsize} bytes overflows the address space"
        ))
    })
}

/// Convert a wide integer slot count into a shape dimension
pub fn dimension(value: i128, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        HistError::structure(alloc::format!("{what} yields {value} bins, which is not addressable"))
    })
}

/// Check that a pointer is aligned for `T`
pub fn is_aligned<T>(ptr: *const u8) -> bool {
    (ptr as usize) % core::mem::align_of::<T>() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_product() {
        assert_eq!(shape_product(&[]), Ok(1));
        assert_eq!(shape_product(&[12]), Ok(12));
        assert_eq!(shape_product(&[3, 4, 0]), Ok(0));
        assert!(shape_product(&[usize::MAX, 2]).is_err());
    }

    #[test]
    fn test_element_count() {
        assert_eq!(element_count(16, 4), Ok(4));
        assert_eq!(element_count(0, 8), Ok(0));
        assert!(element_count(15, 4).is_err());
        assert!(element_count(4, 0).is_err());
    }

    #[test]
    fn test_byte_length() {
        assert_eq!(byte_length(20, 8), Ok(160));
        assert!(byte_length(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_dimension() {
        assert_eq!(dimension(12, "RegularBinning"), Ok(12));
        assert!(dimension(-1, "IntegerBinning").is_err());
    }

    #[test]
    fn test_is_aligned() {
        let aligned: [u64; 2] = [0; 2];
        let ptr = aligned.as_ptr() as *const u8;
        assert!(is_aligned::<u64>(ptr));
        assert!(!is_aligned::<u64>(ptr.wrapping_add(1)));
    }
}
