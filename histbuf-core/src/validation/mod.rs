//! Format validation utilities
//!
//! This module contains pure validation functions with no I/O dependencies.
//! All functions are computations on shapes, index arrays and slices.

pub mod bounds;
pub mod format;
pub mod parsing;

pub use bounds::{byte_length, dimension, element_count, is_aligned, shape_product};
pub use format::{
    all_finite, first_duplicate, is_strictly_increasing, offsets_span, real_key, validate_keys,
    validate_offsets,
};
pub use parsing::{Slice, SliceIndices};
