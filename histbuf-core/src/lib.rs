#![no_std]

//! histbuf core - container format definitions
//!
//! This crate provides the pure parts of the histbuf format: registries of
//! named constants, the error taxonomy, container framing, slice and index
//! validation, and (behind the `serde` feature) the payload record schema.

extern crate alloc;

pub mod error;
pub mod format;
pub mod traits;
pub mod validation;
#[cfg(feature = "serde")]
pub mod wire;

pub use error::*;
pub use format::*;
pub use traits::*;
pub use validation::{Slice, SliceIndices};
