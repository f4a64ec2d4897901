//! Buffer element type constraints
//!
//! This module defines the trait that ties a Rust scalar to the dtype it is
//! stored as inside an interpreted buffer.

use crate::format::DType;

/// Trait for types that can be read out of an interpreted buffer
///
/// All element types must be plain old data so that a correctly aligned,
/// native-endian byte slice can be reinterpreted without copying.
pub trait Element: bytemuck::Pod + PartialEq + core::fmt::Debug {
    /// The dtype this element is stored as
    const DTYPE: DType;

    /// Size in bytes of this element type
    fn size_bytes() -> usize {
        core::mem::size_of::<Self>()
    }

    /// Reverse the byte order of a value
    fn swap_bytes(self) -> Self {
        let mut value = self;
        bytemuck::bytes_of_mut(&mut value).reverse();
        value
    }

    /// Convert from f64 for generic construction
    fn from_f64(value: f64) -> Self;

    /// Convert to f64 for generic operations
    fn to_f64(self) -> f64;
}

macro_rules! impl_element {
    ($($type:ty => $dtype:ident),+ $(,)?) => {
        $(
            impl Element for $type {
                const DTYPE: DType = DType::$dtype;

                fn from_f64(value: f64) -> Self {
                    value as $type
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )+
    };
}

impl_element! {
    i8 => Int8,
    u8 => Uint8,
    i16 => Int16,
    u16 => Uint16,
    i32 => Int32,
    u32 => Uint32,
    i64 => Int64,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_mapping() {
        assert_eq!(<f64 as Element>::DTYPE, DType::Float64);
        assert_eq!(<u8 as Element>::DTYPE, DType::Uint8);
        assert_eq!(<i16 as Element>::DTYPE.itemsize(), i16::size_bytes());
    }

    #[test]
    fn test_swap_bytes() {
        assert_eq!(Element::swap_bytes(0x0102u16), 0x0201u16);
        assert_eq!(Element::swap_bytes(Element::swap_bytes(1.5f64)), 1.5f64);
        assert_eq!(Element::swap_bytes(7u8), 7u8);
    }

    #[test]
    fn test_f64_conversion() {
        assert_eq!(<i32 as Element>::from_f64(3.0), 3);
        assert_eq!(Element::to_f64(-2i8), -2.0);
    }
}
