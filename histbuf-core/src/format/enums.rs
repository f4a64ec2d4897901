//! Closed registries of named constants
//!
//! Every classification axis of the format (dtype, byte order, filter kind,
//! ...) is a fieldless enum with a stable wire code and a stable name. Names
//! are what users type; codes are what the payload carries. Looking up a name
//! outside the registry is a [`HistError::Configuration`].

use crate::error::{HistError, Result};

macro_rules! registry {
    (
        $(#[$meta:meta])*
        $label:literal => $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code,)+
        }

        impl $name {
            /// Every member, in wire-code order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Every member name, in wire-code order
            pub const NAMES: &'static [&'static str] = &[$($text,)+];

            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn from_name(name: &str) -> Result<Self> {
                match name {
                    $($text => Ok($name::$variant),)+
                    _ => Err(HistError::configuration(alloc::format!(
                        "{:?} is not a {}; expected one of {:?}",
                        name,
                        $label,
                        Self::NAMES
                    ))),
                }
            }

            pub const fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub const fn to_u8(self) -> u8 {
                self as u8
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.name())
            }
        }

        impl core::str::FromStr for $name {
            type Err = HistError;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_name(s)
            }
        }
    };
}

registry! {
    /// Element type of an interpreted buffer
    "dtype" => DType {
        /// Uninterpreted bytes, viewed as `uint8`
        None = 0 => "none",
        Int8 = 1 => "int8",
        Uint8 = 2 => "uint8",
        Int16 = 3 => "int16",
        Uint16 = 4 => "uint16",
        Int32 = 5 => "int32",
        Uint32 = 6 => "uint32",
        Int64 = 7 => "int64",
        Uint64 = 8 => "uint64",
        Float32 = 9 => "float32",
        Float64 = 10 => "float64",
    }
}

registry! {
    /// Byte order of multi-byte elements
    "endianness" => Endianness {
        Little = 0 => "little_endian",
        Big = 1 => "big_endian",
    }
}

registry! {
    /// Memory layout of a multi-dimensional buffer
    "dimension order" => DimensionOrder {
        /// Row-major, last index varies fastest
        C = 0 => "c_order",
        /// Column-major, first index varies fastest
        Fortran = 1 => "fortran",
    }
}

registry! {
    /// Decoding step applied to buffer bytes before interpretation
    "filter" => Filter {
        None = 0 => "none",
        Gzip = 1 => "gzip",
        Lzma = 2 => "lzma",
        Lz4 = 3 => "lz4",
    }
}

registry! {
    /// Where the bytes of an external buffer live
    "external buffer source" => ExternalSource {
        Memory = 0 => "memory",
        Samefile = 1 => "samefile",
        File = 2 => "file",
        Url = 3 => "url",
    }
}

registry! {
    "fractional error method" => FractionalErrorMethod {
        Normal = 0 => "normal",
        ClopperPearson = 1 => "clopper_pearson",
        Wilson = 2 => "wilson",
        AgrestiCoull = 3 => "agresti_coull",
        FeldmanCousins = 4 => "feldman_cousins",
        Jeffrey = 5 => "jeffrey",
        BayesianUniform = 6 => "bayesian_uniform",
    }
}

registry! {
    /// Slot that receives -inf, +inf or NaN inputs
    "non-real mapping" => NonRealMapping {
        Missing = 0 => "missing",
        InUnderflow = 1 => "in_underflow",
        InOverflow = 2 => "in_overflow",
        InNanflow = 3 => "in_nanflow",
    }
}

registry! {
    "hexagonal coordinate system" => HexagonalCoordinates {
        Offset = 0 => "offset",
        DoubledOffset = 1 => "doubled_offset",
        CubeXy = 2 => "cube_xy",
        CubeYz = 3 => "cube_yz",
        CubeXz = 4 => "cube_xz",
    }
}

registry! {
    "metadata language" => MetadataLanguage {
        Unspecified = 0 => "unspecified",
        Json = 1 => "json",
    }
}

registry! {
    "decoration language" => DecorationLanguage {
        Unspecified = 0 => "unspecified",
        Css = 1 => "css",
        Vega = 2 => "vega",
        RootJson = 3 => "root_json",
    }
}

impl DType {
    /// Size in bytes of one element
    pub const fn itemsize(self) -> usize {
        match self {
            DType::None | DType::Int8 | DType::Uint8 => 1,
            DType::Int16 | DType::Uint16 => 2,
            DType::Int32 | DType::Uint32 | DType::Float32 => 4,
            DType::Int64 | DType::Uint64 | DType::Float64 => 8,
        }
    }

    /// The dtype elements are actually read as; `none` reads as `uint8`
    pub const fn effective(self) -> DType {
        match self {
            DType::None => DType::Uint8,
            other => other,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64 | DType::Float32 | DType::Float64
        )
    }
}

impl Default for DType {
    fn default() -> Self {
        DType::None
    }
}

impl Endianness {
    /// Byte order of the running machine
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    pub const fn is_native(self) -> bool {
        self as u8 == Self::native() as u8
    }

    /// Conventional one-character byte-order marker
    pub const fn marker(self) -> char {
        match self {
            Endianness::Little => '<',
            Endianness::Big => '>',
        }
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Endianness::Little
    }
}

impl DimensionOrder {
    /// Single-letter layout tag, `C` or `F`
    pub const fn tag(self) -> char {
        match self {
            DimensionOrder::C => 'C',
            DimensionOrder::Fortran => 'F',
        }
    }
}

impl Default for DimensionOrder {
    fn default() -> Self {
        DimensionOrder::C
    }
}

impl Default for ExternalSource {
    fn default() -> Self {
        ExternalSource::Memory
    }
}

impl Default for FractionalErrorMethod {
    fn default() -> Self {
        FractionalErrorMethod::Normal
    }
}

impl Default for HexagonalCoordinates {
    fn default() -> Self {
        HexagonalCoordinates::Offset
    }
}

impl Default for MetadataLanguage {
    fn default() -> Self {
        MetadataLanguage::Unspecified
    }
}

impl Default for DecorationLanguage {
    fn default() -> Self {
        DecorationLanguage::Unspecified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    #[test]
    fn test_names_round_trip() {
        for dtype in DType::ALL {
            assert_eq!(DType::from_name(dtype.name()), Ok(*dtype));
            assert_eq!(DType::from_u8(dtype.to_u8()), Some(*dtype));
        }
        for filter in Filter::ALL {
            assert_eq!(Filter::from_str(filter.name()), Ok(*filter));
        }
        assert_eq!(Filter::NAMES, &["none", "gzip", "lzma", "lz4"]);
    }

    #[test]
    fn test_unknown_name_is_configuration_error() {
        let err = DType::from_name("float128").unwrap_err();
        assert_eq!(err.category(), crate::ErrorCategory::Configuration);
        assert!(ExternalSource::from_name("ftp").is_err());
        assert_eq!(NonRealMapping::from_u8(9), None);
    }

    #[test]
    fn test_dtype_itemsize() {
        assert_eq!(DType::None.itemsize(), 1);
        assert_eq!(DType::None.effective(), DType::Uint8);
        assert_eq!(DType::Uint16.itemsize(), 2);
        assert_eq!(DType::Float32.itemsize(), 4);
        assert_eq!(DType::Int64.itemsize(), 8);
        assert!(DType::Float64.is_float());
        assert!(!DType::Uint32.is_signed());
    }

    #[test]
    fn test_derived_data() {
        assert_eq!(DimensionOrder::C.tag(), 'C');
        assert_eq!(DimensionOrder::Fortran.tag(), 'F');
        assert_eq!(DimensionOrder::Fortran.name(), "fortran");
        assert_eq!(Endianness::Big.marker(), '>');
        assert!(Endianness::native().is_native());
        assert_eq!(HexagonalCoordinates::CubeXz.name(), "cube_xz");
    }
}
