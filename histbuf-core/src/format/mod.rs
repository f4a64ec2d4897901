//! Format definitions for the histbuf container
//!
//! Pure definitions only: registries, framing constants and the frame
//! parser. Nothing here performs I/O.

pub mod constants;
pub mod enums;
pub mod frame;

pub use constants::{FOOTER_SIZE, FRAMING_OVERHEAD, MAGIC, MAGIC_SIZE, OFFSET_SIZE};
pub use enums::{
    DType, DecorationLanguage, DimensionOrder, Endianness, ExternalSource, Filter,
    FractionalErrorMethod, HexagonalCoordinates, MetadataLanguage, NonRealMapping,
};
pub use frame::{footer, payload, payload_range};
