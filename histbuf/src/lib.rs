//! histbuf - validated object model for histograms, ntuples and functions
//!
//! This library builds, validates, encodes and decodes hierarchies of
//! binned data rooted at a [`Collection`].
//!
//! ## Architecture
//!
//! histbuf separates format definitions from their implementation:
//!
//! - **histbuf-core**: enum registries, error taxonomy, container framing,
//!   slice arithmetic and the payload record schema (no I/O)
//! - **histbuf**: the node graph, shape validation, filters, array views
//!   and the container codec
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use histbuf::{
//!     Axis, Collection, Distribution, Histogram, InterpretedInlineBuffer, RealInterval,
//!     RegularBinning, UnweightedCounts,
//! };
//!
//! fn example() -> histbuf::Result<()> {
//!     // ten regular bins plus underflow and overflow
//!     let binning = RegularBinning::new(10, RealInterval::new(-5.0, 5.0)?)?;
//!     let axis = Axis::new().with_binning(binning)?.with_expression("x");
//!     let counts = InterpretedInlineBuffer::from_values(&[0u32; 12]);
//!     let distribution = Distribution::new(UnweightedCounts::new(counts)?)?;
//!     let histogram = Histogram::new("h", vec![axis], distribution)?;
//!
//!     let collection = Collection::new("analysis", vec![histogram.into()])?;
//!     collection.to_file("analysis.hist")?;
//!
//!     let back = Collection::from_file("analysis.hist")?;
//!     back.check_valid()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **mmap**: memory-map containers when reading files
//! - **gzip**, **lz4**, **lzma**: buffer filters; without them the filter
//!   is still recognized but decoding it is a configuration error

// Re-export core abstractions and format definitions
pub use histbuf_core::{
    // Registries
    DType, DecorationLanguage, DimensionOrder, Endianness, ExternalSource, Filter,
    FractionalErrorMethod, HexagonalCoordinates, MetadataLanguage, NonRealMapping,
    // Error taxonomy
    ErrorCategory, HistError,
    // Element types and slices
    Element, Slice, SliceIndices,
};

#[macro_use]
mod node;
#[macro_use]
mod metadata;

mod attribute;
mod binning;
mod buffer;
mod codec;
mod collection;
mod config;
mod container;
mod error;
mod filter;
mod function;
mod histogram;
mod ntuple;
mod stats;
mod validate;
mod view;

pub use binning::{
    Binning, CategoryBinning, EdgesBinning, FractionalBinning, HexagonalBinning, IntegerBinning,
    IrregularBinning, RealInterval, RealOverflow, RegularBinning, SparseRegularBinning,
    TicTacToeOverflowBinning,
};
pub use buffer::{
    Buffer, InterpretedBuffer, InterpretedExternalBuffer, InterpretedInlineBuffer, Locality,
    RawBuffer, RawExternalBuffer, RawInlineBuffer, StorageKind,
};
pub use collection::{Assignment, BinnedRegion, Collection, Object, Region, Variation};
pub use config::CodecConfig;
pub use error::{Error, Result};
pub use function::{
    BinnedEvaluatedFunction, EvaluatedFunction, Function, FunctionObject, Parameter,
    ParameterizedFunction,
};
pub use histogram::{Axis, Histogram, Profile};
pub use metadata::{Decoration, Metadata};
pub use node::Node;
pub use ntuple::{Chunk, Column, ColumnChunk, Ntuple, Page};
pub use stats::{
    Correlation, Counts, Distribution, DistributionStats, Extremes, GenericErrors, Moments,
    Quantiles, UnweightedCounts, WeightedCounts,
};
pub use validate::{Shape, Validate};
pub use view::ArrayView;
