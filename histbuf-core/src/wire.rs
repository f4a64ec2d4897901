//! Payload record schema
//!
//! One record type per node kind, mirroring the node's fields. Nested
//! records are reference counted so that a lazily materialized node can hold
//! on to exactly the subtree it will later expand, without copying it.
//! Polymorphic positions (any binning, any buffer, any object) are closed
//! enums over the concrete records.
//!
//! Optional vectors are encoded as empty vectors; optional strings as empty
//! strings.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::format::{
    DType, DecorationLanguage, DimensionOrder, Endianness, ExternalSource, Filter,
    FractionalErrorMethod, HexagonalCoordinates, MetadataLanguage, NonRealMapping,
};
use crate::validation::Slice;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub data: String,
    pub language: MetadataLanguage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecorationRecord {
    pub data: String,
    pub language: DecorationLanguage,
}

// Buffers

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInlineBufferRecord {
    pub buffer: Rc<[u8]>,
    pub filters: Vec<Filter>,
    pub postfilter_slice: Option<Slice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExternalBufferRecord {
    pub pointer: u64,
    pub numbytes: u64,
    pub external_source: ExternalSource,
    pub filters: Vec<Filter>,
    pub postfilter_slice: Option<Slice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretedInlineBufferRecord {
    pub buffer: Rc<[u8]>,
    pub filters: Vec<Filter>,
    pub postfilter_slice: Option<Slice>,
    pub dtype: DType,
    pub endianness: Endianness,
    pub dimension_order: DimensionOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretedExternalBufferRecord {
    pub pointer: u64,
    pub numbytes: u64,
    pub external_source: ExternalSource,
    pub filters: Vec<Filter>,
    pub postfilter_slice: Option<Slice>,
    pub dtype: DType,
    pub endianness: Endianness,
    pub dimension_order: DimensionOrder,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawBufferRecord {
    Inline(Rc<RawInlineBufferRecord>),
    External(Rc<RawExternalBufferRecord>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterpretedBufferRecord {
    Inline(Rc<InterpretedInlineBufferRecord>),
    External(Rc<InterpretedExternalBufferRecord>),
}

// Binnings

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionalBinningRecord {
    pub error_method: FractionalErrorMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegerBinningRecord {
    pub min: i64,
    pub max: i64,
    pub has_underflow: bool,
    pub has_overflow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealIntervalRecord {
    pub low: f64,
    pub high: f64,
    pub low_inclusive: bool,
    pub high_inclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealOverflowRecord {
    pub has_underflow: bool,
    pub has_overflow: bool,
    pub has_nanflow: bool,
    pub minf_mapping: NonRealMapping,
    pub pinf_mapping: NonRealMapping,
    pub nan_mapping: NonRealMapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularBinningRecord {
    pub num: u64,
    pub interval: Rc<RealIntervalRecord>,
    pub overflow: Option<Rc<RealOverflowRecord>>,
    pub circular: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicTacToeOverflowBinningRecord {
    pub xnum: u64,
    pub ynum: u64,
    pub xinterval: Rc<RealIntervalRecord>,
    pub yinterval: Rc<RealIntervalRecord>,
    pub xoverflow: Option<Rc<RealOverflowRecord>>,
    pub yoverflow: Option<Rc<RealOverflowRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexagonalBinningRecord {
    pub qinterval: Rc<IntegerBinningRecord>,
    pub rinterval: Rc<IntegerBinningRecord>,
    pub coordinates: HexagonalCoordinates,
    pub xorigin: f64,
    pub yorigin: f64,
    pub q_has_nanflow: bool,
    pub r_has_nanflow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgesBinningRecord {
    pub edges: Vec<f64>,
    pub overflow: Option<Rc<RealOverflowRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrregularBinningRecord {
    pub intervals: Vec<Rc<RealIntervalRecord>>,
    pub overflow: Option<Rc<RealOverflowRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBinningRecord {
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseRegularBinningRecord {
    pub bins: Vec<i64>,
    pub bin_width: f64,
    pub origin: f64,
    pub has_nanflow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinningRecord {
    Integer(Rc<IntegerBinningRecord>),
    Regular(Rc<RegularBinningRecord>),
    TicTacToeOverflow(Rc<TicTacToeOverflowBinningRecord>),
    Hexagonal(Rc<HexagonalBinningRecord>),
    Edges(Rc<EdgesBinningRecord>),
    Irregular(Rc<IrregularBinningRecord>),
    Category(Rc<CategoryBinningRecord>),
    SparseRegular(Rc<SparseRegularBinningRecord>),
    Fractional(Rc<FractionalBinningRecord>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisRecord {
    pub binning: Option<BinningRecord>,
    pub expression: String,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}

// Counts and statistics

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnweightedCountsRecord {
    pub counts: InterpretedBufferRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedCountsRecord {
    pub sumw: InterpretedBufferRecord,
    pub sumw2: InterpretedBufferRecord,
    pub counts: Option<Rc<UnweightedCountsRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CountsRecord {
    Unweighted(Rc<UnweightedCountsRecord>),
    Weighted(Rc<WeightedCountsRecord>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub sumwx: InterpretedBufferRecord,
    pub sumwxy: InterpretedBufferRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremesRecord {
    pub min: InterpretedBufferRecord,
    pub max: InterpretedBufferRecord,
    pub excludes_minf: bool,
    pub excludes_pinf: bool,
    pub excludes_nan: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentsRecord {
    pub sumwn: InterpretedBufferRecord,
    pub n: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantilesRecord {
    pub values: InterpretedBufferRecord,
    pub p: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericErrorsRecord {
    pub errors: InterpretedBufferRecord,
    pub p: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStatsRecord {
    pub correlation: Option<Rc<CorrelationRecord>>,
    pub extremes: Option<Rc<ExtremesRecord>>,
    pub moments: Vec<Rc<MomentsRecord>>,
    pub quantiles: Vec<Rc<QuantilesRecord>>,
    pub generic_errors: Vec<Rc<GenericErrorsRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub counts: CountsRecord,
    pub stats: Option<Rc<DistributionStatsRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub expression: String,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}

// Functions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub identifier: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterizedFunctionRecord {
    pub identifier: String,
    pub expression: String,
    pub parameters: Vec<Rc<ParameterRecord>>,
    pub contours: Vec<f64>,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedFunctionRecord {
    pub identifier: String,
    pub values: Vec<f64>,
    pub derivatives: Vec<f64>,
    pub generic_errors: Vec<Rc<GenericErrorsRecord>>,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedEvaluatedFunctionRecord {
    pub identifier: String,
    pub axis: Vec<Rc<AxisRecord>>,
    pub values: InterpretedBufferRecord,
    pub derivatives: Option<InterpretedBufferRecord>,
    pub generic_errors: Vec<Rc<GenericErrorsRecord>>,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}

/// Functions attached to a histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionRecord {
    Parameterized(Rc<ParameterizedFunctionRecord>),
    Evaluated(Rc<EvaluatedFunctionRecord>),
}

/// Functions that can stand alone as collection objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionObjectRecord {
    Parameterized(Rc<ParameterizedFunctionRecord>),
    BinnedEvaluated(Rc<BinnedEvaluatedFunctionRecord>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramRecord {
    pub identifier: String,
    pub axis: Vec<Rc<AxisRecord>>,
    pub distribution: Rc<DistributionRecord>,
    pub profiles: Vec<Rc<ProfileRecord>>,
    pub unbinned_stats: Vec<Rc<DistributionStatsRecord>>,
    pub profile_stats: Vec<Rc<DistributionStatsRecord>>,
    pub functions: Vec<FunctionRecord>,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}

// Ntuples

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub buffer: RawBufferRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChunkRecord {
    pub pages: Vec<Rc<PageRecord>>,
    pub page_offsets: Vec<u64>,
    pub page_extremes: Vec<Rc<ExtremesRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub columns: Vec<Rc<ColumnChunkRecord>>,
    pub metadata: Option<Rc<MetadataRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub identifier: String,
    pub dtype: DType,
    pub endianness: Endianness,
    pub dimension_order: DimensionOrder,
    pub filters: Vec<Filter>,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NtupleRecord {
    pub identifier: String,
    pub columns: Vec<Rc<ColumnRecord>>,
    pub chunks: Vec<Rc<ChunkRecord>>,
    pub chunk_offsets: Vec<u64>,
    pub unbinned_stats: Vec<Rc<DistributionStatsRecord>>,
    pub functions: Vec<FunctionObjectRecord>,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}

// Collection

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub expressions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedRegionRecord {
    pub expression: String,
    pub binning: BinningRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub identifier: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationRecord {
    pub assignments: Vec<Rc<AssignmentRecord>>,
    pub systematic: Vec<f64>,
    pub category_systematic: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectRecord {
    Histogram(Rc<HistogramRecord>),
    Ntuple(Rc<NtupleRecord>),
    ParameterizedFunction(Rc<ParameterizedFunctionRecord>),
    BinnedEvaluatedFunction(Rc<BinnedEvaluatedFunctionRecord>),
}

/// Root of every payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub identifier: String,
    pub objects: Vec<ObjectRecord>,
    pub collections: Vec<Rc<CollectionRecord>>,
    pub regions: Vec<Rc<RegionRecord>>,
    pub binned_regions: Vec<Rc<BinnedRegionRecord>>,
    pub variations: Vec<Rc<VariationRecord>>,
    pub title: String,
    pub metadata: Option<Rc<MetadataRecord>>,
    pub decoration: Option<Rc<DecorationRecord>>,
}
