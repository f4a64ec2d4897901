//! Buffer nodes
//!
//! Buffers vary along two independent axes: whether their bytes are
//! interpreted as a typed array (raw or interpreted) and where the bytes live
//! (inline in the payload or at an external address). Each combination is a
//! concrete node; [`RawBuffer`] and [`InterpretedBuffer`] are the closed
//! unions used by fields that accept either locality, and [`Buffer`] exposes
//! the two axes as tags.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use histbuf_core::validation::{byte_length, element_count, shape_product};
use histbuf_core::wire::{
    InterpretedBufferRecord, InterpretedExternalBufferRecord, InterpretedInlineBufferRecord,
    RawBufferRecord, RawExternalBufferRecord, RawInlineBufferRecord,
};
use histbuf_core::{DType, DimensionOrder, Element, Endianness, ExternalSource, Filter, Slice};
use log::debug;

use crate::attribute::{Field, FieldDesc};
use crate::error::{configuration, structure, Result};
use crate::filter;
use crate::node::{Link, Node, NodeInner};
use crate::validate::{Shape, Validate};
use crate::view::{check_elements, gather, sliced_count, ArrayView};

/// Whether a buffer's bytes carry a dtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Raw,
    Interpreted,
}

/// Where a buffer's bytes live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    Inline,
    External,
}

/// Capabilities shared by every buffer node
pub trait Buffer: Node {
    fn storage(&self) -> StorageKind;
    fn locality(&self) -> Locality;
    /// Decode pipeline, applied first to last
    fn filter_list(&self) -> Vec<Filter>;
    /// Selection applied after the filters
    fn slice(&self) -> Option<Slice>;
}

fn check_slice(slice: Option<Slice>) -> Result<()> {
    if let Some(slice) = slice {
        slice.check()?;
    }
    Ok(())
}

// Raw inline

static RAW_INLINE_BUFFER: FieldDesc = FieldDesc::new("RawInlineBuffer", "buffer").required();
static RAW_INLINE_FILTERS: FieldDesc = FieldDesc::new("RawInlineBuffer", "filters");
static RAW_INLINE_SLICE: FieldDesc = FieldDesc::new("RawInlineBuffer", "postfilter_slice");

pub(crate) struct RawInlineBufferInner {
    link: Link,
    buffer: Field<Rc<[u8]>>,
    filters: Field<Vec<Filter>>,
    postfilter_slice: Field<Option<Slice>>,
}

node_handle!(
    /// Untyped bytes stored in the payload, e.g. an ntuple page
    RawInlineBuffer,
    RawInlineBufferInner
);

impl RawInlineBuffer {
    pub fn new(buffer: impl Into<Rc<[u8]>>) -> Self {
        Self(Rc::new(RawInlineBufferInner {
            link: Link::default(),
            buffer: Field::new(&RAW_INLINE_BUFFER, buffer.into()),
            filters: Field::new(&RAW_INLINE_FILTERS, Vec::new()),
            postfilter_slice: Field::new(&RAW_INLINE_SLICE, None),
        }))
    }

    pub fn with_filters(self, filters: Vec<Filter>) -> Self {
        self.set_filters(filters);
        self
    }

    pub fn with_postfilter_slice(self, slice: Slice) -> Self {
        self.set_postfilter_slice(Some(slice));
        self
    }

    pub fn buffer(&self) -> Rc<[u8]> {
        self.0.buffer.get()
    }

    pub fn set_buffer(&self, buffer: impl Into<Rc<[u8]>>) {
        self.0.buffer.set(buffer.into());
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.0.filters.get()
    }

    pub fn set_filters(&self, filters: Vec<Filter>) {
        self.0.filters.set(filters);
    }

    pub fn postfilter_slice(&self) -> Option<Slice> {
        self.0.postfilter_slice.get()
    }

    pub fn set_postfilter_slice(&self, slice: Option<Slice>) {
        self.0.postfilter_slice.set(slice);
    }

    /// Bytes after the filter pipeline and slice
    pub fn decoded(&self) -> Result<Rc<[u8]>> {
        let slice = self.postfilter_slice();
        let bytes = filter::decode_shared(&self.filters(), self.buffer())?;
        gather(bytes, 1, slice.as_ref())
    }

    pub(crate) fn from_record(record: &Rc<RawInlineBufferRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(RawInlineBufferInner {
            link: Link::attached(parent),
            buffer: Field::new(&RAW_INLINE_BUFFER, record.buffer.clone()),
            filters: Field::new(&RAW_INLINE_FILTERS, record.filters.clone()),
            postfilter_slice: Field::new(&RAW_INLINE_SLICE, record.postfilter_slice),
        }))
    }

    pub(crate) fn to_record(&self) -> RawInlineBufferRecord {
        RawInlineBufferRecord {
            buffer: self.buffer(),
            filters: self.filters(),
            postfilter_slice: self.postfilter_slice(),
        }
    }
}

impl Validate for RawInlineBuffer {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        check_slice(self.postfilter_slice())?;
        self.decoded()?;
        Ok(context.to_vec())
    }
}

impl Buffer for RawInlineBuffer {
    fn storage(&self) -> StorageKind {
        StorageKind::Raw
    }

    fn locality(&self) -> Locality {
        Locality::Inline
    }

    fn filter_list(&self) -> Vec<Filter> {
        self.filters()
    }

    fn slice(&self) -> Option<Slice> {
        self.postfilter_slice()
    }
}

// Raw external

static RAW_EXTERNAL_POINTER: FieldDesc = FieldDesc::new("RawExternalBuffer", "pointer").required();
static RAW_EXTERNAL_NUMBYTES: FieldDesc =
    FieldDesc::new("RawExternalBuffer", "numbytes").required();
static RAW_EXTERNAL_SOURCE: FieldDesc = FieldDesc::new("RawExternalBuffer", "external_source");
static RAW_EXTERNAL_FILTERS: FieldDesc = FieldDesc::new("RawExternalBuffer", "filters");
static RAW_EXTERNAL_SLICE: FieldDesc = FieldDesc::new("RawExternalBuffer", "postfilter_slice");

pub(crate) struct RawExternalBufferInner {
    link: Link,
    pointer: Field<u64>,
    numbytes: Field<u64>,
    external_source: Field<ExternalSource>,
    filters: Field<Vec<Filter>>,
    postfilter_slice: Field<Option<Slice>>,
}

node_handle!(
    /// Untyped bytes at an address outside the payload
    RawExternalBuffer,
    RawExternalBufferInner
);

impl RawExternalBuffer {
    /// The caller keeps `numbytes` bytes at `pointer` alive and unmodified
    /// for as long as any view derived from this buffer exists
    pub fn new(pointer: u64, numbytes: u64) -> Self {
        Self(Rc::new(RawExternalBufferInner {
            link: Link::default(),
            pointer: Field::new(&RAW_EXTERNAL_POINTER, pointer),
            numbytes: Field::new(&RAW_EXTERNAL_NUMBYTES, numbytes),
            external_source: Field::new(&RAW_EXTERNAL_SOURCE, ExternalSource::default()),
            filters: Field::new(&RAW_EXTERNAL_FILTERS, Vec::new()),
            postfilter_slice: Field::new(&RAW_EXTERNAL_SLICE, None),
        }))
    }

    pub fn with_external_source(self, source: ExternalSource) -> Self {
        self.0.external_source.set(source);
        self
    }

    pub fn with_filters(self, filters: Vec<Filter>) -> Self {
        self.0.filters.set(filters);
        self
    }

    pub fn with_postfilter_slice(self, slice: Slice) -> Self {
        self.0.postfilter_slice.set(Some(slice));
        self
    }

    pub fn pointer(&self) -> u64 {
        self.0.pointer.get()
    }

    pub fn set_pointer(&self, pointer: u64) {
        self.0.pointer.set(pointer);
    }

    pub fn numbytes(&self) -> u64 {
        self.0.numbytes.get()
    }

    pub fn set_numbytes(&self, numbytes: u64) {
        self.0.numbytes.set(numbytes);
    }

    pub fn external_source(&self) -> ExternalSource {
        self.0.external_source.get()
    }

    pub fn set_external_source(&self, source: ExternalSource) {
        self.0.external_source.set(source);
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.0.filters.get()
    }

    pub fn set_filters(&self, filters: Vec<Filter>) {
        self.0.filters.set(filters);
    }

    pub fn postfilter_slice(&self) -> Option<Slice> {
        self.0.postfilter_slice.get()
    }

    pub fn set_postfilter_slice(&self, slice: Option<Slice>) {
        self.0.postfilter_slice.set(slice);
    }

    /// Borrow the external bytes, before filters
    ///
    /// # Safety
    ///
    /// `pointer` must address `numbytes` readable bytes that stay valid and
    /// unmodified for `'a`.
    pub unsafe fn raw_bytes<'a>(&self) -> Result<&'a [u8]> {
        external_bytes(self.external_source(), self.pointer(), self.numbytes())
    }

    pub(crate) fn from_record(
        record: &Rc<RawExternalBufferRecord>,
        parent: Weak<dyn NodeInner>,
    ) -> Self {
        Self(Rc::new(RawExternalBufferInner {
            link: Link::attached(parent),
            pointer: Field::new(&RAW_EXTERNAL_POINTER, record.pointer),
            numbytes: Field::new(&RAW_EXTERNAL_NUMBYTES, record.numbytes),
            external_source: Field::new(&RAW_EXTERNAL_SOURCE, record.external_source),
            filters: Field::new(&RAW_EXTERNAL_FILTERS, record.filters.clone()),
            postfilter_slice: Field::new(&RAW_EXTERNAL_SLICE, record.postfilter_slice),
        }))
    }

    pub(crate) fn to_record(&self) -> RawExternalBufferRecord {
        RawExternalBufferRecord {
            pointer: self.pointer(),
            numbytes: self.numbytes(),
            external_source: self.external_source(),
            filters: self.filters(),
            postfilter_slice: self.postfilter_slice(),
        }
    }
}

impl Validate for RawExternalBuffer {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        check_slice(self.postfilter_slice())?;
        Ok(context.to_vec())
    }
}

impl Buffer for RawExternalBuffer {
    fn storage(&self) -> StorageKind {
        StorageKind::Raw
    }

    fn locality(&self) -> Locality {
        Locality::External
    }

    fn filter_list(&self) -> Vec<Filter> {
        self.filters()
    }

    fn slice(&self) -> Option<Slice> {
        self.postfilter_slice()
    }
}

unsafe fn external_bytes<'a>(source: ExternalSource, pointer: u64, numbytes: u64) -> Result<&'a [u8]> {
    if source != ExternalSource::Memory {
        return Err(configuration(format!(
            "external buffers with source {source} cannot be viewed in place"
        )));
    }
    let len = usize::try_from(numbytes)
        .map_err(|_| structure(format!("{numbytes} bytes is not addressable")))?;
    if len == 0 {
        return Ok(&[]);
    }
    if pointer == 0 {
        return Err(structure("external buffer has a null pointer"));
    }
    // SAFETY: the caller guarantees that `pointer` addresses `len` readable
    // bytes that outlive `'a`
    Ok(unsafe { std::slice::from_raw_parts(pointer as usize as *const u8, len) })
}

// Interpreted inline

static INLINE_BUFFER: FieldDesc = FieldDesc::new("InterpretedInlineBuffer", "buffer");
static INLINE_FILTERS: FieldDesc = FieldDesc::new("InterpretedInlineBuffer", "filters");
static INLINE_SLICE: FieldDesc = FieldDesc::new("InterpretedInlineBuffer", "postfilter_slice");
static INLINE_DTYPE: FieldDesc = FieldDesc::new("InterpretedInlineBuffer", "dtype");
static INLINE_ENDIANNESS: FieldDesc = FieldDesc::new("InterpretedInlineBuffer", "endianness");
static INLINE_ORDER: FieldDesc = FieldDesc::new("InterpretedInlineBuffer", "dimension_order");

pub(crate) struct InterpretedInlineBufferInner {
    link: Link,
    /// `None` until a deferred buffer is allocated by validation
    buffer: Field<Option<Rc<[u8]>>>,
    filters: Field<Vec<Filter>>,
    postfilter_slice: Field<Option<Slice>>,
    dtype: Field<DType>,
    endianness: Field<Endianness>,
    dimension_order: Field<DimensionOrder>,
    decoded: RefCell<Option<Rc<[u8]>>>,
    shape: RefCell<Option<Shape>>,
}

node_handle!(
    /// Typed array stored in the payload
    InterpretedInlineBuffer,
    InterpretedInlineBufferInner
);

impl InterpretedInlineBuffer {
    fn build(buffer: Option<Rc<[u8]>>, dtype: DType, endianness: Endianness) -> Self {
        Self(Rc::new(InterpretedInlineBufferInner {
            link: Link::default(),
            buffer: Field::new(&INLINE_BUFFER, buffer),
            filters: Field::new(&INLINE_FILTERS, Vec::new()),
            postfilter_slice: Field::new(&INLINE_SLICE, None),
            dtype: Field::new(&INLINE_DTYPE, dtype),
            endianness: Field::new(&INLINE_ENDIANNESS, endianness),
            dimension_order: Field::new(&INLINE_ORDER, DimensionOrder::default()),
            decoded: RefCell::new(None),
            shape: RefCell::new(None),
        }))
    }

    /// Stored bytes holding elements of `dtype`, little-endian unless changed
    pub fn new(buffer: impl Into<Rc<[u8]>>, dtype: DType) -> Self {
        Self::build(Some(buffer.into()), dtype, Endianness::default())
    }

    /// A buffer without data, zero-filled to fit its context on validation
    pub fn deferred(dtype: DType) -> Self {
        Self::build(None, dtype, Endianness::default())
    }

    /// Copy typed values into a native-endian buffer
    pub fn from_values<T: Element>(values: &[T]) -> Self {
        let bytes: Rc<[u8]> = bytemuck::cast_slice::<T, u8>(values).into();
        Self::build(Some(bytes), T::DTYPE, Endianness::native())
    }

    pub fn with_filters(self, filters: Vec<Filter>) -> Self {
        self.set_filters(filters);
        self
    }

    pub fn with_postfilter_slice(self, slice: Slice) -> Self {
        self.set_postfilter_slice(Some(slice));
        self
    }

    pub fn with_endianness(self, endianness: Endianness) -> Self {
        self.set_endianness(endianness);
        self
    }

    pub fn with_dimension_order(self, order: DimensionOrder) -> Self {
        self.set_dimension_order(order);
        self
    }

    fn forget(&self) {
        self.0.decoded.replace(None);
        self.0.shape.replace(None);
    }

    /// True while no bytes have been given or allocated
    pub fn is_deferred(&self) -> bool {
        self.0.buffer.with(Option::is_none)
    }

    pub fn buffer(&self) -> Option<Rc<[u8]>> {
        self.0.buffer.get()
    }

    pub fn set_buffer(&self, buffer: Option<Rc<[u8]>>) {
        self.0.buffer.set(buffer);
        self.forget();
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.0.filters.get()
    }

    pub fn set_filters(&self, filters: Vec<Filter>) {
        self.0.filters.set(filters);
        self.forget();
    }

    pub fn postfilter_slice(&self) -> Option<Slice> {
        self.0.postfilter_slice.get()
    }

    pub fn set_postfilter_slice(&self, slice: Option<Slice>) {
        self.0.postfilter_slice.set(slice);
        self.forget();
    }

    pub fn dtype(&self) -> DType {
        self.0.dtype.get()
    }

    pub fn set_dtype(&self, dtype: DType) {
        self.0.dtype.set(dtype);
        self.forget();
    }

    pub fn endianness(&self) -> Endianness {
        self.0.endianness.get()
    }

    pub fn set_endianness(&self, endianness: Endianness) {
        self.0.endianness.set(endianness);
        self.forget();
    }

    pub fn dimension_order(&self) -> DimensionOrder {
        self.0.dimension_order.get()
    }

    pub fn set_dimension_order(&self, order: DimensionOrder) {
        self.0.dimension_order.set(order);
        self.forget();
    }

    /// Validate the whole hierarchy, then view this buffer with the shape
    /// validation assigned to it
    pub fn array(&self) -> Result<ArrayView<'static>> {
        self.collection()?.check_valid()?;
        self.memoized_view()
    }

    /// View this buffer as if it sat in bins of `shape`, without a hierarchy
    pub fn array_in(&self, shape: &[usize]) -> Result<ArrayView<'static>> {
        self.validate(shape)?;
        self.memoized_view()
    }

    fn memoized_view(&self) -> Result<ArrayView<'static>> {
        let shape = self.0.shape.borrow().clone();
        let decoded = self.0.decoded.borrow().clone();
        match (decoded, shape) {
            (Some(decoded), Some(shape)) => Ok(ArrayView::shared(
                decoded,
                self.dtype(),
                self.endianness(),
                self.dimension_order(),
                shape,
            )),
            _ => Err(structure("buffer was not reached by validation")),
        }
    }

    pub(crate) fn from_record(
        record: &Rc<InterpretedInlineBufferRecord>,
        parent: Weak<dyn NodeInner>,
    ) -> Self {
        Self(Rc::new(InterpretedInlineBufferInner {
            link: Link::attached(parent),
            buffer: Field::new(&INLINE_BUFFER, Some(record.buffer.clone())),
            filters: Field::new(&INLINE_FILTERS, record.filters.clone()),
            postfilter_slice: Field::new(&INLINE_SLICE, record.postfilter_slice),
            dtype: Field::new(&INLINE_DTYPE, record.dtype),
            endianness: Field::new(&INLINE_ENDIANNESS, record.endianness),
            dimension_order: Field::new(&INLINE_ORDER, record.dimension_order),
            decoded: RefCell::new(None),
            shape: RefCell::new(None),
        }))
    }

    /// Deferred buffers are written as empty; the tree must be validated
    /// first so that they have been allocated
    pub(crate) fn to_record(&self) -> InterpretedInlineBufferRecord {
        InterpretedInlineBufferRecord {
            buffer: self.buffer().unwrap_or_else(|| Rc::from(Vec::new())),
            filters: self.filters(),
            postfilter_slice: self.postfilter_slice(),
            dtype: self.dtype(),
            endianness: self.endianness(),
            dimension_order: self.dimension_order(),
        }
    }
}

impl Validate for InterpretedInlineBuffer {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        let slice = self.postfilter_slice();
        check_slice(slice)?;
        let itemsize = self.dtype().itemsize();
        let decoded = match self.buffer() {
            None => {
                if !filter::is_identity(&self.filters()) || slice.is_some() {
                    return Err(structure(
                        "deferred buffer cannot declare filters or a postfilter slice",
                    ));
                }
                let count = shape_product(context)?;
                let zeros: Rc<[u8]> = vec![0u8; byte_length(count, itemsize)?].into();
                debug!(
                    "allocated deferred {} buffer of {} elements for shape {:?}",
                    self.dtype(),
                    count,
                    context
                );
                self.0.buffer.set(Some(zeros.clone()));
                zeros
            }
            Some(bytes) => {
                let decoded = gather(
                    filter::decode_shared(&self.filters(), bytes)?,
                    itemsize,
                    slice.as_ref(),
                )?;
                check_elements(
                    "InterpretedInlineBuffer",
                    element_count(decoded.len(), itemsize)?,
                    context,
                )?;
                decoded
            }
        };
        self.0.decoded.replace(Some(decoded));
        self.0.shape.replace(Some(context.to_vec()));
        Ok(context.to_vec())
    }
}

impl Buffer for InterpretedInlineBuffer {
    fn storage(&self) -> StorageKind {
        StorageKind::Interpreted
    }

    fn locality(&self) -> Locality {
        Locality::Inline
    }

    fn filter_list(&self) -> Vec<Filter> {
        self.filters()
    }

    fn slice(&self) -> Option<Slice> {
        self.postfilter_slice()
    }
}

// Interpreted external

static EXTERNAL_POINTER: FieldDesc = FieldDesc::new("InterpretedExternalBuffer", "pointer").required();
static EXTERNAL_NUMBYTES: FieldDesc =
    FieldDesc::new("InterpretedExternalBuffer", "numbytes").required();
static EXTERNAL_SOURCE: FieldDesc = FieldDesc::new("InterpretedExternalBuffer", "external_source");
static EXTERNAL_FILTERS: FieldDesc = FieldDesc::new("InterpretedExternalBuffer", "filters");
static EXTERNAL_SLICE: FieldDesc = FieldDesc::new("InterpretedExternalBuffer", "postfilter_slice");
static EXTERNAL_DTYPE: FieldDesc = FieldDesc::new("InterpretedExternalBuffer", "dtype");
static EXTERNAL_ENDIANNESS: FieldDesc = FieldDesc::new("InterpretedExternalBuffer", "endianness");
static EXTERNAL_ORDER: FieldDesc = FieldDesc::new("InterpretedExternalBuffer", "dimension_order");
static EXTERNAL_LOCATION: FieldDesc = FieldDesc::new("InterpretedExternalBuffer", "location");

pub(crate) struct InterpretedExternalBufferInner {
    link: Link,
    pointer: Field<u64>,
    numbytes: Field<u64>,
    external_source: Field<ExternalSource>,
    filters: Field<Vec<Filter>>,
    postfilter_slice: Field<Option<Slice>>,
    dtype: Field<DType>,
    endianness: Field<Endianness>,
    dimension_order: Field<DimensionOrder>,
    location: Field<String>,
    shape: RefCell<Option<Shape>>,
}

node_handle!(
    /// Typed array at an address outside the payload
    InterpretedExternalBuffer,
    InterpretedExternalBufferInner
);

impl InterpretedExternalBuffer {
    /// The caller keeps `numbytes` bytes at `pointer` alive and unmodified
    /// for as long as any view derived from this buffer exists
    pub fn new(pointer: u64, numbytes: u64, dtype: DType) -> Self {
        Self(Rc::new(InterpretedExternalBufferInner {
            link: Link::default(),
            pointer: Field::new(&EXTERNAL_POINTER, pointer),
            numbytes: Field::new(&EXTERNAL_NUMBYTES, numbytes),
            external_source: Field::new(&EXTERNAL_SOURCE, ExternalSource::default()),
            filters: Field::new(&EXTERNAL_FILTERS, Vec::new()),
            postfilter_slice: Field::new(&EXTERNAL_SLICE, None),
            dtype: Field::new(&EXTERNAL_DTYPE, dtype),
            endianness: Field::new(&EXTERNAL_ENDIANNESS, Endianness::default()),
            dimension_order: Field::new(&EXTERNAL_ORDER, DimensionOrder::default()),
            location: Field::new(&EXTERNAL_LOCATION, String::new()),
            shape: RefCell::new(None),
        }))
    }

    /// Describe a native-endian slice that outlives every view of this buffer
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let numbytes = std::mem::size_of_val(values) as u64;
        Self::new(values.as_ptr() as usize as u64, numbytes, T::DTYPE)
            .with_endianness(Endianness::native())
    }

    pub fn with_external_source(self, source: ExternalSource) -> Self {
        self.set_external_source(source);
        self
    }

    pub fn with_filters(self, filters: Vec<Filter>) -> Self {
        self.set_filters(filters);
        self
    }

    pub fn with_postfilter_slice(self, slice: Slice) -> Self {
        self.set_postfilter_slice(Some(slice));
        self
    }

    pub fn with_endianness(self, endianness: Endianness) -> Self {
        self.set_endianness(endianness);
        self
    }

    pub fn with_dimension_order(self, order: DimensionOrder) -> Self {
        self.set_dimension_order(order);
        self
    }

    pub fn with_location(self, location: impl Into<String>) -> Self {
        self.set_location(location);
        self
    }

    fn forget(&self) {
        self.0.shape.replace(None);
    }

    pub fn pointer(&self) -> u64 {
        self.0.pointer.get()
    }

    pub fn set_pointer(&self, pointer: u64) {
        self.0.pointer.set(pointer);
        self.forget();
    }

    pub fn numbytes(&self) -> u64 {
        self.0.numbytes.get()
    }

    pub fn set_numbytes(&self, numbytes: u64) {
        self.0.numbytes.set(numbytes);
        self.forget();
    }

    pub fn external_source(&self) -> ExternalSource {
        self.0.external_source.get()
    }

    pub fn set_external_source(&self, source: ExternalSource) {
        self.0.external_source.set(source);
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.0.filters.get()
    }

    pub fn set_filters(&self, filters: Vec<Filter>) {
        self.0.filters.set(filters);
        self.forget();
    }

    pub fn postfilter_slice(&self) -> Option<Slice> {
        self.0.postfilter_slice.get()
    }

    pub fn set_postfilter_slice(&self, slice: Option<Slice>) {
        self.0.postfilter_slice.set(slice);
        self.forget();
    }

    pub fn dtype(&self) -> DType {
        self.0.dtype.get()
    }

    pub fn set_dtype(&self, dtype: DType) {
        self.0.dtype.set(dtype);
        self.forget();
    }

    pub fn endianness(&self) -> Endianness {
        self.0.endianness.get()
    }

    pub fn set_endianness(&self, endianness: Endianness) {
        self.0.endianness.set(endianness);
    }

    pub fn dimension_order(&self) -> DimensionOrder {
        self.0.dimension_order.get()
    }

    pub fn set_dimension_order(&self, order: DimensionOrder) {
        self.0.dimension_order.set(order);
    }

    /// File name or URL for `file` and `url` sources
    pub fn location(&self) -> String {
        self.0.location.get()
    }

    pub fn set_location(&self, location: impl Into<String>) {
        self.0.location.set(location.into());
    }

    /// Validate the whole hierarchy, then view the external bytes
    ///
    /// # Safety
    ///
    /// `pointer` must address `numbytes` readable bytes that stay valid and
    /// unmodified for `'a`.
    pub unsafe fn array<'a>(&self) -> Result<ArrayView<'a>> {
        self.collection()?.check_valid()?;
        let shape = self
            .0
            .shape
            .borrow()
            .clone()
            .ok_or_else(|| structure("buffer was not reached by validation"))?;
        // SAFETY: forwarded to the caller
        let raw = unsafe { external_bytes(self.external_source(), self.pointer(), self.numbytes())? };
        let slice = self.postfilter_slice();
        let itemsize = self.dtype().itemsize();
        if filter::is_identity(&self.filters()) && slice.is_none() {
            check_elements("InterpretedExternalBuffer", element_count(raw.len(), itemsize)?, &shape)?;
            return Ok(ArrayView::borrowed(
                raw,
                self.dtype(),
                self.endianness(),
                self.dimension_order(),
                shape,
            ));
        }
        let decoded = gather(
            filter::decode(&self.filters(), raw)?.into(),
            itemsize,
            slice.as_ref(),
        )?;
        check_elements("InterpretedExternalBuffer", element_count(decoded.len(), itemsize)?, &shape)?;
        Ok(ArrayView::shared(
            decoded,
            self.dtype(),
            self.endianness(),
            self.dimension_order(),
            shape,
        ))
    }

    pub(crate) fn from_record(
        record: &Rc<InterpretedExternalBufferRecord>,
        parent: Weak<dyn NodeInner>,
    ) -> Self {
        Self(Rc::new(InterpretedExternalBufferInner {
            link: Link::attached(parent),
            pointer: Field::new(&EXTERNAL_POINTER, record.pointer),
            numbytes: Field::new(&EXTERNAL_NUMBYTES, record.numbytes),
            external_source: Field::new(&EXTERNAL_SOURCE, record.external_source),
            filters: Field::new(&EXTERNAL_FILTERS, record.filters.clone()),
            postfilter_slice: Field::new(&EXTERNAL_SLICE, record.postfilter_slice),
            dtype: Field::new(&EXTERNAL_DTYPE, record.dtype),
            endianness: Field::new(&EXTERNAL_ENDIANNESS, record.endianness),
            dimension_order: Field::new(&EXTERNAL_ORDER, record.dimension_order),
            location: Field::new(&EXTERNAL_LOCATION, record.location.clone()),
            shape: RefCell::new(None),
        }))
    }

    pub(crate) fn to_record(&self) -> InterpretedExternalBufferRecord {
        InterpretedExternalBufferRecord {
            pointer: self.pointer(),
            numbytes: self.numbytes(),
            external_source: self.external_source(),
            filters: self.filters(),
            postfilter_slice: self.postfilter_slice(),
            dtype: self.dtype(),
            endianness: self.endianness(),
            dimension_order: self.dimension_order(),
            location: self.location(),
        }
    }
}

impl Validate for InterpretedExternalBuffer {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        let slice = self.postfilter_slice();
        check_slice(slice)?;
        if filter::is_identity(&self.filters()) {
            let numbytes = usize::try_from(self.numbytes())
                .map_err(|_| structure(format!("{} bytes is not addressable", self.numbytes())))?;
            let count = sliced_count(numbytes, self.dtype().itemsize(), slice.as_ref())?;
            check_elements("InterpretedExternalBuffer", count, context)?;
        }
        self.0.shape.replace(Some(context.to_vec()));
        Ok(context.to_vec())
    }
}

impl Buffer for InterpretedExternalBuffer {
    fn storage(&self) -> StorageKind {
        StorageKind::Interpreted
    }

    fn locality(&self) -> Locality {
        Locality::External
    }

    fn filter_list(&self) -> Vec<Filter> {
        self.filters()
    }

    fn slice(&self) -> Option<Slice> {
        self.postfilter_slice()
    }
}

// Unions

node_union!(
    /// Either raw buffer
    RawBuffer {
        Inline(RawInlineBuffer),
        External(RawExternalBuffer),
    }
);

node_union!(
    /// Either interpreted buffer
    InterpretedBuffer {
        Inline(InterpretedInlineBuffer),
        External(InterpretedExternalBuffer),
    }
);

impl RawBuffer {
    /// Length of the decoded bytes, when it can be known without
    /// dereferencing external memory
    pub fn decoded_len(&self) -> Result<Option<usize>> {
        match self {
            RawBuffer::Inline(b) => Ok(Some(b.decoded()?.len())),
            RawBuffer::External(b) => {
                if !filter::is_identity(&b.filters()) {
                    return Ok(None);
                }
                let numbytes = usize::try_from(b.numbytes())
                    .map_err(|_| structure(format!("{} bytes is not addressable", b.numbytes())))?;
                Ok(Some(sliced_count(numbytes, 1, b.postfilter_slice().as_ref())?))
            }
        }
    }

    /// Decoded bytes; external memory is only read for the `memory` source
    ///
    /// # Safety
    ///
    /// For external buffers, as [`RawExternalBuffer::raw_bytes`].
    pub unsafe fn decoded(&self) -> Result<Rc<[u8]>> {
        match self {
            RawBuffer::Inline(b) => b.decoded(),
            RawBuffer::External(b) => {
                // SAFETY: forwarded to the caller
                let raw = unsafe { b.raw_bytes()? };
                let bytes = filter::decode(&b.filters(), raw)?;
                gather(bytes.into(), 1, b.postfilter_slice().as_ref())
            }
        }
    }

    pub(crate) fn from_record(record: &RawBufferRecord, parent: Weak<dyn NodeInner>) -> Self {
        match record {
            RawBufferRecord::Inline(r) => RawInlineBuffer::from_record(r, parent).into(),
            RawBufferRecord::External(r) => RawExternalBuffer::from_record(r, parent).into(),
        }
    }

    pub(crate) fn to_record(&self) -> RawBufferRecord {
        match self {
            RawBuffer::Inline(b) => RawBufferRecord::Inline(Rc::new(b.to_record())),
            RawBuffer::External(b) => RawBufferRecord::External(Rc::new(b.to_record())),
        }
    }
}

impl Validate for RawBuffer {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        match self {
            RawBuffer::Inline(b) => b.validate(context),
            RawBuffer::External(b) => b.validate(context),
        }
    }
}

impl Buffer for RawBuffer {
    fn storage(&self) -> StorageKind {
        StorageKind::Raw
    }

    fn locality(&self) -> Locality {
        match self {
            RawBuffer::Inline(_) => Locality::Inline,
            RawBuffer::External(_) => Locality::External,
        }
    }

    fn filter_list(&self) -> Vec<Filter> {
        match self {
            RawBuffer::Inline(b) => b.filters(),
            RawBuffer::External(b) => b.filters(),
        }
    }

    fn slice(&self) -> Option<Slice> {
        match self {
            RawBuffer::Inline(b) => b.postfilter_slice(),
            RawBuffer::External(b) => b.postfilter_slice(),
        }
    }
}

impl InterpretedBuffer {
    pub fn dtype(&self) -> DType {
        match self {
            InterpretedBuffer::Inline(b) => b.dtype(),
            InterpretedBuffer::External(b) => b.dtype(),
        }
    }

    pub fn endianness(&self) -> Endianness {
        match self {
            InterpretedBuffer::Inline(b) => b.endianness(),
            InterpretedBuffer::External(b) => b.endianness(),
        }
    }

    pub fn dimension_order(&self) -> DimensionOrder {
        match self {
            InterpretedBuffer::Inline(b) => b.dimension_order(),
            InterpretedBuffer::External(b) => b.dimension_order(),
        }
    }

    pub fn as_inline(&self) -> Option<&InterpretedInlineBuffer> {
        match self {
            InterpretedBuffer::Inline(b) => Some(b),
            InterpretedBuffer::External(_) => None,
        }
    }

    pub(crate) fn from_record(record: &InterpretedBufferRecord, parent: Weak<dyn NodeInner>) -> Self {
        match record {
            InterpretedBufferRecord::Inline(r) => {
                InterpretedInlineBuffer::from_record(r, parent).into()
            }
            InterpretedBufferRecord::External(r) => {
                InterpretedExternalBuffer::from_record(r, parent).into()
            }
        }
    }

    pub(crate) fn to_record(&self) -> InterpretedBufferRecord {
        match self {
            InterpretedBuffer::Inline(b) => InterpretedBufferRecord::Inline(Rc::new(b.to_record())),
            InterpretedBuffer::External(b) => {
                InterpretedBufferRecord::External(Rc::new(b.to_record()))
            }
        }
    }
}

impl Validate for InterpretedBuffer {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        match self {
            InterpretedBuffer::Inline(b) => b.validate(context),
            InterpretedBuffer::External(b) => b.validate(context),
        }
    }
}

impl Buffer for InterpretedBuffer {
    fn storage(&self) -> StorageKind {
        StorageKind::Interpreted
    }

    fn locality(&self) -> Locality {
        match self {
            InterpretedBuffer::Inline(_) => Locality::Inline,
            InterpretedBuffer::External(_) => Locality::External,
        }
    }

    fn filter_list(&self) -> Vec<Filter> {
        match self {
            InterpretedBuffer::Inline(b) => b.filters(),
            InterpretedBuffer::External(b) => b.filters(),
        }
    }

    fn slice(&self) -> Option<Slice> {
        match self {
            InterpretedBuffer::Inline(b) => b.postfilter_slice(),
            InterpretedBuffer::External(b) => b.postfilter_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    #[test]
    fn test_deferred_buffer_is_zero_filled() {
        let buffer = InterpretedInlineBuffer::deferred(DType::Float64);
        assert!(buffer.is_deferred());
        let view = buffer.array_in(&[20]).unwrap();
        assert_eq!(view.shape(), &[20]);
        assert_eq!(view.to_vec::<f64>().unwrap(), vec![0.0; 20]);
        assert!(!buffer.is_deferred());
        assert_eq!(buffer.buffer().unwrap().len(), 160);
    }

    #[test]
    fn test_deferred_buffer_rejects_filters() {
        let buffer = InterpretedInlineBuffer::deferred(DType::Int32).with_filters(vec![Filter::Gzip]);
        let err = buffer.validate(&[3]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));
    }

    #[test]
    fn test_element_count_must_match_context() {
        let buffer = InterpretedInlineBuffer::from_values(&[1.0f32, 2.0, 3.0]);
        assert_eq!(buffer.validate(&[3]).unwrap(), vec![3]);
        assert!(buffer.validate(&[4]).is_err());
        assert!(buffer.validate(&[]).is_err());
    }

    #[test]
    fn test_slice_applies_to_elements() {
        let buffer = InterpretedInlineBuffer::from_values(&[10i64, 11, 12, 13, 14, 15])
            .with_postfilter_slice(Slice::new(Some(1), None, Some(2)));
        let view = buffer.array_in(&[3]).unwrap();
        assert_eq!(view.to_vec::<i64>().unwrap(), vec![11, 13, 15]);

        buffer.set_postfilter_slice(Some(Slice::new(None, None, Some(0))));
        let err = buffer.validate(&[3]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_filtered_inline_buffer() {
        let values: Vec<u16> = (0..100).collect();
        let stored = filter::encode(&[Filter::Gzip], bytemuck::cast_slice(&values)).unwrap();
        let buffer = InterpretedInlineBuffer::new(stored, DType::Uint16)
            .with_endianness(Endianness::native())
            .with_filters(vec![Filter::Gzip]);
        let view = buffer.array_in(&[10, 10]).unwrap();
        assert_eq!(view.get_f64(&[3, 4]).unwrap(), 34.0);
    }

    #[test]
    fn test_detached_array_requires_hierarchy() {
        let buffer = InterpretedInlineBuffer::from_values(&[1u8, 2]);
        assert!(buffer.array().is_err());
    }

    #[test]
    fn test_external_numbytes_checked_against_shape() {
        let values = [1.0f64, 2.0, 3.0, 4.0];
        let buffer = InterpretedExternalBuffer::from_slice(&values);
        assert_eq!(buffer.numbytes(), 32);
        assert!(buffer.validate(&[4]).is_ok());
        assert!(buffer.validate(&[2, 2]).is_ok());
        assert!(buffer.validate(&[5]).is_err());

        // filtered external bytes cannot be counted without reading them
        buffer.set_filters(vec![Filter::Lz4]);
        assert!(buffer.validate(&[5]).is_ok());
    }

    #[test]
    fn test_raw_buffers() {
        let page = RawBuffer::from(RawInlineBuffer::new(vec![1u8, 2, 3, 4]));
        assert_eq!(page.decoded_len().unwrap(), Some(4));
        assert_eq!(page.storage(), StorageKind::Raw);
        assert_eq!(page.locality(), Locality::Inline);

        let external = RawBuffer::from(
            RawExternalBuffer::new(0, 16).with_postfilter_slice(Slice::range(0, 8)),
        );
        assert_eq!(external.decoded_len().unwrap(), Some(8));
        assert_eq!(external.locality(), Locality::External);
    }

    #[test]
    fn test_external_sources_other_than_memory_cannot_be_read() {
        let bytes = [7u8; 4];
        let raw = RawExternalBuffer::new(bytes.as_ptr() as usize as u64, 4)
            .with_external_source(ExternalSource::File);
        let err = unsafe { raw.raw_bytes() }.unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Configuration));

        raw.set_external_source(ExternalSource::Memory);
        assert_eq!(unsafe { raw.raw_bytes() }.unwrap(), &bytes);
    }
}
