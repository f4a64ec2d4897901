//! Columnar ntuples
//!
//! An ntuple declares its columns once and stores entries in chunks. Each
//! chunk holds one column chunk per column, and each column chunk splits its
//! entries over raw pages. Chunk and page boundaries are offset indices that
//! start at zero and never decrease; the column's dtype gives each page's
//! bytes their meaning.

use std::rc::{Rc, Weak};

use histbuf_core::validation::{element_count, offsets_span, validate_offsets};
use histbuf_core::wire::{ChunkRecord, ColumnChunkRecord, ColumnRecord, NtupleRecord, PageRecord};
use histbuf_core::{DType, DimensionOrder, Endianness, Filter};
use log::debug;

use crate::attribute::{revalidate, Claims, Field, FieldDesc};
use crate::buffer::RawBuffer;
use crate::collection::forget_key;
use crate::error::{configuration, structure, Result};
use crate::filter;
use crate::function::FunctionObject;
use crate::metadata::{metadata_record, AnnotationDescs, Annotations, Metadata};
use crate::node::{Link, NodeInner};
use crate::stats::{DistributionStats, Extremes};
use crate::validate::{validate_all, Shape, Validate};
use crate::view::ArrayView;

fn usize_of(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| structure(format!("{what} of {value} is not addressable")))
}

// Column

static COLUMN_IDENTIFIER: FieldDesc = FieldDesc::new("Column", "identifier")
    .required()
    .identifier();
static COLUMN_DTYPE: FieldDesc = FieldDesc::new("Column", "dtype").required();
static COLUMN_ENDIANNESS: FieldDesc = FieldDesc::new("Column", "endianness");
static COLUMN_ORDER: FieldDesc = FieldDesc::new("Column", "dimension_order");
static COLUMN_FILTERS: FieldDesc = FieldDesc::new("Column", "filters");
static COLUMN_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("Column");

pub(crate) struct ColumnInner {
    link: Link,
    identifier: Field<String>,
    dtype: Field<DType>,
    endianness: Field<Endianness>,
    dimension_order: Field<DimensionOrder>,
    filters: Field<Vec<Filter>>,
    annotations: Annotations,
}

node_handle!(
    /// Name and element type of one ntuple column
    Column,
    ColumnInner
);

annotated!(Column);

impl Column {
    pub fn new(identifier: impl Into<String>, dtype: DType) -> Result<Self> {
        let identifier = identifier.into();
        COLUMN_IDENTIFIER.check_text(&identifier)?;
        Ok(Self(Rc::new(ColumnInner {
            link: Link::default(),
            identifier: Field::new(&COLUMN_IDENTIFIER, identifier),
            dtype: Field::new(&COLUMN_DTYPE, dtype),
            endianness: Field::new(&COLUMN_ENDIANNESS, Endianness::default()),
            dimension_order: Field::new(&COLUMN_ORDER, DimensionOrder::default()),
            filters: Field::new(&COLUMN_FILTERS, Vec::new()),
            annotations: Annotations::new(&COLUMN_ANNOTATIONS),
        })))
    }

    pub fn with_endianness(self, endianness: Endianness) -> Self {
        self.0.endianness.set(endianness);
        self
    }

    pub fn with_dimension_order(self, order: DimensionOrder) -> Self {
        self.0.dimension_order.set(order);
        self
    }

    /// Filters applied to every page after the page's own filters
    pub fn with_filters(self, filters: Vec<Filter>) -> Self {
        self.0.filters.set(filters);
        self
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn dtype(&self) -> DType {
        self.0.dtype.get()
    }

    pub fn set_dtype(&self, dtype: DType) {
        self.0.dtype.set(dtype);
    }

    pub fn endianness(&self) -> Endianness {
        self.0.endianness.get()
    }

    pub fn dimension_order(&self) -> DimensionOrder {
        self.0.dimension_order.get()
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.0.filters.get()
    }

    pub fn set_filters(&self, filters: Vec<Filter>) {
        self.0.filters.set(filters);
    }

    pub(crate) fn from_record(record: &Rc<ColumnRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<ColumnInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            ColumnInner {
                link: Link::attached(parent),
                identifier: Field::new(&COLUMN_IDENTIFIER, record.identifier.clone()),
                dtype: Field::new(&COLUMN_DTYPE, record.dtype),
                endianness: Field::new(&COLUMN_ENDIANNESS, record.endianness),
                dimension_order: Field::new(&COLUMN_ORDER, record.dimension_order),
                filters: Field::lazy(&COLUMN_FILTERS, record, &me, |r, _| r.filters.clone()),
                annotations: Annotations::decoded(
                    &COLUMN_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> ColumnRecord {
        ColumnRecord {
            identifier: self.identifier(),
            dtype: self.dtype(),
            endianness: self.endianness(),
            dimension_order: self.dimension_order(),
            filters: self.filters(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }
}

impl Validate for Column {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(COLUMN_IDENTIFIER.check_text(&self.identifier()))?;
        self.0.annotations.validate(context)?;
        Ok(context.to_vec())
    }
}

// Page

static PAGE_BUFFER: FieldDesc = FieldDesc::new("Page", "buffer").required();

pub(crate) struct PageInner {
    link: Link,
    buffer: Field<RawBuffer>,
}

node_handle!(
    /// A run of one column's entries
    Page,
    PageInner
);

impl Page {
    pub fn new(buffer: impl Into<RawBuffer>) -> Result<Self> {
        let buffer = buffer.into();
        let node = Self(Rc::new(PageInner {
            link: Link::default(),
            buffer: Field::new(&PAGE_BUFFER, buffer.clone()),
        }));
        Claims::new().one(&PAGE_BUFFER, &buffer).commit(&node.weak())?;
        Ok(node)
    }

    pub fn buffer(&self) -> RawBuffer {
        self.0.buffer.get()
    }

    pub fn set_buffer(&self, buffer: impl Into<RawBuffer>) -> Result<()> {
        let buffer = buffer.into();
        Claims::new().one(&PAGE_BUFFER, &buffer).commit(&self.weak())?;
        self.0.buffer.set(buffer);
        Ok(())
    }

    /// Length in bytes after page and column filters, if known without
    /// reading external memory
    fn decoded_len(&self, column: &Column) -> Result<Option<usize>> {
        let filters = column.filters();
        if filter::is_identity(&filters) {
            return self.buffer().decoded_len();
        }
        match self.buffer() {
            RawBuffer::Inline(b) => Ok(Some(filter::decode(&filters, &b.decoded()?)?.len())),
            RawBuffer::External(_) => Ok(None),
        }
    }

    fn view(bytes: std::rc::Rc<[u8]>, column: &Column) -> Result<ArrayView<'static>> {
        let filters = column.filters();
        let bytes = filter::decode_shared(&filters, bytes)?;
        let dtype = column.dtype();
        let count = element_count(bytes.len(), dtype.itemsize())?;
        Ok(ArrayView::shared(
            bytes,
            dtype,
            column.endianness(),
            column.dimension_order(),
            vec![count],
        ))
    }

    /// This page's entries, interpreted as `column`
    ///
    /// Only inline pages can be read this way; external pages go through
    /// [`Page::external_array`].
    pub fn array(&self, column: &Column) -> Result<ArrayView<'static>> {
        match self.buffer() {
            RawBuffer::Inline(b) => Self::view(b.decoded()?, column),
            RawBuffer::External(_) => Err(configuration(
                "page bytes live in external memory; use Page::external_array",
            )),
        }
    }

    /// This page's entries, reading external memory if needed
    ///
    /// # Safety
    ///
    /// For external pages, as [`crate::RawExternalBuffer::raw_bytes`].
    pub unsafe fn external_array(&self, column: &Column) -> Result<ArrayView<'static>> {
        // SAFETY: forwarded to the caller
        let bytes = unsafe { self.buffer().decoded()? };
        Self::view(bytes, column)
    }

    pub(crate) fn from_record(record: &Rc<PageRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<PageInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            PageInner {
                link: Link::attached(parent),
                buffer: Field::lazy(&PAGE_BUFFER, record, &me, |r, me| {
                    RawBuffer::from_record(&r.buffer, me.clone())
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> PageRecord {
        PageRecord {
            buffer: self.buffer().to_record(),
        }
    }
}

impl Validate for Page {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.buffer().validate(context)
    }
}

// ColumnChunk

static CC_PAGES: FieldDesc = FieldDesc::new("ColumnChunk", "pages").required().min_len(1);
static CC_OFFSETS: FieldDesc = FieldDesc::new("ColumnChunk", "page_offsets").required();
static CC_EXTREMES: FieldDesc = FieldDesc::new("ColumnChunk", "page_extremes");

pub(crate) struct ColumnChunkInner {
    link: Link,
    pages: Field<Vec<Page>>,
    page_offsets: Field<Vec<u64>>,
    page_extremes: Field<Vec<Extremes>>,
}

node_handle!(
    /// One column's pages within a chunk
    ColumnChunk,
    ColumnChunkInner
);

impl ColumnChunk {
    /// `page_offsets` has one more element than `pages`: entry `i` of the
    /// chunk lives in the page whose offsets bracket it
    pub fn new(pages: Vec<Page>, page_offsets: Vec<u64>) -> Result<Self> {
        CC_PAGES.check_len(pages.len())?;
        let node = Self(Rc::new(ColumnChunkInner {
            link: Link::default(),
            pages: Field::new(&CC_PAGES, pages.clone()),
            page_offsets: Field::new(&CC_OFFSETS, page_offsets),
            page_extremes: Field::new(&CC_EXTREMES, Vec::new()),
        }));
        Claims::new().all(&CC_PAGES, &pages).commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_page_extremes(self, extremes: Vec<Extremes>) -> Result<Self> {
        self.set_page_extremes(extremes)?;
        Ok(self)
    }

    pub fn pages(&self) -> Vec<Page> {
        self.0.pages.get()
    }

    pub fn set_pages(&self, pages: Vec<Page>, page_offsets: Vec<u64>) -> Result<()> {
        CC_PAGES.check_len(pages.len())?;
        Claims::new().all(&CC_PAGES, &pages).commit(&self.weak())?;
        self.0.pages.set(pages);
        self.0.page_offsets.set(page_offsets);
        Ok(())
    }

    pub fn page_offsets(&self) -> Vec<u64> {
        self.0.page_offsets.get()
    }

    pub fn page_extremes(&self) -> Vec<Extremes> {
        self.0.page_extremes.get()
    }

    pub fn set_page_extremes(&self, extremes: Vec<Extremes>) -> Result<()> {
        Claims::new()
            .all(&CC_EXTREMES, &extremes)
            .commit(&self.weak())?;
        self.0.page_extremes.set(extremes);
        Ok(())
    }

    /// Number of entries, the last page offset
    pub fn entries(&self) -> u64 {
        self.0.page_offsets.with(|offsets| offsets_span(offsets))
    }

    /// Check every page's byte length against `column` and the offsets
    pub(crate) fn check_pages(&self, column: &Column) -> Result<()> {
        let dtype = column.dtype();
        if dtype == DType::None {
            return Ok(());
        }
        let offsets = self.page_offsets();
        for (i, (page, bounds)) in self.pages().iter().zip(offsets.windows(2)).enumerate() {
            let Some(len) = page.decoded_len(column)? else {
                continue;
            };
            let entries = usize_of(bounds[1] - bounds[0], "page entry count")?;
            let expected = entries
                .checked_mul(dtype.itemsize())
                .ok_or_else(|| structure(format!("page {i} of {entries} entries overflows")))?;
            if len != expected {
                return Err(structure(format!(
                    "page {i} of column {:?} has {len} bytes but {entries} entries of {dtype} need {expected}",
                    column.identifier()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<ColumnChunkRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<ColumnChunkInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            ColumnChunkInner {
                link: Link::attached(parent),
                pages: Field::lazy(&CC_PAGES, record, &me, |r, me| {
                    r.pages
                        .iter()
                        .map(|p| Page::from_record(p, me.clone()))
                        .collect()
                }),
                page_offsets: Field::lazy(&CC_OFFSETS, record, &me, |r, _| r.page_offsets.clone()),
                page_extremes: Field::lazy(&CC_EXTREMES, record, &me, |r, me| {
                    r.page_extremes
                        .iter()
                        .map(|e| Extremes::from_record(e, me.clone()))
                        .collect()
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> ColumnChunkRecord {
        ColumnChunkRecord {
            pages: self.pages().iter().map(|p| Rc::new(p.to_record())).collect(),
            page_offsets: self.page_offsets(),
            page_extremes: self
                .page_extremes()
                .iter()
                .map(|e| Rc::new(e.to_record()))
                .collect(),
        }
    }
}

impl Validate for ColumnChunk {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        let pages = self.pages();
        revalidate(CC_PAGES.check_len(pages.len()))?;
        self.0
            .page_offsets
            .with(|offsets| validate_offsets("ColumnChunk.page_offsets", offsets))?;
        let offsets = self.0.page_offsets.with(Vec::len);
        if offsets != pages.len() + 1 {
            return Err(structure(format!(
                "ColumnChunk.page_offsets has {offsets} entries but {} pages need {}",
                pages.len(),
                pages.len() + 1
            )));
        }
        let extremes = self.page_extremes();
        if !extremes.is_empty() && extremes.len() != pages.len() {
            return Err(structure(format!(
                "ColumnChunk.page_extremes has {} entries but there are {} pages",
                extremes.len(),
                pages.len()
            )));
        }
        validate_all(&pages, context)?;
        validate_all(&extremes, context)?;
        Ok(context.to_vec())
    }
}

// Chunk

static CHUNK_COLUMNS: FieldDesc = FieldDesc::new("Chunk", "columns").required();
static CHUNK_METADATA: FieldDesc = FieldDesc::new("Chunk", "metadata");

pub(crate) struct ChunkInner {
    link: Link,
    columns: Field<Vec<ColumnChunk>>,
    metadata: Field<Option<Metadata>>,
}

node_handle!(
    /// A range of entries, stored column by column
    Chunk,
    ChunkInner
);

impl Chunk {
    /// One column chunk per ntuple column, in column order
    pub fn new(columns: Vec<ColumnChunk>) -> Result<Self> {
        let node = Self(Rc::new(ChunkInner {
            link: Link::default(),
            columns: Field::new(&CHUNK_COLUMNS, columns.clone()),
            metadata: Field::new(&CHUNK_METADATA, None),
        }));
        Claims::new()
            .all(&CHUNK_COLUMNS, &columns)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_metadata(self, metadata: Metadata) -> Result<Self> {
        self.set_metadata(Some(metadata))?;
        Ok(self)
    }

    pub fn columns(&self) -> Vec<ColumnChunk> {
        self.0.columns.get()
    }

    pub fn metadata(&self) -> Option<Metadata> {
        self.0.metadata.get()
    }

    pub fn set_metadata(&self, metadata: Option<Metadata>) -> Result<()> {
        Claims::new()
            .opt(&CHUNK_METADATA, &metadata)
            .commit(&self.weak())?;
        self.0.metadata.set(metadata);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<ChunkRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<ChunkInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            ChunkInner {
                link: Link::attached(parent),
                columns: Field::lazy(&CHUNK_COLUMNS, record, &me, |r, me| {
                    r.columns
                        .iter()
                        .map(|c| ColumnChunk::from_record(c, me.clone()))
                        .collect()
                }),
                metadata: Field::lazy(&CHUNK_METADATA, record, &me, |r, me| {
                    r.metadata
                        .as_ref()
                        .map(|m| Metadata::from_record(m, me.clone()))
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> ChunkRecord {
        ChunkRecord {
            columns: self.columns().iter().map(|c| Rc::new(c.to_record())).collect(),
            metadata: metadata_record(self.metadata()),
        }
    }
}

impl Validate for Chunk {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        validate_all(&self.columns(), context)?;
        self.metadata().validate(context)?;
        Ok(context.to_vec())
    }
}

// Ntuple

static NTUPLE_IDENTIFIER: FieldDesc = FieldDesc::new("Ntuple", "identifier")
    .required()
    .identifier();
static NTUPLE_COLUMNS: FieldDesc = FieldDesc::new("Ntuple", "columns").required().keyed(1);
static NTUPLE_CHUNKS: FieldDesc = FieldDesc::new("Ntuple", "chunks").required();
static NTUPLE_OFFSETS: FieldDesc = FieldDesc::new("Ntuple", "chunk_offsets").required();
static NTUPLE_UNBINNED_STATS: FieldDesc = FieldDesc::new("Ntuple", "unbinned_stats");
static NTUPLE_FUNCTIONS: FieldDesc = FieldDesc::new("Ntuple", "functions").keyed(0);
static NTUPLE_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("Ntuple");

pub(crate) struct NtupleInner {
    link: Link,
    identifier: Field<String>,
    columns: Field<Vec<Column>>,
    chunks: Field<Vec<Chunk>>,
    chunk_offsets: Field<Vec<u64>>,
    unbinned_stats: Field<Vec<DistributionStats>>,
    functions: Field<Vec<FunctionObject>>,
    annotations: Annotations,
}

node_handle!(
    /// Unbinned entries in named, typed columns
    Ntuple,
    NtupleInner
);

annotated!(Ntuple);

fn column_keys(columns: &[Column]) -> Result<()> {
    let keys: Vec<String> = columns.iter().map(Column::identifier).collect();
    NTUPLE_COLUMNS.check_keys(keys.iter().map(String::as_str))
}

fn function_keys(functions: &[FunctionObject]) -> Result<()> {
    let keys: Vec<String> = functions.iter().map(FunctionObject::identifier).collect();
    NTUPLE_FUNCTIONS.check_keys(keys.iter().map(String::as_str))
}

impl Ntuple {
    /// `chunk_offsets` has one more element than `chunks`
    pub fn new(
        identifier: impl Into<String>,
        columns: Vec<Column>,
        chunks: Vec<Chunk>,
        chunk_offsets: Vec<u64>,
    ) -> Result<Self> {
        let identifier = identifier.into();
        NTUPLE_IDENTIFIER.check_text(&identifier)?;
        column_keys(&columns)?;
        let node = Self(Rc::new(NtupleInner {
            link: Link::default(),
            identifier: Field::new(&NTUPLE_IDENTIFIER, identifier),
            columns: Field::new(&NTUPLE_COLUMNS, columns.clone()),
            chunks: Field::new(&NTUPLE_CHUNKS, chunks.clone()),
            chunk_offsets: Field::new(&NTUPLE_OFFSETS, chunk_offsets),
            unbinned_stats: Field::new(&NTUPLE_UNBINNED_STATS, Vec::new()),
            functions: Field::new(&NTUPLE_FUNCTIONS, Vec::new()),
            annotations: Annotations::new(&NTUPLE_ANNOTATIONS),
        }));
        Claims::new()
            .all(&NTUPLE_COLUMNS, &columns)
            .all(&NTUPLE_CHUNKS, &chunks)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_unbinned_stats(self, stats: Vec<DistributionStats>) -> Result<Self> {
        self.set_unbinned_stats(stats)?;
        Ok(self)
    }

    pub fn with_functions(self, functions: Vec<FunctionObject>) -> Result<Self> {
        self.set_functions(functions)?;
        Ok(self)
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn set_identifier(&self, identifier: impl Into<String>) -> Result<()> {
        let identifier = identifier.into();
        NTUPLE_IDENTIFIER.check_text(&identifier)?;
        self.0.identifier.set(identifier);
        forget_key(&self.0.link);
        Ok(())
    }

    pub fn columns(&self) -> Vec<Column> {
        self.0.columns.get()
    }

    /// Column with the given identifier
    pub fn column(&self, identifier: &str) -> Option<Column> {
        self.0
            .columns
            .with(|cs| cs.iter().find(|c| c.identifier() == identifier).cloned())
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.0.chunks.get()
    }

    /// Replace the chunks together with their offset index
    pub fn set_chunks(&self, chunks: Vec<Chunk>, chunk_offsets: Vec<u64>) -> Result<()> {
        Claims::new().all(&NTUPLE_CHUNKS, &chunks).commit(&self.weak())?;
        self.0.chunks.set(chunks);
        self.0.chunk_offsets.set(chunk_offsets);
        Ok(())
    }

    pub fn chunk_offsets(&self) -> Vec<u64> {
        self.0.chunk_offsets.get()
    }

    /// Total number of entries, the last chunk offset
    pub fn entries(&self) -> u64 {
        self.0.chunk_offsets.with(|offsets| offsets_span(offsets))
    }

    pub fn unbinned_stats(&self) -> Vec<DistributionStats> {
        self.0.unbinned_stats.get()
    }

    pub fn set_unbinned_stats(&self, stats: Vec<DistributionStats>) -> Result<()> {
        Claims::new()
            .all(&NTUPLE_UNBINNED_STATS, &stats)
            .commit(&self.weak())?;
        self.0.unbinned_stats.set(stats);
        Ok(())
    }

    pub fn functions(&self) -> Vec<FunctionObject> {
        self.0.functions.get()
    }

    pub fn set_functions(&self, functions: Vec<FunctionObject>) -> Result<()> {
        function_keys(&functions)?;
        Claims::new()
            .all(&NTUPLE_FUNCTIONS, &functions)
            .commit(&self.weak())?;
        self.0.functions.set(functions);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<NtupleRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<NtupleInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            NtupleInner {
                link: Link::attached(parent),
                identifier: Field::new(&NTUPLE_IDENTIFIER, record.identifier.clone()),
                columns: Field::lazy(&NTUPLE_COLUMNS, record, &me, |r, me| {
                    r.columns
                        .iter()
                        .map(|c| Column::from_record(c, me.clone()))
                        .collect()
                }),
                chunks: Field::lazy(&NTUPLE_CHUNKS, record, &me, |r, me| {
                    r.chunks
                        .iter()
                        .map(|c| Chunk::from_record(c, me.clone()))
                        .collect()
                }),
                chunk_offsets: Field::lazy(&NTUPLE_OFFSETS, record, &me, |r, _| r.chunk_offsets.clone()),
                unbinned_stats: Field::lazy(&NTUPLE_UNBINNED_STATS, record, &me, |r, me| {
                    r.unbinned_stats
                        .iter()
                        .map(|s| DistributionStats::from_record(s, me.clone()))
                        .collect()
                }),
                functions: Field::lazy(&NTUPLE_FUNCTIONS, record, &me, |r, me| {
                    r.functions
                        .iter()
                        .map(|f| FunctionObject::from_record(f, me.clone()))
                        .collect()
                }),
                annotations: Annotations::decoded(
                    &NTUPLE_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> NtupleRecord {
        NtupleRecord {
            identifier: self.identifier(),
            columns: self.columns().iter().map(|c| Rc::new(c.to_record())).collect(),
            chunks: self.chunks().iter().map(|c| Rc::new(c.to_record())).collect(),
            chunk_offsets: self.chunk_offsets(),
            unbinned_stats: self
                .unbinned_stats()
                .iter()
                .map(|s| Rc::new(s.to_record()))
                .collect(),
            functions: self.functions().iter().map(FunctionObject::to_record).collect(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }
}

impl Validate for Ntuple {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(NTUPLE_IDENTIFIER.check_text(&self.identifier()))?;
        let columns = self.columns();
        revalidate(column_keys(&columns))?;
        let functions = self.functions();
        revalidate(function_keys(&functions))?;
        validate_all(&columns, context)?;

        let chunks = self.chunks();
        let offsets = self.chunk_offsets();
        validate_offsets("Ntuple.chunk_offsets", &offsets)?;
        if offsets.len() != chunks.len() + 1 {
            return Err(structure(format!(
                "Ntuple.chunk_offsets has {} entries but {} chunks need {}",
                offsets.len(),
                chunks.len(),
                chunks.len() + 1
            )));
        }
        for (i, (chunk, bounds)) in chunks.iter().zip(offsets.windows(2)).enumerate() {
            chunk.validate(context)?;
            let column_chunks = chunk.columns();
            if column_chunks.len() != columns.len() {
                return Err(structure(format!(
                    "chunk {i} has {} column chunks but the ntuple has {} columns",
                    column_chunks.len(),
                    columns.len()
                )));
            }
            let entries = bounds[1] - bounds[0];
            for (column_chunk, column) in column_chunks.iter().zip(&columns) {
                if column_chunk.entries() != entries {
                    return Err(structure(format!(
                        "column {:?} of chunk {i} holds {} entries but the chunk offsets give {entries}",
                        column.identifier(),
                        column_chunk.entries()
                    )));
                }
                column_chunk.check_pages(column)?;
            }
        }
        debug!(
            "ntuple {:?}: {} columns, {} chunks, {} entries",
            self.identifier(),
            columns.len(),
            chunks.len(),
            self.entries()
        );

        validate_all(&self.unbinned_stats(), context)?;
        validate_all(&functions, context)?;
        self.0.annotations.validate(context)?;
        Ok(context.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{RawExternalBuffer, RawInlineBuffer};
    use crate::ErrorCategory;

    fn page<T: bytemuck::Pod>(values: &[T]) -> Page {
        let bytes: Vec<u8> = bytemuck::cast_slice(values).to_vec();
        Page::new(RawInlineBuffer::new(bytes)).unwrap()
    }

    fn column_chunk(offsets: Vec<u64>) -> ColumnChunk {
        let pages = offsets
            .windows(2)
            .map(|w| page(&vec![0.0f32; (w[1] - w[0]) as usize]))
            .collect();
        ColumnChunk::new(pages, offsets).unwrap()
    }

    fn ntuple(chunk_offsets: Vec<u64>, page_offsets: &[Vec<u64>]) -> Ntuple {
        let x = Column::new("x", DType::Float32).unwrap();
        let chunks = page_offsets
            .iter()
            .map(|offsets| Chunk::new(vec![column_chunk(offsets.clone())]).unwrap())
            .collect();
        Ntuple::new("events", vec![x], chunks, chunk_offsets).unwrap()
    }

    #[test]
    fn test_page_offsets() {
        assert!(column_chunk(vec![0, 5, 5, 12]).validate(&[]).is_ok());

        let bad_start = ColumnChunk::new(vec![page(&[0u8; 4]), page(&[0u8; 7])], vec![1, 5, 12]).unwrap();
        let err = bad_start.validate(&[]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));

        let not_monotonic = ColumnChunk::new(vec![page(&[0u8; 5]), page(&[0u8; 0])], vec![0, 5, 3]).unwrap();
        assert!(not_monotonic.validate(&[]).is_err());

        let wrong_count = ColumnChunk::new(vec![page(&[0u8; 5])], vec![0, 5, 5]).unwrap();
        assert!(wrong_count.validate(&[]).is_err());
    }

    #[test]
    fn test_ntuple_entries() {
        let n = ntuple(vec![0, 12, 20], &[vec![0, 5, 5, 12], vec![0, 8]]);
        assert!(n.validate(&[]).is_ok());
        assert_eq!(n.entries(), 20);
        assert_eq!(n.chunks()[0].columns()[0].entries(), 12);
    }

    #[test]
    fn test_chunk_offsets_must_match_pages() {
        let n = ntuple(vec![0, 10], &[vec![0, 5, 5, 12]]);
        let err = n.validate(&[]).unwrap_err();
        assert!(err.to_string().contains("chunk offsets"));

        let n = ntuple(vec![0, 12, 20], &[vec![0, 12]]);
        assert!(n.validate(&[]).is_err());
    }

    #[test]
    fn test_page_bytes_follow_dtype() {
        let x = Column::new("x", DType::Float64).unwrap();
        let cc = ColumnChunk::new(vec![page(&[1.0f32, 2.0, 3.0])], vec![0, 3]).unwrap();
        let n = Ntuple::new("t", vec![x], vec![Chunk::new(vec![cc]).unwrap()], vec![0, 3]).unwrap();
        let err = n.validate(&[]).unwrap_err();
        assert!(err.to_string().contains("need 24"));
    }

    #[test]
    fn test_external_pages_skip_length_check_with_filters() {
        let x = Column::new("x", DType::Float64).unwrap();
        let raw = RawExternalBuffer::new(0, 3).with_filters(vec![Filter::Gzip]);
        let cc = ColumnChunk::new(vec![Page::new(raw).unwrap()], vec![0, 2]).unwrap();
        let n = Ntuple::new("t", vec![x], vec![Chunk::new(vec![cc]).unwrap()], vec![0, 2]).unwrap();
        assert!(n.validate(&[]).is_ok());
    }

    #[test]
    fn test_column_keys() {
        let a = Column::new("a", DType::Int32).unwrap();
        let b = Column::new("a", DType::Int32).unwrap();
        let err = Ntuple::new("t", vec![a, b], Vec::new(), vec![0]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
        let err = Ntuple::new("t", Vec::new(), Vec::new(), vec![0]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
    }

    #[test]
    fn test_page_array() {
        let x = Column::new("x", DType::Int16).unwrap().with_endianness(Endianness::native());
        let p = page(&[3i16, -1, 7]);
        let view = p.array(&x).unwrap();
        assert_eq!(view.shape(), &[3]);
        assert_eq!(view.to_vec::<i16>().unwrap(), vec![3, -1, 7]);

        let external = Page::new(RawExternalBuffer::new(0, 0)).unwrap();
        let err = external.array(&x).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Configuration));
    }

    #[test]
    fn test_column_filters_apply_after_page() {
        let values: Vec<u8> = bytemuck::cast_slice(&[1.0f64, 2.0]).to_vec();
        let packed = filter::encode(&[Filter::Gzip], &values).unwrap();
        let x = Column::new("x", DType::Float64)
            .unwrap()
            .with_endianness(Endianness::native())
            .with_filters(vec![Filter::Gzip]);
        let cc = ColumnChunk::new(vec![Page::new(RawInlineBuffer::new(packed)).unwrap()], vec![0, 2]).unwrap();
        let n = Ntuple::new("t", vec![x.clone()], vec![Chunk::new(vec![cc.clone()]).unwrap()], vec![0, 2]).unwrap();
        assert!(n.validate(&[]).is_ok());
        let view = cc.pages()[0].array(&x).unwrap();
        assert_eq!(view.to_f64_vec().unwrap(), vec![1.0, 2.0]);
    }
}
