//! The collection root and its systematic bookkeeping
//!
//! A [`Collection`] owns uniquely named objects (histograms, ntuples and
//! standalone functions), optional nested collections, and the regions and
//! variations that describe how the objects were selected. It is the only
//! node that can be validated as a whole, written to a container, or read
//! back from one.

use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use histbuf_core::wire::{
    AssignmentRecord, BinnedRegionRecord, CollectionRecord, ObjectRecord, RegionRecord,
    VariationRecord,
};
use log::debug;

use crate::attribute::{revalidate, Claims, Field, FieldDesc};
use crate::binning::Binning;
use crate::codec;
use crate::config::CodecConfig;
use crate::container;
use crate::error::{ownership, Error, Result};
use crate::function::{BinnedEvaluatedFunction, ParameterizedFunction};
use crate::histogram::Histogram;
use crate::metadata::{AnnotationDescs, Annotations};
use crate::node::{self, Attach, Link, NodeInner};
use crate::ntuple::Ntuple;
use crate::validate::{validate_all, Shape, Validate};

// Region

static REGION_EXPRESSIONS: FieldDesc = FieldDesc::new("Region", "expressions")
    .required()
    .min_len(1);

pub(crate) struct RegionInner {
    link: Link,
    expressions: Field<Vec<String>>,
}

node_handle!(
    /// A selection given by the conjunction of its expressions
    Region,
    RegionInner
);

impl Region {
    pub fn new<S: Into<String>>(expressions: impl IntoIterator<Item = S>) -> Result<Self> {
        let expressions: Vec<String> = expressions.into_iter().map(Into::into).collect();
        REGION_EXPRESSIONS.check_len(expressions.len())?;
        Ok(Self(Rc::new(RegionInner {
            link: Link::default(),
            expressions: Field::new(&REGION_EXPRESSIONS, expressions),
        })))
    }

    pub fn expressions(&self) -> Vec<String> {
        self.0.expressions.get()
    }

    pub(crate) fn from_record(record: &Rc<RegionRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(RegionInner {
            link: Link::attached(parent),
            expressions: Field::new(&REGION_EXPRESSIONS, record.expressions.clone()),
        }))
    }

    pub(crate) fn to_record(&self) -> RegionRecord {
        RegionRecord {
            expressions: self.expressions(),
        }
    }
}

impl Validate for Region {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(self.0.expressions.with(|e| REGION_EXPRESSIONS.check_len(e.len())))?;
        Ok(context.to_vec())
    }
}

// BinnedRegion

static BINNED_REGION_EXPRESSION: FieldDesc = FieldDesc::new("BinnedRegion", "expression").required();
static BINNED_REGION_BINNING: FieldDesc = FieldDesc::new("BinnedRegion", "binning").required();

pub(crate) struct BinnedRegionInner {
    link: Link,
    expression: Field<String>,
    binning: Field<Binning>,
}

node_handle!(
    /// A family of selections, one per bin of an expression
    BinnedRegion,
    BinnedRegionInner
);

impl BinnedRegion {
    pub fn new(expression: impl Into<String>, binning: impl Into<Binning>) -> Result<Self> {
        let binning = binning.into();
        let node = Self(Rc::new(BinnedRegionInner {
            link: Link::default(),
            expression: Field::new(&BINNED_REGION_EXPRESSION, expression.into()),
            binning: Field::new(&BINNED_REGION_BINNING, binning.clone()),
        }));
        Claims::new()
            .one(&BINNED_REGION_BINNING, &binning)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn expression(&self) -> String {
        self.0.expression.get()
    }

    pub fn binning(&self) -> Binning {
        self.0.binning.get()
    }

    pub(crate) fn from_record(record: &Rc<BinnedRegionRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<BinnedRegionInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            BinnedRegionInner {
                link: Link::attached(parent),
                expression: Field::new(&BINNED_REGION_EXPRESSION, record.expression.clone()),
                binning: Field::lazy(&BINNED_REGION_BINNING, record, &me, |r, me| {
                    Binning::from_record(&r.binning, me.clone())
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> BinnedRegionRecord {
        BinnedRegionRecord {
            expression: self.expression(),
            binning: self.binning().to_record(),
        }
    }
}

impl Validate for BinnedRegion {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.binning().validate(context)?;
        Ok(context.to_vec())
    }
}

// Assignment

static ASSIGNMENT_IDENTIFIER: FieldDesc = FieldDesc::new("Assignment", "identifier")
    .required()
    .identifier();
static ASSIGNMENT_EXPRESSION: FieldDesc = FieldDesc::new("Assignment", "expression").required();

pub(crate) struct AssignmentInner {
    link: Link,
    identifier: Field<String>,
    expression: Field<String>,
}

node_handle!(
    /// A named expression overridden by a variation
    Assignment,
    AssignmentInner
);

impl Assignment {
    pub fn new(identifier: impl Into<String>, expression: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();
        ASSIGNMENT_IDENTIFIER.check_text(&identifier)?;
        Ok(Self(Rc::new(AssignmentInner {
            link: Link::default(),
            identifier: Field::new(&ASSIGNMENT_IDENTIFIER, identifier),
            expression: Field::new(&ASSIGNMENT_EXPRESSION, expression.into()),
        })))
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn expression(&self) -> String {
        self.0.expression.get()
    }

    pub(crate) fn from_record(record: &Rc<AssignmentRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(AssignmentInner {
            link: Link::attached(parent),
            identifier: Field::new(&ASSIGNMENT_IDENTIFIER, record.identifier.clone()),
            expression: Field::new(&ASSIGNMENT_EXPRESSION, record.expression.clone()),
        }))
    }

    pub(crate) fn to_record(&self) -> AssignmentRecord {
        AssignmentRecord {
            identifier: self.identifier(),
            expression: self.expression(),
        }
    }
}

impl Validate for Assignment {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(ASSIGNMENT_IDENTIFIER.check_text(&self.identifier()))?;
        Ok(context.to_vec())
    }
}

// Variation

static VARIATION_ASSIGNMENTS: FieldDesc = FieldDesc::new("Variation", "assignments")
    .required()
    .keyed(1);
static VARIATION_SYSTEMATIC: FieldDesc = FieldDesc::new("Variation", "systematic");
static VARIATION_CATEGORY: FieldDesc = FieldDesc::new("Variation", "category_systematic");

pub(crate) struct VariationInner {
    link: Link,
    assignments: Field<Vec<Assignment>>,
    systematic: Field<Vec<f64>>,
    category_systematic: Field<Vec<String>>,
}

node_handle!(
    /// One systematic variation, given as a set of assignments
    Variation,
    VariationInner
);

fn assignment_keys(assignments: &[Assignment]) -> Result<()> {
    let keys: Vec<String> = assignments.iter().map(Assignment::identifier).collect();
    VARIATION_ASSIGNMENTS.check_keys(keys.iter().map(String::as_str))
}

impl Variation {
    pub fn new(assignments: Vec<Assignment>) -> Result<Self> {
        assignment_keys(&assignments)?;
        let node = Self(Rc::new(VariationInner {
            link: Link::default(),
            assignments: Field::new(&VARIATION_ASSIGNMENTS, assignments.clone()),
            systematic: Field::new(&VARIATION_SYSTEMATIC, Vec::new()),
            category_systematic: Field::new(&VARIATION_CATEGORY, Vec::new()),
        }));
        Claims::new()
            .all(&VARIATION_ASSIGNMENTS, &assignments)
            .commit(&node.weak())?;
        Ok(node)
    }

    /// Position of this variation in a continuous systematic space,
    /// in units of standard deviations
    pub fn with_systematic(self, systematic: Vec<f64>) -> Self {
        self.0.systematic.set(systematic);
        self
    }

    pub fn with_category_systematic<S: Into<String>>(self, categories: impl IntoIterator<Item = S>) -> Self {
        self.0
            .category_systematic
            .set(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.0.assignments.get()
    }

    pub fn systematic(&self) -> Vec<f64> {
        self.0.systematic.get()
    }

    pub fn category_systematic(&self) -> Vec<String> {
        self.0.category_systematic.get()
    }

    pub(crate) fn from_record(record: &Rc<VariationRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<VariationInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            VariationInner {
                link: Link::attached(parent),
                assignments: Field::lazy(&VARIATION_ASSIGNMENTS, record, &me, |r, me| {
                    r.assignments
                        .iter()
                        .map(|a| Assignment::from_record(a, me.clone()))
                        .collect()
                }),
                systematic: Field::lazy(&VARIATION_SYSTEMATIC, record, &me, |r, _| r.systematic.clone()),
                category_systematic: Field::lazy(&VARIATION_CATEGORY, record, &me, |r, _| {
                    r.category_systematic.clone()
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> VariationRecord {
        VariationRecord {
            assignments: self
                .assignments()
                .iter()
                .map(|a| Rc::new(a.to_record()))
                .collect(),
            systematic: self.systematic(),
            category_systematic: self.category_systematic(),
        }
    }
}

impl Validate for Variation {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        let assignments = self.assignments();
        revalidate(assignment_keys(&assignments))?;
        validate_all(&assignments, context)?;
        Ok(context.to_vec())
    }
}

// Object

node_union!(
    /// Anything a collection can hold by name
    Object {
        Histogram(Histogram),
        Ntuple(Ntuple),
        ParameterizedFunction(ParameterizedFunction),
        BinnedEvaluatedFunction(BinnedEvaluatedFunction),
    }
);

impl Object {
    pub fn identifier(&self) -> String {
        match self {
            Object::Histogram(o) => o.identifier(),
            Object::Ntuple(o) => o.identifier(),
            Object::ParameterizedFunction(o) => o.identifier(),
            Object::BinnedEvaluatedFunction(o) => o.identifier(),
        }
    }

    pub(crate) fn from_record(record: &ObjectRecord, parent: Weak<dyn NodeInner>) -> Self {
        match record {
            ObjectRecord::Histogram(r) => Histogram::from_record(r, parent).into(),
            ObjectRecord::Ntuple(r) => Ntuple::from_record(r, parent).into(),
            ObjectRecord::ParameterizedFunction(r) => ParameterizedFunction::from_record(r, parent).into(),
            ObjectRecord::BinnedEvaluatedFunction(r) => {
                BinnedEvaluatedFunction::from_record(r, parent).into()
            }
        }
    }

    pub(crate) fn to_record(&self) -> ObjectRecord {
        match self {
            Object::Histogram(o) => ObjectRecord::Histogram(Rc::new(o.to_record())),
            Object::Ntuple(o) => ObjectRecord::Ntuple(Rc::new(o.to_record())),
            Object::ParameterizedFunction(o) => {
                ObjectRecord::ParameterizedFunction(Rc::new(o.to_record()))
            }
            Object::BinnedEvaluatedFunction(o) => {
                ObjectRecord::BinnedEvaluatedFunction(Rc::new(o.to_record()))
            }
        }
    }
}

impl Validate for Object {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        match self {
            Object::Histogram(o) => o.validate(context),
            Object::Ntuple(o) => o.validate(context),
            Object::ParameterizedFunction(o) => o.validate(context),
            Object::BinnedEvaluatedFunction(o) => o.validate(context),
        }
    }
}

// Collection

static COLLECTION_IDENTIFIER: FieldDesc = FieldDesc::new("Collection", "identifier")
    .required()
    .identifier();
static COLLECTION_OBJECTS: FieldDesc = FieldDesc::new("Collection", "objects").required().keyed(1);
static COLLECTION_COLLECTIONS: FieldDesc = FieldDesc::new("Collection", "collections").keyed(0);
static COLLECTION_REGIONS: FieldDesc = FieldDesc::new("Collection", "regions");
static COLLECTION_BINNED_REGIONS: FieldDesc = FieldDesc::new("Collection", "binned_regions");
static COLLECTION_VARIATIONS: FieldDesc = FieldDesc::new("Collection", "variations");
static COLLECTION_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("Collection");

/// Lookup tables from identifier to child
#[derive(Default)]
struct Index {
    objects: HashMap<String, Object>,
    collections: HashMap<String, Collection>,
}

pub(crate) struct CollectionInner {
    link: Link,
    identifier: Field<String>,
    objects: Field<Vec<Object>>,
    collections: Field<Vec<Collection>>,
    regions: Field<Vec<Region>>,
    binned_regions: Field<Vec<BinnedRegion>>,
    variations: Field<Vec<Variation>>,
    annotations: Annotations,
    index: RefCell<Option<Rc<Index>>>,
}

node_handle!(
    /// Root of a hierarchy of histograms, ntuples and functions
    Collection,
    CollectionInner
);

annotated!(Collection);

/// Drop the lookup index of the collection holding the node behind `link`;
/// called after a keyed child is renamed
pub(crate) fn forget_key(link: &Link) {
    if let Some(parent) = node::parent_collection(link) {
        parent.index.replace(None);
    }
}

fn object_keys(objects: &[Object]) -> Result<()> {
    let keys: Vec<String> = objects.iter().map(Object::identifier).collect();
    COLLECTION_OBJECTS.check_keys(keys.iter().map(String::as_str))
}

fn collection_keys(collections: &[Collection]) -> Result<()> {
    let keys: Vec<String> = collections.iter().map(Collection::identifier).collect();
    COLLECTION_COLLECTIONS.check_keys(keys.iter().map(String::as_str))
}

impl Collection {
    pub fn new(identifier: impl Into<String>, objects: Vec<Object>) -> Result<Self> {
        let identifier = identifier.into();
        COLLECTION_IDENTIFIER.check_text(&identifier)?;
        object_keys(&objects)?;
        let node = Self(Rc::new(CollectionInner {
            link: Link::default(),
            identifier: Field::new(&COLLECTION_IDENTIFIER, identifier),
            objects: Field::new(&COLLECTION_OBJECTS, objects.clone()),
            collections: Field::new(&COLLECTION_COLLECTIONS, Vec::new()),
            regions: Field::new(&COLLECTION_REGIONS, Vec::new()),
            binned_regions: Field::new(&COLLECTION_BINNED_REGIONS, Vec::new()),
            variations: Field::new(&COLLECTION_VARIATIONS, Vec::new()),
            annotations: Annotations::new(&COLLECTION_ANNOTATIONS),
            index: RefCell::new(None),
        }));
        Claims::new()
            .all(&COLLECTION_OBJECTS, &objects)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_collections(self, collections: Vec<Collection>) -> Result<Self> {
        self.set_collections(collections)?;
        Ok(self)
    }

    pub fn with_regions(self, regions: Vec<Region>) -> Result<Self> {
        self.set_regions(regions)?;
        Ok(self)
    }

    pub fn with_binned_regions(self, regions: Vec<BinnedRegion>) -> Result<Self> {
        self.set_binned_regions(regions)?;
        Ok(self)
    }

    pub fn with_variations(self, variations: Vec<Variation>) -> Result<Self> {
        self.set_variations(variations)?;
        Ok(self)
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn set_identifier(&self, identifier: impl Into<String>) -> Result<()> {
        let identifier = identifier.into();
        COLLECTION_IDENTIFIER.check_text(&identifier)?;
        self.0.identifier.set(identifier);
        forget_key(&self.0.link);
        Ok(())
    }

    pub fn objects(&self) -> Vec<Object> {
        self.0.objects.get()
    }

    pub fn set_objects(&self, objects: Vec<Object>) -> Result<()> {
        object_keys(&objects)?;
        Claims::new()
            .all(&COLLECTION_OBJECTS, &objects)
            .commit(&self.weak())?;
        self.0.objects.set(objects);
        self.0.index.replace(None);
        Ok(())
    }

    pub fn collections(&self) -> Vec<Collection> {
        self.0.collections.get()
    }

    pub fn set_collections(&self, collections: Vec<Collection>) -> Result<()> {
        collection_keys(&collections)?;
        let lineage = node::lineage(self.0.clone())?;
        if let Some(ancestor) = collections.iter().find(|c| lineage.contains(&Attach::addr(*c))) {
            return Err(ownership(format!(
                "collection {:?} cannot be nested inside itself",
                ancestor.identifier()
            )));
        }
        Claims::new()
            .all(&COLLECTION_COLLECTIONS, &collections)
            .commit(&self.weak())?;
        self.0.collections.set(collections);
        self.0.index.replace(None);
        Ok(())
    }

    pub fn regions(&self) -> Vec<Region> {
        self.0.regions.get()
    }

    pub fn set_regions(&self, regions: Vec<Region>) -> Result<()> {
        Claims::new()
            .all(&COLLECTION_REGIONS, &regions)
            .commit(&self.weak())?;
        self.0.regions.set(regions);
        Ok(())
    }

    pub fn binned_regions(&self) -> Vec<BinnedRegion> {
        self.0.binned_regions.get()
    }

    pub fn set_binned_regions(&self, regions: Vec<BinnedRegion>) -> Result<()> {
        Claims::new()
            .all(&COLLECTION_BINNED_REGIONS, &regions)
            .commit(&self.weak())?;
        self.0.binned_regions.set(regions);
        Ok(())
    }

    pub fn variations(&self) -> Vec<Variation> {
        self.0.variations.get()
    }

    pub fn set_variations(&self, variations: Vec<Variation>) -> Result<()> {
        Claims::new()
            .all(&COLLECTION_VARIATIONS, &variations)
            .commit(&self.weak())?;
        self.0.variations.set(variations);
        Ok(())
    }

    fn index(&self) -> Rc<Index> {
        if let Some(index) = self.0.index.borrow().as_ref() {
            return Rc::clone(index);
        }
        let mut index = Index::default();
        self.0.objects.with(|objects| {
            for object in objects {
                index.objects.insert(object.identifier(), object.clone());
            }
        });
        self.0.collections.with(|collections| {
            for collection in collections {
                index.collections.insert(collection.identifier(), collection.clone());
            }
        });
        debug!(
            "indexed collection {:?}: {} objects, {} collections",
            self.identifier(),
            index.objects.len(),
            index.collections.len()
        );
        let index = Rc::new(index);
        self.0.index.replace(Some(Rc::clone(&index)));
        index
    }

    /// Object with the given identifier
    pub fn get(&self, identifier: &str) -> Option<Object> {
        self.index().objects.get(identifier).cloned()
    }

    /// Nested collection with the given identifier
    pub fn subcollection(&self, identifier: &str) -> Option<Collection> {
        self.index().collections.get(identifier).cloned()
    }

    /// Validate the whole hierarchy below this collection
    pub fn check_valid(&self) -> Result<()> {
        debug!("validating collection {:?}", self.identifier());
        self.validate(&[])?;
        Ok(())
    }

    /// Like [`Collection::check_valid`], but structural problems yield
    /// `Ok(false)`; every other error is passed on
    pub fn is_valid(&self) -> Result<bool> {
        match self.check_valid() {
            Ok(()) => Ok(true),
            Err(err) if err.is_structural() => {
                debug!("collection {:?} is invalid: {err}", self.identifier());
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) fn from_record(record: &Rc<CollectionRecord>, parent: Option<Weak<dyn NodeInner>>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<CollectionInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            CollectionInner {
                link: parent.map(Link::attached).unwrap_or_default(),
                identifier: Field::new(&COLLECTION_IDENTIFIER, record.identifier.clone()),
                objects: Field::lazy(&COLLECTION_OBJECTS, record, &me, |r, me| {
                    r.objects
                        .iter()
                        .map(|o| Object::from_record(o, me.clone()))
                        .collect()
                }),
                collections: Field::lazy(&COLLECTION_COLLECTIONS, record, &me, |r, me| {
                    r.collections
                        .iter()
                        .map(|c| Collection::from_record(c, Some(me.clone())))
                        .collect()
                }),
                regions: Field::lazy(&COLLECTION_REGIONS, record, &me, |r, me| {
                    r.regions
                        .iter()
                        .map(|x| Region::from_record(x, me.clone()))
                        .collect()
                }),
                binned_regions: Field::lazy(&COLLECTION_BINNED_REGIONS, record, &me, |r, me| {
                    r.binned_regions
                        .iter()
                        .map(|x| BinnedRegion::from_record(x, me.clone()))
                        .collect()
                }),
                variations: Field::lazy(&COLLECTION_VARIATIONS, record, &me, |r, me| {
                    r.variations
                        .iter()
                        .map(|x| Variation::from_record(x, me.clone()))
                        .collect()
                }),
                annotations: Annotations::decoded(
                    &COLLECTION_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
                index: RefCell::new(None),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> CollectionRecord {
        CollectionRecord {
            identifier: self.identifier(),
            objects: self.objects().iter().map(Object::to_record).collect(),
            collections: self
                .collections()
                .iter()
                .map(|c| Rc::new(c.to_record()))
                .collect(),
            regions: self.regions().iter().map(|r| Rc::new(r.to_record())).collect(),
            binned_regions: self
                .binned_regions()
                .iter()
                .map(|r| Rc::new(r.to_record()))
                .collect(),
            variations: self
                .variations()
                .iter()
                .map(|v| Rc::new(v.to_record()))
                .collect(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }

    fn from_decoded(record: CollectionRecord) -> Self {
        Self::from_record(&Rc::new(record), None)
    }

    /// Validate and encode the unframed payload
    pub fn to_buffer(&self) -> Result<Vec<u8>> {
        self.to_buffer_with(&CodecConfig::default())
    }

    pub fn to_buffer_with(&self, config: &CodecConfig) -> Result<Vec<u8>> {
        self.check_valid()?;
        codec::encode(&self.to_record(), config)
    }

    /// Decode an unframed payload; nodes materialize as they are read
    pub fn from_buffer(payload: &[u8]) -> Result<Self> {
        Self::from_buffer_with(payload, &CodecConfig::default())
    }

    pub fn from_buffer_with(payload: &[u8], config: &CodecConfig) -> Result<Self> {
        codec::decode(payload, config).map(Self::from_decoded)
    }

    /// Validate and encode a framed container
    pub fn to_container(&self) -> Result<Vec<u8>> {
        self.to_container_with(&CodecConfig::default())
    }

    pub fn to_container_with(&self, config: &CodecConfig) -> Result<Vec<u8>> {
        self.check_valid()?;
        container::to_bytes(&self.to_record(), config)
    }

    /// Validate and stream a framed container into `sink`; returns the
    /// number of bytes written
    pub fn write_container<W: Write>(&self, sink: W) -> Result<u64> {
        self.check_valid()?;
        container::write(&self.to_record(), sink)
    }

    pub fn from_container(bytes: &[u8]) -> Result<Self> {
        Self::from_container_with(bytes, &CodecConfig::default())
    }

    pub fn from_container_with(bytes: &[u8], config: &CodecConfig) -> Result<Self> {
        container::from_bytes(bytes, config).map(Self::from_decoded)
    }

    /// Validate and write a framed container to `path`
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        self.check_valid()?;
        container::to_file(&self.to_record(), path)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with(path, &CodecConfig::default())
    }

    pub fn from_file_with<P: AsRef<Path>>(path: P, config: &CodecConfig) -> Result<Self> {
        container::from_file(path, config).map(Self::from_decoded)
    }
}

impl Validate for Collection {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(COLLECTION_IDENTIFIER.check_text(&self.identifier()))?;
        let objects = self.objects();
        revalidate(object_keys(&objects))?;
        let collections = self.collections();
        revalidate(collection_keys(&collections))?;

        validate_all(&objects, context)?;
        validate_all(&collections, context)?;
        validate_all(&self.regions(), context)?;
        validate_all(&self.binned_regions(), context)?;
        validate_all(&self.variations(), context)?;
        self.0.annotations.validate(context)?;
        Ok(context.to_vec())
    }
}

impl TryFrom<&[u8]> for Collection {
    type Error = Error;

    /// Decode a framed container
    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_container(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::{IntegerBinning, RealInterval, RegularBinning};
    use crate::buffer::InterpretedInlineBuffer;
    use crate::histogram::Axis;
    use crate::node::Node;
    use crate::stats::{Distribution, UnweightedCounts};
    use crate::ErrorCategory;

    fn histogram(id: &str, num: u64, counts: usize) -> Histogram {
        let binning = RegularBinning::new(num, RealInterval::new(0.0, 1.0).unwrap()).unwrap();
        let axis = Axis::new().with_binning(binning).unwrap();
        let buffer = InterpretedInlineBuffer::from_values(&vec![1u32; counts]);
        let distribution = Distribution::new(UnweightedCounts::new(buffer).unwrap()).unwrap();
        Histogram::new(id, vec![axis], distribution).unwrap()
    }

    #[test]
    fn test_lookup_and_reindex() {
        let c = Collection::new("c", vec![histogram("h1", 10, 12).into()]).unwrap();
        assert!(matches!(c.get("h1"), Some(Object::Histogram(_))));
        assert!(c.get("h2").is_none());

        c.set_objects(vec![histogram("h2", 3, 5).into()]).unwrap();
        assert!(c.get("h1").is_none());
        assert_eq!(c.get("h2").unwrap().identifier(), "h2");
    }

    #[test]
    fn test_objects_are_keyed() {
        let err = Collection::new("c", Vec::new()).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));

        let dup = vec![histogram("h", 1, 3).into(), histogram("h", 1, 3).into()];
        let err = Collection::new("c", dup).unwrap_err();
        assert!(err.to_string().contains("unique"));
    }

    #[test]
    fn test_is_valid_separates_structure() {
        let good = Collection::new("c", vec![histogram("h", 10, 12).into()]).unwrap();
        assert!(good.is_valid().unwrap());

        let bad = Collection::new("c", vec![histogram("h", 10, 11).into()]).unwrap();
        assert!(!bad.is_valid().unwrap());
        let err = bad.check_valid().unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));
    }

    #[test]
    fn test_nodes_find_their_collection() {
        let h = histogram("h", 10, 12);
        let axis = h.axis()[0].clone();
        let c = Collection::new("root", vec![h.into()]).unwrap();
        assert_eq!(axis.collection().unwrap(), c);
    }

    #[test]
    fn test_nested_collections() {
        let inner = Collection::new("inner", vec![histogram("h", 2, 4).into()]).unwrap();
        let outer = Collection::new("outer", vec![histogram("h", 2, 4).into()])
            .unwrap()
            .with_collections(vec![inner.clone()])
            .unwrap();
        assert_eq!(outer.subcollection("inner").unwrap(), inner);
        assert_eq!(inner.collection().unwrap(), outer);
        assert!(outer.check_valid().is_ok());
    }

    #[test]
    fn test_collection_cannot_contain_itself() {
        let c = Collection::new("c", vec![histogram("h", 2, 4).into()]).unwrap();
        let err = c.set_collections(vec![c.clone()]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Ownership));
        assert!(c.subcollection("c").is_none());
        assert!(c.check_valid().is_ok());

        let inner = Collection::new("inner", vec![histogram("h", 2, 4).into()]).unwrap();
        let outer = Collection::new("outer", vec![histogram("h", 2, 4).into()])
            .unwrap()
            .with_collections(vec![inner.clone()])
            .unwrap();
        let err = inner.set_collections(vec![outer.clone()]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Ownership));
        assert!(!outer.is_attached());
        assert!(outer.is_valid().unwrap());
        assert!(outer.to_buffer().is_ok());
    }

    #[test]
    fn test_renamed_object_is_found() {
        let h = histogram("h1", 10, 12);
        let c = Collection::new("c", vec![h.clone().into()]).unwrap();
        assert!(c.get("h1").is_some());

        h.set_identifier("h2").unwrap();
        assert!(c.get("h1").is_none());
        assert_eq!(c.get("h2").unwrap().identifier(), "h2");

        let inner = Collection::new("inner", vec![histogram("h", 2, 4).into()]).unwrap();
        let outer = Collection::new("outer", vec![histogram("h", 2, 4).into()])
            .unwrap()
            .with_collections(vec![inner.clone()])
            .unwrap();
        assert!(outer.subcollection("inner").is_some());
        inner.set_identifier("renamed").unwrap();
        assert!(outer.subcollection("inner").is_none());
        assert_eq!(outer.subcollection("renamed").unwrap(), inner);
    }

    #[test]
    fn test_regions_and_variations() {
        let region = Region::new(["pt > 20", "abs(eta) < 2.4"]).unwrap();
        let binned = BinnedRegion::new("njets", IntegerBinning::new(0, 5)).unwrap();
        let shift = Variation::new(vec![Assignment::new("jes", "1.02").unwrap()])
            .unwrap()
            .with_systematic(vec![1.0]);
        let c = Collection::new("c", vec![histogram("h", 1, 3).into()])
            .unwrap()
            .with_regions(vec![region])
            .unwrap()
            .with_binned_regions(vec![binned])
            .unwrap()
            .with_variations(vec![shift])
            .unwrap();
        assert!(c.check_valid().is_ok());

        assert!(Region::new(Vec::<String>::new()).is_err());
        let dup = vec![Assignment::new("a", "1").unwrap(), Assignment::new("a", "2").unwrap()];
        assert!(Variation::new(dup).is_err());
    }

    #[test]
    fn test_buffer_roundtrip() {
        let c = Collection::new("c", vec![histogram("h", 10, 12).into()]).unwrap();
        let payload = c.to_buffer().unwrap();
        let back = Collection::from_buffer(&payload).unwrap();
        assert_eq!(back.identifier(), "c");
        assert!(back.check_valid().is_ok());
        assert_eq!(back.to_record(), c.to_record());
    }

    #[test]
    fn test_invalid_collection_is_not_written() {
        let c = Collection::new("c", vec![histogram("h", 10, 5).into()]).unwrap();
        assert!(c.to_container().is_err());
        let mut sink = Vec::new();
        assert!(c.write_container(&mut sink).is_err());
        assert!(sink.is_empty());
    }
}
