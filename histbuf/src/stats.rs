//! Counts and summary statistics
//!
//! Every buffer in this module is binned like the node that owns it: the
//! caller validates these nodes against the full bin shape (or against the
//! bare context for unbinned statistics) and each buffer must hold exactly
//! one element per bin.

use std::rc::{Rc, Weak};

use histbuf_core::format::constants::ONE_SIGMA;
use histbuf_core::wire::{
    CorrelationRecord, CountsRecord, DistributionRecord, DistributionStatsRecord, ExtremesRecord,
    GenericErrorsRecord, MomentsRecord, QuantilesRecord, UnweightedCountsRecord,
    WeightedCountsRecord,
};

use crate::attribute::{revalidate, Claims, Field, FieldDesc};
use crate::buffer::InterpretedBuffer;
use crate::error::Result;
use crate::node::{Link, NodeInner};
use crate::validate::{validate_all, Shape, Validate};

// UnweightedCounts

static UNWEIGHTED_COUNTS: FieldDesc = FieldDesc::new("UnweightedCounts", "counts").required();

pub(crate) struct UnweightedCountsInner {
    link: Link,
    counts: Field<InterpretedBuffer>,
}

node_handle!(
    /// Plain entry counts per bin
    UnweightedCounts,
    UnweightedCountsInner
);

impl UnweightedCounts {
    pub fn new(counts: impl Into<InterpretedBuffer>) -> Result<Self> {
        let counts = counts.into();
        let node = Self(Rc::new(UnweightedCountsInner {
            link: Link::default(),
            counts: Field::new(&UNWEIGHTED_COUNTS, counts.clone()),
        }));
        Claims::new()
            .one(&UNWEIGHTED_COUNTS, &counts)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn counts(&self) -> InterpretedBuffer {
        self.0.counts.get()
    }

    pub fn set_counts(&self, counts: impl Into<InterpretedBuffer>) -> Result<()> {
        let counts = counts.into();
        Claims::new()
            .one(&UNWEIGHTED_COUNTS, &counts)
            .commit(&self.weak())?;
        self.0.counts.set(counts);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<UnweightedCountsRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<UnweightedCountsInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            UnweightedCountsInner {
                link: Link::attached(parent),
                counts: Field::lazy(&UNWEIGHTED_COUNTS, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.counts, me.clone())
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> UnweightedCountsRecord {
        UnweightedCountsRecord {
            counts: self.counts().to_record(),
        }
    }
}

impl Validate for UnweightedCounts {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.counts().validate(context)
    }
}

// WeightedCounts

static WEIGHTED_SUMW: FieldDesc = FieldDesc::new("WeightedCounts", "sumw").required();
static WEIGHTED_SUMW2: FieldDesc = FieldDesc::new("WeightedCounts", "sumw2").required();
static WEIGHTED_COUNTS: FieldDesc = FieldDesc::new("WeightedCounts", "counts");

pub(crate) struct WeightedCountsInner {
    link: Link,
    sumw: Field<InterpretedBuffer>,
    sumw2: Field<InterpretedBuffer>,
    counts: Field<Option<UnweightedCounts>>,
}

node_handle!(
    /// Sums of weights and squared weights per bin
    WeightedCounts,
    WeightedCountsInner
);

impl WeightedCounts {
    pub fn new(sumw: impl Into<InterpretedBuffer>, sumw2: impl Into<InterpretedBuffer>) -> Result<Self> {
        let (sumw, sumw2) = (sumw.into(), sumw2.into());
        let node = Self(Rc::new(WeightedCountsInner {
            link: Link::default(),
            sumw: Field::new(&WEIGHTED_SUMW, sumw.clone()),
            sumw2: Field::new(&WEIGHTED_SUMW2, sumw2.clone()),
            counts: Field::new(&WEIGHTED_COUNTS, None),
        }));
        Claims::new()
            .one(&WEIGHTED_SUMW, &sumw)
            .one(&WEIGHTED_SUMW2, &sumw2)
            .commit(&node.weak())?;
        Ok(node)
    }

    /// Attach the unweighted entry counts alongside the weights
    pub fn with_counts(self, counts: UnweightedCounts) -> Result<Self> {
        self.set_counts(Some(counts))?;
        Ok(self)
    }

    pub fn sumw(&self) -> InterpretedBuffer {
        self.0.sumw.get()
    }

    pub fn set_sumw(&self, sumw: impl Into<InterpretedBuffer>) -> Result<()> {
        let sumw = sumw.into();
        Claims::new().one(&WEIGHTED_SUMW, &sumw).commit(&self.weak())?;
        self.0.sumw.set(sumw);
        Ok(())
    }

    pub fn sumw2(&self) -> InterpretedBuffer {
        self.0.sumw2.get()
    }

    pub fn set_sumw2(&self, sumw2: impl Into<InterpretedBuffer>) -> Result<()> {
        let sumw2 = sumw2.into();
        Claims::new().one(&WEIGHTED_SUMW2, &sumw2).commit(&self.weak())?;
        self.0.sumw2.set(sumw2);
        Ok(())
    }

    pub fn counts(&self) -> Option<UnweightedCounts> {
        self.0.counts.get()
    }

    pub fn set_counts(&self, counts: Option<UnweightedCounts>) -> Result<()> {
        Claims::new()
            .opt(&WEIGHTED_COUNTS, &counts)
            .commit(&self.weak())?;
        self.0.counts.set(counts);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<WeightedCountsRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<WeightedCountsInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            WeightedCountsInner {
                link: Link::attached(parent),
                sumw: Field::lazy(&WEIGHTED_SUMW, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.sumw, me.clone())
                }),
                sumw2: Field::lazy(&WEIGHTED_SUMW2, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.sumw2, me.clone())
                }),
                counts: Field::lazy(&WEIGHTED_COUNTS, record, &me, |r, me| {
                    r.counts
                        .as_ref()
                        .map(|c| UnweightedCounts::from_record(c, me.clone()))
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> WeightedCountsRecord {
        WeightedCountsRecord {
            sumw: self.sumw().to_record(),
            sumw2: self.sumw2().to_record(),
            counts: self.counts().map(|c| Rc::new(c.to_record())),
        }
    }
}

impl Validate for WeightedCounts {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.sumw().validate(context)?;
        self.sumw2().validate(context)?;
        self.counts().validate(context)?;
        Ok(context.to_vec())
    }
}

node_union!(
    /// Unweighted or weighted counts
    Counts {
        Unweighted(UnweightedCounts),
        Weighted(WeightedCounts),
    }
);

impl Counts {
    pub(crate) fn from_record(record: &CountsRecord, parent: Weak<dyn NodeInner>) -> Self {
        match record {
            CountsRecord::Unweighted(r) => UnweightedCounts::from_record(r, parent).into(),
            CountsRecord::Weighted(r) => WeightedCounts::from_record(r, parent).into(),
        }
    }

    pub(crate) fn to_record(&self) -> CountsRecord {
        match self {
            Counts::Unweighted(c) => CountsRecord::Unweighted(Rc::new(c.to_record())),
            Counts::Weighted(c) => CountsRecord::Weighted(Rc::new(c.to_record())),
        }
    }
}

impl Validate for Counts {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        match self {
            Counts::Unweighted(c) => c.validate(context),
            Counts::Weighted(c) => c.validate(context),
        }
    }
}

// Correlation

static CORRELATION_SUMWX: FieldDesc = FieldDesc::new("Correlation", "sumwx").required();
static CORRELATION_SUMWXY: FieldDesc = FieldDesc::new("Correlation", "sumwxy").required();

pub(crate) struct CorrelationInner {
    link: Link,
    sumwx: Field<InterpretedBuffer>,
    sumwxy: Field<InterpretedBuffer>,
}

node_handle!(
    /// Weighted first and joint second moments of two quantities
    Correlation,
    CorrelationInner
);

impl Correlation {
    pub fn new(sumwx: impl Into<InterpretedBuffer>, sumwxy: impl Into<InterpretedBuffer>) -> Result<Self> {
        let (sumwx, sumwxy) = (sumwx.into(), sumwxy.into());
        let node = Self(Rc::new(CorrelationInner {
            link: Link::default(),
            sumwx: Field::new(&CORRELATION_SUMWX, sumwx.clone()),
            sumwxy: Field::new(&CORRELATION_SUMWXY, sumwxy.clone()),
        }));
        Claims::new()
            .one(&CORRELATION_SUMWX, &sumwx)
            .one(&CORRELATION_SUMWXY, &sumwxy)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn sumwx(&self) -> InterpretedBuffer {
        self.0.sumwx.get()
    }

    pub fn sumwxy(&self) -> InterpretedBuffer {
        self.0.sumwxy.get()
    }

    pub(crate) fn from_record(record: &Rc<CorrelationRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<CorrelationInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            CorrelationInner {
                link: Link::attached(parent),
                sumwx: Field::lazy(&CORRELATION_SUMWX, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.sumwx, me.clone())
                }),
                sumwxy: Field::lazy(&CORRELATION_SUMWXY, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.sumwxy, me.clone())
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> CorrelationRecord {
        CorrelationRecord {
            sumwx: self.sumwx().to_record(),
            sumwxy: self.sumwxy().to_record(),
        }
    }
}

impl Validate for Correlation {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.sumwx().validate(context)?;
        self.sumwxy().validate(context)?;
        Ok(context.to_vec())
    }
}

// Extremes

static EXTREMES_MIN: FieldDesc = FieldDesc::new("Extremes", "min").required();
static EXTREMES_MAX: FieldDesc = FieldDesc::new("Extremes", "max").required();
static EXTREMES_MINF: FieldDesc = FieldDesc::new("Extremes", "excludes_minf");
static EXTREMES_PINF: FieldDesc = FieldDesc::new("Extremes", "excludes_pinf");
static EXTREMES_NAN: FieldDesc = FieldDesc::new("Extremes", "excludes_nan");

pub(crate) struct ExtremesInner {
    link: Link,
    min: Field<InterpretedBuffer>,
    max: Field<InterpretedBuffer>,
    excludes_minf: Field<bool>,
    excludes_pinf: Field<bool>,
    excludes_nan: Field<bool>,
}

node_handle!(
    /// Smallest and largest values seen
    Extremes,
    ExtremesInner
);

impl Extremes {
    pub fn new(min: impl Into<InterpretedBuffer>, max: impl Into<InterpretedBuffer>) -> Result<Self> {
        let (min, max) = (min.into(), max.into());
        let node = Self(Rc::new(ExtremesInner {
            link: Link::default(),
            min: Field::new(&EXTREMES_MIN, min.clone()),
            max: Field::new(&EXTREMES_MAX, max.clone()),
            excludes_minf: Field::new(&EXTREMES_MINF, false),
            excludes_pinf: Field::new(&EXTREMES_PINF, false),
            excludes_nan: Field::new(&EXTREMES_NAN, false),
        }));
        Claims::new()
            .one(&EXTREMES_MIN, &min)
            .one(&EXTREMES_MAX, &max)
            .commit(&node.weak())?;
        Ok(node)
    }

    /// Declare which non-real inputs were left out of the extremes
    pub fn with_excludes(self, minf: bool, pinf: bool, nan: bool) -> Self {
        self.0.excludes_minf.set(minf);
        self.0.excludes_pinf.set(pinf);
        self.0.excludes_nan.set(nan);
        self
    }

    pub fn min(&self) -> InterpretedBuffer {
        self.0.min.get()
    }

    pub fn max(&self) -> InterpretedBuffer {
        self.0.max.get()
    }

    pub fn excludes_minf(&self) -> bool {
        self.0.excludes_minf.get()
    }

    pub fn excludes_pinf(&self) -> bool {
        self.0.excludes_pinf.get()
    }

    pub fn excludes_nan(&self) -> bool {
        self.0.excludes_nan.get()
    }

    pub(crate) fn from_record(record: &Rc<ExtremesRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<ExtremesInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            ExtremesInner {
                link: Link::attached(parent),
                min: Field::lazy(&EXTREMES_MIN, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.min, me.clone())
                }),
                max: Field::lazy(&EXTREMES_MAX, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.max, me.clone())
                }),
                excludes_minf: Field::new(&EXTREMES_MINF, record.excludes_minf),
                excludes_pinf: Field::new(&EXTREMES_PINF, record.excludes_pinf),
                excludes_nan: Field::new(&EXTREMES_NAN, record.excludes_nan),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> ExtremesRecord {
        ExtremesRecord {
            min: self.min().to_record(),
            max: self.max().to_record(),
            excludes_minf: self.excludes_minf(),
            excludes_pinf: self.excludes_pinf(),
            excludes_nan: self.excludes_nan(),
        }
    }
}

impl Validate for Extremes {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.min().validate(context)?;
        self.max().validate(context)?;
        Ok(context.to_vec())
    }
}

// Moments

static MOMENTS_SUMWN: FieldDesc = FieldDesc::new("Moments", "sumwn").required();
static MOMENTS_N: FieldDesc = FieldDesc::new("Moments", "n").required().at_least(1);

pub(crate) struct MomentsInner {
    link: Link,
    sumwn: Field<InterpretedBuffer>,
    n: Field<i64>,
}

node_handle!(
    /// Weighted sum of the `n`-th power of a quantity
    Moments,
    MomentsInner
);

impl Moments {
    pub fn new(sumwn: impl Into<InterpretedBuffer>, n: i64) -> Result<Self> {
        MOMENTS_N.check_int(n)?;
        let sumwn = sumwn.into();
        let node = Self(Rc::new(MomentsInner {
            link: Link::default(),
            sumwn: Field::new(&MOMENTS_SUMWN, sumwn.clone()),
            n: Field::new(&MOMENTS_N, n),
        }));
        Claims::new()
            .one(&MOMENTS_SUMWN, &sumwn)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn sumwn(&self) -> InterpretedBuffer {
        self.0.sumwn.get()
    }

    pub fn n(&self) -> i64 {
        self.0.n.get()
    }

    pub fn set_n(&self, n: i64) -> Result<()> {
        MOMENTS_N.check_int(n)?;
        self.0.n.set(n);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<MomentsRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<MomentsInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            MomentsInner {
                link: Link::attached(parent),
                sumwn: Field::lazy(&MOMENTS_SUMWN, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.sumwn, me.clone())
                }),
                n: Field::new(&MOMENTS_N, record.n),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> MomentsRecord {
        MomentsRecord {
            sumwn: self.sumwn().to_record(),
            n: self.n(),
        }
    }
}

impl Validate for Moments {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(MOMENTS_N.check_int(self.n()))?;
        self.sumwn().validate(context)
    }
}

// Quantiles

static QUANTILES_VALUES: FieldDesc = FieldDesc::new("Quantiles", "values").required();
static QUANTILES_P: FieldDesc = FieldDesc::new("Quantiles", "p").real(0.0, 1.0, true, true);

pub(crate) struct QuantilesInner {
    link: Link,
    values: Field<InterpretedBuffer>,
    p: Field<f64>,
}

node_handle!(
    /// Value below which a fraction `p` of entries fall; the median by default
    Quantiles,
    QuantilesInner
);

impl Quantiles {
    pub fn new(values: impl Into<InterpretedBuffer>) -> Result<Self> {
        let values = values.into();
        let node = Self(Rc::new(QuantilesInner {
            link: Link::default(),
            values: Field::new(&QUANTILES_VALUES, values.clone()),
            p: Field::new(&QUANTILES_P, 0.5),
        }));
        Claims::new()
            .one(&QUANTILES_VALUES, &values)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_p(self, p: f64) -> Result<Self> {
        self.set_p(p)?;
        Ok(self)
    }

    pub fn values(&self) -> InterpretedBuffer {
        self.0.values.get()
    }

    pub fn p(&self) -> f64 {
        self.0.p.get()
    }

    pub fn set_p(&self, p: f64) -> Result<()> {
        QUANTILES_P.check_real(p)?;
        self.0.p.set(p);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<QuantilesRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<QuantilesInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            QuantilesInner {
                link: Link::attached(parent),
                values: Field::lazy(&QUANTILES_VALUES, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.values, me.clone())
                }),
                p: Field::new(&QUANTILES_P, record.p),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> QuantilesRecord {
        QuantilesRecord {
            values: self.values().to_record(),
            p: self.p(),
        }
    }
}

impl Validate for Quantiles {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(QUANTILES_P.check_real(self.p()))?;
        self.values().validate(context)
    }
}

// GenericErrors

static ERRORS_ERRORS: FieldDesc = FieldDesc::new("GenericErrors", "errors").required();
static ERRORS_P: FieldDesc = FieldDesc::new("GenericErrors", "p").real(0.0, 1.0, true, true);

pub(crate) struct GenericErrorsInner {
    link: Link,
    errors: Field<InterpretedBuffer>,
    p: Field<f64>,
}

node_handle!(
    /// Uncertainties with coverage probability `p`, one sigma by default
    GenericErrors,
    GenericErrorsInner
);

impl GenericErrors {
    pub fn new(errors: impl Into<InterpretedBuffer>) -> Result<Self> {
        let errors = errors.into();
        let node = Self(Rc::new(GenericErrorsInner {
            link: Link::default(),
            errors: Field::new(&ERRORS_ERRORS, errors.clone()),
            p: Field::new(&ERRORS_P, ONE_SIGMA),
        }));
        Claims::new()
            .one(&ERRORS_ERRORS, &errors)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_p(self, p: f64) -> Result<Self> {
        self.set_p(p)?;
        Ok(self)
    }

    pub fn errors(&self) -> InterpretedBuffer {
        self.0.errors.get()
    }

    pub fn p(&self) -> f64 {
        self.0.p.get()
    }

    pub fn set_p(&self, p: f64) -> Result<()> {
        ERRORS_P.check_real(p)?;
        self.0.p.set(p);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<GenericErrorsRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<GenericErrorsInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            GenericErrorsInner {
                link: Link::attached(parent),
                errors: Field::lazy(&ERRORS_ERRORS, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.errors, me.clone())
                }),
                p: Field::new(&ERRORS_P, record.p),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> GenericErrorsRecord {
        GenericErrorsRecord {
            errors: self.errors().to_record(),
            p: self.p(),
        }
    }
}

impl Validate for GenericErrors {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(ERRORS_P.check_real(self.p()))?;
        self.errors().validate(context)
    }
}

// DistributionStats

static STATS_CORRELATION: FieldDesc = FieldDesc::new("DistributionStats", "correlation");
static STATS_EXTREMES: FieldDesc = FieldDesc::new("DistributionStats", "extremes");
static STATS_MOMENTS: FieldDesc = FieldDesc::new("DistributionStats", "moments");
static STATS_QUANTILES: FieldDesc = FieldDesc::new("DistributionStats", "quantiles");
static STATS_ERRORS: FieldDesc = FieldDesc::new("DistributionStats", "generic_errors");

pub(crate) struct DistributionStatsInner {
    link: Link,
    correlation: Field<Option<Correlation>>,
    extremes: Field<Option<Extremes>>,
    moments: Field<Vec<Moments>>,
    quantiles: Field<Vec<Quantiles>>,
    generic_errors: Field<Vec<GenericErrors>>,
}

node_handle!(
    /// Optional summaries of the distribution of a quantity
    DistributionStats,
    DistributionStatsInner
);

impl DistributionStats {
    pub fn new() -> Self {
        Self(Rc::new(DistributionStatsInner {
            link: Link::default(),
            correlation: Field::new(&STATS_CORRELATION, None),
            extremes: Field::new(&STATS_EXTREMES, None),
            moments: Field::new(&STATS_MOMENTS, Vec::new()),
            quantiles: Field::new(&STATS_QUANTILES, Vec::new()),
            generic_errors: Field::new(&STATS_ERRORS, Vec::new()),
        }))
    }

    pub fn with_correlation(self, correlation: Correlation) -> Result<Self> {
        self.set_correlation(Some(correlation))?;
        Ok(self)
    }

    pub fn with_extremes(self, extremes: Extremes) -> Result<Self> {
        self.set_extremes(Some(extremes))?;
        Ok(self)
    }

    pub fn with_moments(self, moments: Vec<Moments>) -> Result<Self> {
        self.set_moments(moments)?;
        Ok(self)
    }

    pub fn with_quantiles(self, quantiles: Vec<Quantiles>) -> Result<Self> {
        self.set_quantiles(quantiles)?;
        Ok(self)
    }

    pub fn with_generic_errors(self, errors: Vec<GenericErrors>) -> Result<Self> {
        self.set_generic_errors(errors)?;
        Ok(self)
    }

    pub fn correlation(&self) -> Option<Correlation> {
        self.0.correlation.get()
    }

    pub fn set_correlation(&self, correlation: Option<Correlation>) -> Result<()> {
        Claims::new()
            .opt(&STATS_CORRELATION, &correlation)
            .commit(&self.weak())?;
        self.0.correlation.set(correlation);
        Ok(())
    }

    pub fn extremes(&self) -> Option<Extremes> {
        self.0.extremes.get()
    }

    pub fn set_extremes(&self, extremes: Option<Extremes>) -> Result<()> {
        Claims::new()
            .opt(&STATS_EXTREMES, &extremes)
            .commit(&self.weak())?;
        self.0.extremes.set(extremes);
        Ok(())
    }

    pub fn moments(&self) -> Vec<Moments> {
        self.0.moments.get()
    }

    pub fn set_moments(&self, moments: Vec<Moments>) -> Result<()> {
        Claims::new()
            .all(&STATS_MOMENTS, &moments)
            .commit(&self.weak())?;
        self.0.moments.set(moments);
        Ok(())
    }

    pub fn quantiles(&self) -> Vec<Quantiles> {
        self.0.quantiles.get()
    }

    pub fn set_quantiles(&self, quantiles: Vec<Quantiles>) -> Result<()> {
        Claims::new()
            .all(&STATS_QUANTILES, &quantiles)
            .commit(&self.weak())?;
        self.0.quantiles.set(quantiles);
        Ok(())
    }

    pub fn generic_errors(&self) -> Vec<GenericErrors> {
        self.0.generic_errors.get()
    }

    pub fn set_generic_errors(&self, errors: Vec<GenericErrors>) -> Result<()> {
        Claims::new()
            .all(&STATS_ERRORS, &errors)
            .commit(&self.weak())?;
        self.0.generic_errors.set(errors);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<DistributionStatsRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<DistributionStatsInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            DistributionStatsInner {
                link: Link::attached(parent),
                correlation: Field::lazy(&STATS_CORRELATION, record, &me, |r, me| {
                    r.correlation
                        .as_ref()
                        .map(|c| Correlation::from_record(c, me.clone()))
                }),
                extremes: Field::lazy(&STATS_EXTREMES, record, &me, |r, me| {
                    r.extremes
                        .as_ref()
                        .map(|e| Extremes::from_record(e, me.clone()))
                }),
                moments: Field::lazy(&STATS_MOMENTS, record, &me, |r, me| {
                    r.moments
                        .iter()
                        .map(|m| Moments::from_record(m, me.clone()))
                        .collect()
                }),
                quantiles: Field::lazy(&STATS_QUANTILES, record, &me, |r, me| {
                    r.quantiles
                        .iter()
                        .map(|q| Quantiles::from_record(q, me.clone()))
                        .collect()
                }),
                generic_errors: Field::lazy(&STATS_ERRORS, record, &me, |r, me| {
                    r.generic_errors
                        .iter()
                        .map(|e| GenericErrors::from_record(e, me.clone()))
                        .collect()
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> DistributionStatsRecord {
        DistributionStatsRecord {
            correlation: self.correlation().map(|c| Rc::new(c.to_record())),
            extremes: self.extremes().map(|e| Rc::new(e.to_record())),
            moments: self.moments().iter().map(|m| Rc::new(m.to_record())).collect(),
            quantiles: self.quantiles().iter().map(|q| Rc::new(q.to_record())).collect(),
            generic_errors: self
                .generic_errors()
                .iter()
                .map(|e| Rc::new(e.to_record()))
                .collect(),
        }
    }
}

impl Default for DistributionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Validate for DistributionStats {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.correlation().validate(context)?;
        self.extremes().validate(context)?;
        validate_all(&self.moments(), context)?;
        validate_all(&self.quantiles(), context)?;
        validate_all(&self.generic_errors(), context)?;
        Ok(context.to_vec())
    }
}

// Distribution

static DISTRIBUTION_COUNTS: FieldDesc = FieldDesc::new("Distribution", "counts").required();
static DISTRIBUTION_STATS: FieldDesc = FieldDesc::new("Distribution", "stats");

pub(crate) struct DistributionInner {
    link: Link,
    counts: Field<Counts>,
    stats: Field<Option<DistributionStats>>,
}

node_handle!(
    /// Binned counts with optional per-bin statistics
    Distribution,
    DistributionInner
);

impl Distribution {
    pub fn new(counts: impl Into<Counts>) -> Result<Self> {
        let counts = counts.into();
        let node = Self(Rc::new(DistributionInner {
            link: Link::default(),
            counts: Field::new(&DISTRIBUTION_COUNTS, counts.clone()),
            stats: Field::new(&DISTRIBUTION_STATS, None),
        }));
        Claims::new()
            .one(&DISTRIBUTION_COUNTS, &counts)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_stats(self, stats: DistributionStats) -> Result<Self> {
        self.set_stats(Some(stats))?;
        Ok(self)
    }

    pub fn counts(&self) -> Counts {
        self.0.counts.get()
    }

    pub fn set_counts(&self, counts: impl Into<Counts>) -> Result<()> {
        let counts = counts.into();
        Claims::new()
            .one(&DISTRIBUTION_COUNTS, &counts)
            .commit(&self.weak())?;
        self.0.counts.set(counts);
        Ok(())
    }

    pub fn stats(&self) -> Option<DistributionStats> {
        self.0.stats.get()
    }

    pub fn set_stats(&self, stats: Option<DistributionStats>) -> Result<()> {
        Claims::new()
            .opt(&DISTRIBUTION_STATS, &stats)
            .commit(&self.weak())?;
        self.0.stats.set(stats);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<DistributionRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<DistributionInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            DistributionInner {
                link: Link::attached(parent),
                counts: Field::lazy(&DISTRIBUTION_COUNTS, record, &me, |r, me| {
                    Counts::from_record(&r.counts, me.clone())
                }),
                stats: Field::lazy(&DISTRIBUTION_STATS, record, &me, |r, me| {
                    r.stats
                        .as_ref()
                        .map(|s| DistributionStats::from_record(s, me.clone()))
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> DistributionRecord {
        DistributionRecord {
            counts: self.counts().to_record(),
            stats: self.stats().map(|s| Rc::new(s.to_record())),
        }
    }
}

impl Validate for Distribution {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.counts().validate(context)?;
        self.stats().validate(context)?;
        Ok(context.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InterpretedInlineBuffer;
    use crate::ErrorCategory;

    fn zeros(n: usize) -> InterpretedInlineBuffer {
        InterpretedInlineBuffer::from_values(&vec![0.0f64; n])
    }

    #[test]
    fn test_weighted_counts_validate_every_buffer() {
        let counts = WeightedCounts::new(zeros(6), zeros(6))
            .unwrap()
            .with_counts(UnweightedCounts::new(zeros(6)).unwrap())
            .unwrap();
        assert!(counts.validate(&[2, 3]).is_ok());

        let counts = WeightedCounts::new(zeros(6), zeros(5)).unwrap();
        assert!(counts.validate(&[6]).unwrap_err().is_structural());
    }

    #[test]
    fn test_stats_constraints() {
        assert!(Moments::new(zeros(1), 0).is_err());
        let moments = Moments::new(zeros(1), 2).unwrap();
        assert_eq!(moments.n(), 2);

        let err = Quantiles::new(zeros(1)).unwrap().with_p(1.5).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));

        let errors = GenericErrors::new(zeros(1)).unwrap();
        assert_eq!(errors.p(), ONE_SIGMA);
    }

    #[test]
    fn test_distribution_stats() {
        let stats = DistributionStats::new()
            .with_extremes(Extremes::new(zeros(4), zeros(4)).unwrap().with_excludes(true, true, false))
            .unwrap()
            .with_moments(vec![
                Moments::new(zeros(4), 1).unwrap(),
                Moments::new(zeros(4), 2).unwrap(),
            ])
            .unwrap();
        let distribution = Distribution::new(UnweightedCounts::new(zeros(4)).unwrap())
            .unwrap()
            .with_stats(stats)
            .unwrap();
        assert!(distribution.validate(&[4]).is_ok());
        assert!(distribution.validate(&[3]).is_err());
    }

    #[test]
    fn test_buffer_cannot_feed_two_counts() {
        let buffer = zeros(3);
        let _counts = UnweightedCounts::new(buffer.clone()).unwrap();
        let err = Correlation::new(zeros(3), buffer).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Ownership));
    }
}
