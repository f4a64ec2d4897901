//! Axes, profiles and histograms
//!
//! A histogram's bin shape is the concatenation of its axes' shapes. The
//! distribution, every profile and every per-profile statistic hold one
//! element per bin of that shape; unbinned statistics hold one element per
//! bin of the enclosing context only.

use std::rc::{Rc, Weak};

use histbuf_core::wire::{AxisRecord, HistogramRecord, ProfileRecord};

use crate::attribute::{revalidate, Claims, Field, FieldDesc};
use crate::binning::Binning;
use crate::collection::forget_key;
use crate::error::{structure, Result};
use crate::function::Function;
use crate::metadata::{AnnotationDescs, Annotations};
use crate::node::{Link, NodeInner};
use crate::stats::{Distribution, DistributionStats};
use crate::validate::{extend, validate_all, Shape, Validate};

/// Concatenated shapes of `axes`, each validated inside `context`
pub(crate) fn binshape(axes: &[Axis], context: &[usize]) -> Result<Shape> {
    let mut shape = Shape::with_capacity(axes.len());
    for axis in axes {
        shape.extend(axis.validate(context)?);
    }
    Ok(shape)
}

// Axis

static AXIS_BINNING: FieldDesc = FieldDesc::new("Axis", "binning");
static AXIS_EXPRESSION: FieldDesc = FieldDesc::new("Axis", "expression");
static AXIS_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("Axis");

pub(crate) struct AxisInner {
    link: Link,
    binning: Field<Option<Binning>>,
    expression: Field<String>,
    annotations: Annotations,
}

node_handle!(
    /// One dimension of a histogram: a binning plus what is binned
    Axis,
    AxisInner
);

annotated!(Axis);

impl Axis {
    /// An axis with no binning, which holds a single bin
    pub fn new() -> Self {
        Self(Rc::new(AxisInner {
            link: Link::default(),
            binning: Field::new(&AXIS_BINNING, None),
            expression: Field::new(&AXIS_EXPRESSION, String::new()),
            annotations: Annotations::new(&AXIS_ANNOTATIONS),
        }))
    }

    pub fn with_binning(self, binning: impl Into<Binning>) -> Result<Self> {
        self.set_binning(Some(binning.into()))?;
        Ok(self)
    }

    pub fn with_expression(self, expression: impl Into<String>) -> Self {
        self.set_expression(expression);
        self
    }

    pub fn binning(&self) -> Option<Binning> {
        self.0.binning.get()
    }

    pub fn set_binning(&self, binning: Option<Binning>) -> Result<()> {
        Claims::new()
            .opt(&AXIS_BINNING, &binning)
            .commit(&self.weak())?;
        self.0.binning.set(binning);
        Ok(())
    }

    pub fn expression(&self) -> String {
        self.0.expression.get()
    }

    pub fn set_expression(&self, expression: impl Into<String>) {
        self.0.expression.set(expression.into());
    }

    pub(crate) fn from_record(record: &Rc<AxisRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<AxisInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            AxisInner {
                link: Link::attached(parent),
                binning: Field::lazy(&AXIS_BINNING, record, &me, |r, me| {
                    r.binning
                        .as_ref()
                        .map(|b| Binning::from_record(b, me.clone()))
                }),
                expression: Field::new(&AXIS_EXPRESSION, record.expression.clone()),
                annotations: Annotations::decoded(
                    &AXIS_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> AxisRecord {
        AxisRecord {
            binning: self.binning().map(|b| b.to_record()),
            expression: self.expression(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }
}

impl Default for Axis {
    fn default() -> Self {
        Self::new()
    }
}

impl Validate for Axis {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.0.annotations.validate(context)?;
        match self.binning() {
            Some(binning) => binning.validate(context),
            None => Ok(vec![1]),
        }
    }
}

// Profile

static PROFILE_EXPRESSION: FieldDesc = FieldDesc::new("Profile", "expression").required();
static PROFILE_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("Profile");

pub(crate) struct ProfileInner {
    link: Link,
    expression: Field<String>,
    annotations: Annotations,
}

node_handle!(
    /// A quantity averaged per bin; its statistics live in the histogram's
    /// `profile_stats`
    Profile,
    ProfileInner
);

annotated!(Profile);

impl Profile {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(Rc::new(ProfileInner {
            link: Link::default(),
            expression: Field::new(&PROFILE_EXPRESSION, expression.into()),
            annotations: Annotations::new(&PROFILE_ANNOTATIONS),
        }))
    }

    pub fn expression(&self) -> String {
        self.0.expression.get()
    }

    pub fn set_expression(&self, expression: impl Into<String>) {
        self.0.expression.set(expression.into());
    }

    pub(crate) fn from_record(record: &Rc<ProfileRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<ProfileInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            ProfileInner {
                link: Link::attached(parent),
                expression: Field::new(&PROFILE_EXPRESSION, record.expression.clone()),
                annotations: Annotations::decoded(
                    &PROFILE_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> ProfileRecord {
        ProfileRecord {
            expression: self.expression(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }
}

impl Validate for Profile {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        self.0.annotations.validate(context)?;
        Ok(context.to_vec())
    }
}

// Histogram

static HISTOGRAM_IDENTIFIER: FieldDesc = FieldDesc::new("Histogram", "identifier")
    .required()
    .identifier();
static HISTOGRAM_AXIS: FieldDesc = FieldDesc::new("Histogram", "axis").required().min_len(1);
static HISTOGRAM_DISTRIBUTION: FieldDesc = FieldDesc::new("Histogram", "distribution").required();
static HISTOGRAM_PROFILES: FieldDesc = FieldDesc::new("Histogram", "profiles");
static HISTOGRAM_UNBINNED_STATS: FieldDesc = FieldDesc::new("Histogram", "unbinned_stats");
static HISTOGRAM_PROFILE_STATS: FieldDesc = FieldDesc::new("Histogram", "profile_stats");
static HISTOGRAM_FUNCTIONS: FieldDesc = FieldDesc::new("Histogram", "functions").keyed(0);
static HISTOGRAM_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("Histogram");

pub(crate) struct HistogramInner {
    link: Link,
    identifier: Field<String>,
    axis: Field<Vec<Axis>>,
    distribution: Field<Distribution>,
    profiles: Field<Vec<Profile>>,
    unbinned_stats: Field<Vec<DistributionStats>>,
    profile_stats: Field<Vec<DistributionStats>>,
    functions: Field<Vec<Function>>,
    annotations: Annotations,
}

node_handle!(
    /// Binned counts over one or more axes
    Histogram,
    HistogramInner
);

annotated!(Histogram);

fn function_keys(functions: &[Function]) -> Result<()> {
    let keys: Vec<String> = functions.iter().map(Function::identifier).collect();
    HISTOGRAM_FUNCTIONS.check_keys(keys.iter().map(String::as_str))
}

impl Histogram {
    pub fn new(identifier: impl Into<String>, axis: Vec<Axis>, distribution: Distribution) -> Result<Self> {
        let identifier = identifier.into();
        HISTOGRAM_IDENTIFIER.check_text(&identifier)?;
        HISTOGRAM_AXIS.check_len(axis.len())?;
        let node = Self(Rc::new(HistogramInner {
            link: Link::default(),
            identifier: Field::new(&HISTOGRAM_IDENTIFIER, identifier),
            axis: Field::new(&HISTOGRAM_AXIS, axis.clone()),
            distribution: Field::new(&HISTOGRAM_DISTRIBUTION, distribution.clone()),
            profiles: Field::new(&HISTOGRAM_PROFILES, Vec::new()),
            unbinned_stats: Field::new(&HISTOGRAM_UNBINNED_STATS, Vec::new()),
            profile_stats: Field::new(&HISTOGRAM_PROFILE_STATS, Vec::new()),
            functions: Field::new(&HISTOGRAM_FUNCTIONS, Vec::new()),
            annotations: Annotations::new(&HISTOGRAM_ANNOTATIONS),
        }));
        Claims::new()
            .all(&HISTOGRAM_AXIS, &axis)
            .one(&HISTOGRAM_DISTRIBUTION, &distribution)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_profiles(self, profiles: Vec<Profile>) -> Result<Self> {
        self.set_profiles(profiles)?;
        Ok(self)
    }

    pub fn with_unbinned_stats(self, stats: Vec<DistributionStats>) -> Result<Self> {
        self.set_unbinned_stats(stats)?;
        Ok(self)
    }

    pub fn with_profile_stats(self, stats: Vec<DistributionStats>) -> Result<Self> {
        self.set_profile_stats(stats)?;
        Ok(self)
    }

    pub fn with_functions(self, functions: Vec<Function>) -> Result<Self> {
        self.set_functions(functions)?;
        Ok(self)
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn set_identifier(&self, identifier: impl Into<String>) -> Result<()> {
        let identifier = identifier.into();
        HISTOGRAM_IDENTIFIER.check_text(&identifier)?;
        self.0.identifier.set(identifier);
        forget_key(&self.0.link);
        Ok(())
    }

    pub fn axis(&self) -> Vec<Axis> {
        self.0.axis.get()
    }

    pub fn set_axis(&self, axis: Vec<Axis>) -> Result<()> {
        HISTOGRAM_AXIS.check_len(axis.len())?;
        Claims::new().all(&HISTOGRAM_AXIS, &axis).commit(&self.weak())?;
        self.0.axis.set(axis);
        Ok(())
    }

    pub fn distribution(&self) -> Distribution {
        self.0.distribution.get()
    }

    pub fn set_distribution(&self, distribution: Distribution) -> Result<()> {
        Claims::new()
            .one(&HISTOGRAM_DISTRIBUTION, &distribution)
            .commit(&self.weak())?;
        self.0.distribution.set(distribution);
        Ok(())
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.0.profiles.get()
    }

    pub fn set_profiles(&self, profiles: Vec<Profile>) -> Result<()> {
        Claims::new()
            .all(&HISTOGRAM_PROFILES, &profiles)
            .commit(&self.weak())?;
        self.0.profiles.set(profiles);
        Ok(())
    }

    pub fn unbinned_stats(&self) -> Vec<DistributionStats> {
        self.0.unbinned_stats.get()
    }

    pub fn set_unbinned_stats(&self, stats: Vec<DistributionStats>) -> Result<()> {
        Claims::new()
            .all(&HISTOGRAM_UNBINNED_STATS, &stats)
            .commit(&self.weak())?;
        self.0.unbinned_stats.set(stats);
        Ok(())
    }

    pub fn profile_stats(&self) -> Vec<DistributionStats> {
        self.0.profile_stats.get()
    }

    pub fn set_profile_stats(&self, stats: Vec<DistributionStats>) -> Result<()> {
        Claims::new()
            .all(&HISTOGRAM_PROFILE_STATS, &stats)
            .commit(&self.weak())?;
        self.0.profile_stats.set(stats);
        Ok(())
    }

    pub fn functions(&self) -> Vec<Function> {
        self.0.functions.get()
    }

    pub fn set_functions(&self, functions: Vec<Function>) -> Result<()> {
        function_keys(&functions)?;
        Claims::new()
            .all(&HISTOGRAM_FUNCTIONS, &functions)
            .commit(&self.weak())?;
        self.0.functions.set(functions);
        Ok(())
    }

    /// Shape of the bins spanned by the axes, outermost axis first
    pub fn binshape(&self) -> Result<Shape> {
        binshape(&self.axis(), &[])
    }

    pub(crate) fn from_record(record: &Rc<HistogramRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<HistogramInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            HistogramInner {
                link: Link::attached(parent),
                identifier: Field::new(&HISTOGRAM_IDENTIFIER, record.identifier.clone()),
                axis: Field::lazy(&HISTOGRAM_AXIS, record, &me, |r, me| {
                    r.axis
                        .iter()
                        .map(|a| Axis::from_record(a, me.clone()))
                        .collect()
                }),
                distribution: Field::lazy(&HISTOGRAM_DISTRIBUTION, record, &me, |r, me| {
                    Distribution::from_record(&r.distribution, me.clone())
                }),
                profiles: Field::lazy(&HISTOGRAM_PROFILES, record, &me, |r, me| {
                    r.profiles
                        .iter()
                        .map(|p| Profile::from_record(p, me.clone()))
                        .collect()
                }),
                unbinned_stats: Field::lazy(&HISTOGRAM_UNBINNED_STATS, record, &me, |r, me| {
                    r.unbinned_stats
                        .iter()
                        .map(|s| DistributionStats::from_record(s, me.clone()))
                        .collect()
                }),
                profile_stats: Field::lazy(&HISTOGRAM_PROFILE_STATS, record, &me, |r, me| {
                    r.profile_stats
                        .iter()
                        .map(|s| DistributionStats::from_record(s, me.clone()))
                        .collect()
                }),
                functions: Field::lazy(&HISTOGRAM_FUNCTIONS, record, &me, |r, me| {
                    r.functions
                        .iter()
                        .map(|f| Function::from_record(f, me.clone()))
                        .collect()
                }),
                annotations: Annotations::decoded(
                    &HISTOGRAM_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> HistogramRecord {
        HistogramRecord {
            identifier: self.identifier(),
            axis: self.axis().iter().map(|a| Rc::new(a.to_record())).collect(),
            distribution: Rc::new(self.distribution().to_record()),
            profiles: self.profiles().iter().map(|p| Rc::new(p.to_record())).collect(),
            unbinned_stats: self
                .unbinned_stats()
                .iter()
                .map(|s| Rc::new(s.to_record()))
                .collect(),
            profile_stats: self
                .profile_stats()
                .iter()
                .map(|s| Rc::new(s.to_record()))
                .collect(),
            functions: self.functions().iter().map(Function::to_record).collect(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }
}

impl Validate for Histogram {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(HISTOGRAM_IDENTIFIER.check_text(&self.identifier()))?;
        let axis = self.axis();
        revalidate(HISTOGRAM_AXIS.check_len(axis.len()))?;
        let functions = self.functions();
        revalidate(function_keys(&functions))?;

        let bins = extend(context, &binshape(&axis, context)?);
        self.distribution().validate(&bins)?;

        let profiles = self.profiles();
        let profile_stats = self.profile_stats();
        if !profile_stats.is_empty() && profile_stats.len() != profiles.len() {
            return Err(structure(format!(
                "Histogram.profile_stats has {} entries but there are {} profiles",
                profile_stats.len(),
                profiles.len()
            )));
        }
        validate_all(&profiles, &bins)?;
        validate_all(&profile_stats, &bins)?;
        validate_all(&self.unbinned_stats(), context)?;
        validate_all(&functions, &bins)?;
        self.0.annotations.validate(context)?;
        Ok(context.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::{CategoryBinning, IntegerBinning, RealInterval, RegularBinning};
    use crate::buffer::InterpretedInlineBuffer;
    use crate::stats::{Moments, UnweightedCounts};
    use crate::ErrorCategory;

    fn regular(num: u64) -> Axis {
        let binning = RegularBinning::new(num, RealInterval::new(0.0, 1.0).unwrap()).unwrap();
        Axis::new().with_binning(binning).unwrap()
    }

    fn counts(n: usize) -> Distribution {
        let values = vec![1.0f64; n];
        let counts = UnweightedCounts::new(InterpretedInlineBuffer::from_values(&values)).unwrap();
        Distribution::new(counts).unwrap()
    }

    #[test]
    fn test_axis_without_binning_is_one_bin() {
        assert_eq!(Axis::new().validate(&[]).unwrap(), vec![1]);
        assert_eq!(regular(10).validate(&[]).unwrap(), vec![12]);
    }

    #[test]
    fn test_binshape_concatenates_axes() {
        let category = Axis::new()
            .with_binning(CategoryBinning::new(["a", "b", "c"]))
            .unwrap();
        let h = Histogram::new("h", vec![regular(10), category], counts(36)).unwrap();
        assert_eq!(h.binshape().unwrap(), vec![12, 3]);
        assert!(h.validate(&[]).is_ok());
    }

    #[test]
    fn test_distribution_must_match_binshape() {
        let h = Histogram::new("h", vec![regular(10)], counts(10)).unwrap();
        let err = h.validate(&[]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));
    }

    #[test]
    fn test_context_multiplies_bins() {
        let h = Histogram::new("h", vec![Axis::new()], counts(4)).unwrap();
        assert!(h.validate(&[4]).is_ok());
        assert!(h.validate(&[]).is_err());
    }

    #[test]
    fn test_construction_constraints() {
        let err = Histogram::new("", vec![regular(3)], counts(5)).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
        let err = Histogram::new("h", Vec::new(), counts(1)).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
    }

    #[test]
    fn test_axis_cannot_join_two_histograms() {
        let axis = regular(10);
        Histogram::new("first", vec![axis.clone()], counts(12)).unwrap();
        let err = Histogram::new("second", vec![axis], counts(12)).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Ownership));
    }

    #[test]
    fn test_profile_stats_follow_profiles() {
        let axis = Axis::new()
            .with_binning(IntegerBinning::new(0, 4).with_has_underflow(false).with_has_overflow(false))
            .unwrap();
        let h = Histogram::new("h", vec![axis], counts(5))
            .unwrap()
            .with_profiles(vec![Profile::new("px"), Profile::new("py")])
            .unwrap();

        let moments = |n| {
            Moments::new(InterpretedInlineBuffer::from_values(&[0.0f64; 5]), n).unwrap()
        };
        let stats = DistributionStats::new().with_moments(vec![moments(1)]).unwrap();
        h.set_profile_stats(vec![stats]).unwrap();
        let err = h.validate(&[]).unwrap_err();
        assert!(err.to_string().contains("profile_stats"));

        let stats = DistributionStats::new().with_moments(vec![moments(2)]).unwrap();
        let more = DistributionStats::new();
        h.set_profile_stats(vec![stats, more]).unwrap();
        assert!(h.validate(&[]).is_ok());
    }

    #[test]
    fn test_unbinned_stats_use_context() {
        let h = Histogram::new("h", vec![regular(2)], counts(4)).unwrap();
        let sum = Moments::new(InterpretedInlineBuffer::from_values(&[3.0f64]), 1).unwrap();
        let stats = DistributionStats::new().with_moments(vec![sum]).unwrap();
        h.set_unbinned_stats(vec![stats]).unwrap();
        assert!(h.validate(&[]).is_ok());
    }
}
