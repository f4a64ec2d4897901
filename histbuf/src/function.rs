//! Functions fitted to or evaluated over binned data
//!
//! A [`ParameterizedFunction`] is an expression with named parameters and
//! does not depend on the bin shape. An [`EvaluatedFunction`] stores one value
//! per bin of the histogram it is attached to, and a
//! [`BinnedEvaluatedFunction`] carries its own axes so it can stand alone.

use std::rc::{Rc, Weak};

use histbuf_core::validation::{first_duplicate, real_key, shape_product};
use histbuf_core::wire::{
    BinnedEvaluatedFunctionRecord, EvaluatedFunctionRecord, FunctionObjectRecord, FunctionRecord,
    ParameterRecord, ParameterizedFunctionRecord,
};

use crate::attribute::{revalidate, Claims, Field, FieldDesc};
use crate::buffer::InterpretedBuffer;
use crate::collection::forget_key;
use crate::error::{structure, Result};
use crate::histogram::{binshape, Axis};
use crate::metadata::{AnnotationDescs, Annotations};
use crate::node::{Link, NodeInner};
use crate::stats::GenericErrors;
use crate::validate::{extend, validate_all, Shape, Validate};

// Parameter

static PARAMETER_IDENTIFIER: FieldDesc = FieldDesc::new("Parameter", "identifier")
    .required()
    .identifier();
static PARAMETER_VALUE: FieldDesc = FieldDesc::new("Parameter", "value").required();

pub(crate) struct ParameterInner {
    link: Link,
    identifier: Field<String>,
    value: Field<f64>,
}

node_handle!(
    /// A named value substituted into a function expression
    Parameter,
    ParameterInner
);

impl Parameter {
    pub fn new(identifier: impl Into<String>, value: f64) -> Result<Self> {
        let identifier = identifier.into();
        PARAMETER_IDENTIFIER.check_text(&identifier)?;
        Ok(Self(Rc::new(ParameterInner {
            link: Link::default(),
            identifier: Field::new(&PARAMETER_IDENTIFIER, identifier),
            value: Field::new(&PARAMETER_VALUE, value),
        })))
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn value(&self) -> f64 {
        self.0.value.get()
    }

    pub fn set_value(&self, value: f64) {
        self.0.value.set(value);
    }

    pub(crate) fn from_record(record: &Rc<ParameterRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(ParameterInner {
            link: Link::attached(parent),
            identifier: Field::new(&PARAMETER_IDENTIFIER, record.identifier.clone()),
            value: Field::new(&PARAMETER_VALUE, record.value),
        }))
    }

    pub(crate) fn to_record(&self) -> ParameterRecord {
        ParameterRecord {
            identifier: self.identifier(),
            value: self.value(),
        }
    }
}

impl Validate for Parameter {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(PARAMETER_IDENTIFIER.check_text(&self.identifier()))?;
        Ok(context.to_vec())
    }
}

// ParameterizedFunction

static PF_IDENTIFIER: FieldDesc = FieldDesc::new("ParameterizedFunction", "identifier")
    .required()
    .identifier();
static PF_EXPRESSION: FieldDesc = FieldDesc::new("ParameterizedFunction", "expression").required();
static PF_PARAMETERS: FieldDesc = FieldDesc::new("ParameterizedFunction", "parameters").keyed(0);
static PF_CONTOURS: FieldDesc = FieldDesc::new("ParameterizedFunction", "contours");
static PF_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("ParameterizedFunction");

pub(crate) struct ParameterizedFunctionInner {
    link: Link,
    identifier: Field<String>,
    expression: Field<String>,
    parameters: Field<Vec<Parameter>>,
    contours: Field<Vec<f64>>,
    annotations: Annotations,
}

node_handle!(
    /// A function given by an expression and parameter values
    ParameterizedFunction,
    ParameterizedFunctionInner
);

annotated!(ParameterizedFunction);

fn parameter_keys(parameters: &[Parameter]) -> Result<()> {
    let keys: Vec<String> = parameters.iter().map(Parameter::identifier).collect();
    PF_PARAMETERS.check_keys(keys.iter().map(String::as_str))
}

fn unique_contours(contours: &[f64]) -> Result<()> {
    if let Some(key) = first_duplicate(contours.iter().map(|&c| real_key(c))) {
        return Err(histbuf_core::HistError::constraint(
            PF_CONTOURS.owner,
            PF_CONTOURS.name,
            format!("contour levels must be unique; {} repeats", f64::from_bits(key)),
        )
        .into());
    }
    Ok(())
}

impl ParameterizedFunction {
    pub fn new(identifier: impl Into<String>, expression: impl Into<String>) -> Result<Self> {
        let identifier = identifier.into();
        PF_IDENTIFIER.check_text(&identifier)?;
        Ok(Self(Rc::new(ParameterizedFunctionInner {
            link: Link::default(),
            identifier: Field::new(&PF_IDENTIFIER, identifier),
            expression: Field::new(&PF_EXPRESSION, expression.into()),
            parameters: Field::new(&PF_PARAMETERS, Vec::new()),
            contours: Field::new(&PF_CONTOURS, Vec::new()),
            annotations: Annotations::new(&PF_ANNOTATIONS),
        })))
    }

    pub fn with_parameters(self, parameters: Vec<Parameter>) -> Result<Self> {
        self.set_parameters(parameters)?;
        Ok(self)
    }

    pub fn with_contours(self, contours: Vec<f64>) -> Result<Self> {
        self.set_contours(contours)?;
        Ok(self)
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn set_identifier(&self, identifier: impl Into<String>) -> Result<()> {
        let identifier = identifier.into();
        PF_IDENTIFIER.check_text(&identifier)?;
        self.0.identifier.set(identifier);
        forget_key(&self.0.link);
        Ok(())
    }

    pub fn expression(&self) -> String {
        self.0.expression.get()
    }

    pub fn set_expression(&self, expression: impl Into<String>) {
        self.0.expression.set(expression.into());
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        self.0.parameters.get()
    }

    pub fn set_parameters(&self, parameters: Vec<Parameter>) -> Result<()> {
        parameter_keys(&parameters)?;
        Claims::new()
            .all(&PF_PARAMETERS, &parameters)
            .commit(&self.weak())?;
        self.0.parameters.set(parameters);
        Ok(())
    }

    /// Parameter with the given identifier
    pub fn parameter(&self, identifier: &str) -> Option<Parameter> {
        self.0
            .parameters
            .with(|ps| ps.iter().find(|p| p.identifier() == identifier).cloned())
    }

    pub fn contours(&self) -> Vec<f64> {
        self.0.contours.get()
    }

    pub fn set_contours(&self, contours: Vec<f64>) -> Result<()> {
        unique_contours(&contours)?;
        self.0.contours.set(contours);
        Ok(())
    }

    pub(crate) fn from_record(
        record: &Rc<ParameterizedFunctionRecord>,
        parent: Weak<dyn NodeInner>,
    ) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<ParameterizedFunctionInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            ParameterizedFunctionInner {
                link: Link::attached(parent),
                identifier: Field::new(&PF_IDENTIFIER, record.identifier.clone()),
                expression: Field::new(&PF_EXPRESSION, record.expression.clone()),
                parameters: Field::lazy(&PF_PARAMETERS, record, &me, |r, me| {
                    r.parameters
                        .iter()
                        .map(|p| Parameter::from_record(p, me.clone()))
                        .collect()
                }),
                contours: Field::lazy(&PF_CONTOURS, record, &me, |r, _| r.contours.clone()),
                annotations: Annotations::decoded(
                    &PF_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> ParameterizedFunctionRecord {
        ParameterizedFunctionRecord {
            identifier: self.identifier(),
            expression: self.expression(),
            parameters: self
                .parameters()
                .iter()
                .map(|p| Rc::new(p.to_record()))
                .collect(),
            contours: self.contours(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }
}

impl Validate for ParameterizedFunction {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(PF_IDENTIFIER.check_text(&self.identifier()))?;
        let parameters = self.parameters();
        revalidate(parameter_keys(&parameters))?;
        revalidate(self.0.contours.with(|c| unique_contours(c)))?;
        validate_all(&parameters, context)?;
        self.0.annotations.validate(context)?;
        Ok(context.to_vec())
    }
}

// EvaluatedFunction

static EF_IDENTIFIER: FieldDesc = FieldDesc::new("EvaluatedFunction", "identifier")
    .required()
    .identifier();
static EF_VALUES: FieldDesc = FieldDesc::new("EvaluatedFunction", "values").required();
static EF_DERIVATIVES: FieldDesc = FieldDesc::new("EvaluatedFunction", "derivatives");
static EF_ERRORS: FieldDesc = FieldDesc::new("EvaluatedFunction", "generic_errors");
static EF_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("EvaluatedFunction");

pub(crate) struct EvaluatedFunctionInner {
    link: Link,
    identifier: Field<String>,
    values: Field<Vec<f64>>,
    derivatives: Field<Vec<f64>>,
    generic_errors: Field<Vec<GenericErrors>>,
    annotations: Annotations,
}

node_handle!(
    /// A function sampled once per bin of the histogram holding it
    EvaluatedFunction,
    EvaluatedFunctionInner
);

annotated!(EvaluatedFunction);

impl EvaluatedFunction {
    pub fn new(identifier: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let identifier = identifier.into();
        EF_IDENTIFIER.check_text(&identifier)?;
        Ok(Self(Rc::new(EvaluatedFunctionInner {
            link: Link::default(),
            identifier: Field::new(&EF_IDENTIFIER, identifier),
            values: Field::new(&EF_VALUES, values),
            derivatives: Field::new(&EF_DERIVATIVES, Vec::new()),
            generic_errors: Field::new(&EF_ERRORS, Vec::new()),
            annotations: Annotations::new(&EF_ANNOTATIONS),
        })))
    }

    pub fn with_derivatives(self, derivatives: Vec<f64>) -> Self {
        self.set_derivatives(derivatives);
        self
    }

    pub fn with_generic_errors(self, errors: Vec<GenericErrors>) -> Result<Self> {
        self.set_generic_errors(errors)?;
        Ok(self)
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn set_identifier(&self, identifier: impl Into<String>) -> Result<()> {
        let identifier = identifier.into();
        EF_IDENTIFIER.check_text(&identifier)?;
        self.0.identifier.set(identifier);
        forget_key(&self.0.link);
        Ok(())
    }

    pub fn values(&self) -> Vec<f64> {
        self.0.values.get()
    }

    pub fn set_values(&self, values: Vec<f64>) {
        self.0.values.set(values);
    }

    pub fn derivatives(&self) -> Vec<f64> {
        self.0.derivatives.get()
    }

    pub fn set_derivatives(&self, derivatives: Vec<f64>) {
        self.0.derivatives.set(derivatives);
    }

    pub fn generic_errors(&self) -> Vec<GenericErrors> {
        self.0.generic_errors.get()
    }

    pub fn set_generic_errors(&self, errors: Vec<GenericErrors>) -> Result<()> {
        Claims::new().all(&EF_ERRORS, &errors).commit(&self.weak())?;
        self.0.generic_errors.set(errors);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<EvaluatedFunctionRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<EvaluatedFunctionInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            EvaluatedFunctionInner {
                link: Link::attached(parent),
                identifier: Field::new(&EF_IDENTIFIER, record.identifier.clone()),
                values: Field::lazy(&EF_VALUES, record, &me, |r, _| r.values.clone()),
                derivatives: Field::lazy(&EF_DERIVATIVES, record, &me, |r, _| r.derivatives.clone()),
                generic_errors: Field::lazy(&EF_ERRORS, record, &me, |r, me| {
                    r.generic_errors
                        .iter()
                        .map(|e| GenericErrors::from_record(e, me.clone()))
                        .collect()
                }),
                annotations: Annotations::decoded(
                    &EF_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> EvaluatedFunctionRecord {
        EvaluatedFunctionRecord {
            identifier: self.identifier(),
            values: self.values(),
            derivatives: self.derivatives(),
            generic_errors: self
                .generic_errors()
                .iter()
                .map(|e| Rc::new(e.to_record()))
                .collect(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }
}

impl Validate for EvaluatedFunction {
    /// `context` is the full bin shape of the owning histogram
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(EF_IDENTIFIER.check_text(&self.identifier()))?;
        let bins = shape_product(context)?;
        let values = self.0.values.with(Vec::len);
        if values != bins {
            return Err(structure(format!(
                "EvaluatedFunction.values has {values} entries but the bin shape {context:?} has {bins}"
            )));
        }
        let derivatives = self.0.derivatives.with(Vec::len);
        if derivatives != 0 && derivatives != bins {
            return Err(structure(format!(
                "EvaluatedFunction.derivatives has {derivatives} entries but the bin shape {context:?} has {bins}"
            )));
        }
        validate_all(&self.generic_errors(), context)?;
        self.0.annotations.validate(context)?;
        Ok(context.to_vec())
    }
}

// BinnedEvaluatedFunction

static BEF_IDENTIFIER: FieldDesc = FieldDesc::new("BinnedEvaluatedFunction", "identifier")
    .required()
    .identifier();
static BEF_AXIS: FieldDesc = FieldDesc::new("BinnedEvaluatedFunction", "axis")
    .required()
    .min_len(1);
static BEF_VALUES: FieldDesc = FieldDesc::new("BinnedEvaluatedFunction", "values").required();
static BEF_DERIVATIVES: FieldDesc = FieldDesc::new("BinnedEvaluatedFunction", "derivatives");
static BEF_ERRORS: FieldDesc = FieldDesc::new("BinnedEvaluatedFunction", "generic_errors");
static BEF_ANNOTATIONS: AnnotationDescs = AnnotationDescs::new("BinnedEvaluatedFunction");

pub(crate) struct BinnedEvaluatedFunctionInner {
    link: Link,
    identifier: Field<String>,
    axis: Field<Vec<Axis>>,
    values: Field<InterpretedBuffer>,
    derivatives: Field<Option<InterpretedBuffer>>,
    generic_errors: Field<Vec<GenericErrors>>,
    annotations: Annotations,
}

node_handle!(
    /// A function sampled over its own axes
    BinnedEvaluatedFunction,
    BinnedEvaluatedFunctionInner
);

annotated!(BinnedEvaluatedFunction);

impl BinnedEvaluatedFunction {
    pub fn new(
        identifier: impl Into<String>,
        axis: Vec<Axis>,
        values: impl Into<InterpretedBuffer>,
    ) -> Result<Self> {
        let identifier = identifier.into();
        BEF_IDENTIFIER.check_text(&identifier)?;
        BEF_AXIS.check_len(axis.len())?;
        let values = values.into();
        let node = Self(Rc::new(BinnedEvaluatedFunctionInner {
            link: Link::default(),
            identifier: Field::new(&BEF_IDENTIFIER, identifier),
            axis: Field::new(&BEF_AXIS, axis.clone()),
            values: Field::new(&BEF_VALUES, values.clone()),
            derivatives: Field::new(&BEF_DERIVATIVES, None),
            generic_errors: Field::new(&BEF_ERRORS, Vec::new()),
            annotations: Annotations::new(&BEF_ANNOTATIONS),
        }));
        Claims::new()
            .all(&BEF_AXIS, &axis)
            .one(&BEF_VALUES, &values)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_derivatives(self, derivatives: impl Into<InterpretedBuffer>) -> Result<Self> {
        self.set_derivatives(Some(derivatives.into()))?;
        Ok(self)
    }

    pub fn with_generic_errors(self, errors: Vec<GenericErrors>) -> Result<Self> {
        self.set_generic_errors(errors)?;
        Ok(self)
    }

    pub fn identifier(&self) -> String {
        self.0.identifier.get()
    }

    pub fn set_identifier(&self, identifier: impl Into<String>) -> Result<()> {
        let identifier = identifier.into();
        BEF_IDENTIFIER.check_text(&identifier)?;
        self.0.identifier.set(identifier);
        forget_key(&self.0.link);
        Ok(())
    }

    pub fn axis(&self) -> Vec<Axis> {
        self.0.axis.get()
    }

    pub fn set_axis(&self, axis: Vec<Axis>) -> Result<()> {
        BEF_AXIS.check_len(axis.len())?;
        Claims::new().all(&BEF_AXIS, &axis).commit(&self.weak())?;
        self.0.axis.set(axis);
        Ok(())
    }

    pub fn values(&self) -> InterpretedBuffer {
        self.0.values.get()
    }

    pub fn set_values(&self, values: impl Into<InterpretedBuffer>) -> Result<()> {
        let values = values.into();
        Claims::new().one(&BEF_VALUES, &values).commit(&self.weak())?;
        self.0.values.set(values);
        Ok(())
    }

    pub fn derivatives(&self) -> Option<InterpretedBuffer> {
        self.0.derivatives.get()
    }

    pub fn set_derivatives(&self, derivatives: Option<InterpretedBuffer>) -> Result<()> {
        Claims::new()
            .opt(&BEF_DERIVATIVES, &derivatives)
            .commit(&self.weak())?;
        self.0.derivatives.set(derivatives);
        Ok(())
    }

    pub fn generic_errors(&self) -> Vec<GenericErrors> {
        self.0.generic_errors.get()
    }

    pub fn set_generic_errors(&self, errors: Vec<GenericErrors>) -> Result<()> {
        Claims::new().all(&BEF_ERRORS, &errors).commit(&self.weak())?;
        self.0.generic_errors.set(errors);
        Ok(())
    }

    /// Shape of the bins spanned by this function's own axes
    pub fn binshape(&self) -> Result<Shape> {
        binshape(&self.axis(), &[])
    }

    pub(crate) fn from_record(
        record: &Rc<BinnedEvaluatedFunctionRecord>,
        parent: Weak<dyn NodeInner>,
    ) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<BinnedEvaluatedFunctionInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            BinnedEvaluatedFunctionInner {
                link: Link::attached(parent),
                identifier: Field::new(&BEF_IDENTIFIER, record.identifier.clone()),
                axis: Field::lazy(&BEF_AXIS, record, &me, |r, me| {
                    r.axis
                        .iter()
                        .map(|a| Axis::from_record(a, me.clone()))
                        .collect()
                }),
                values: Field::lazy(&BEF_VALUES, record, &me, |r, me| {
                    InterpretedBuffer::from_record(&r.values, me.clone())
                }),
                derivatives: Field::lazy(&BEF_DERIVATIVES, record, &me, |r, me| {
                    r.derivatives
                        .as_ref()
                        .map(|d| InterpretedBuffer::from_record(d, me.clone()))
                }),
                generic_errors: Field::lazy(&BEF_ERRORS, record, &me, |r, me| {
                    r.generic_errors
                        .iter()
                        .map(|e| GenericErrors::from_record(e, me.clone()))
                        .collect()
                }),
                annotations: Annotations::decoded(
                    &BEF_ANNOTATIONS,
                    &record.title,
                    &record.metadata,
                    &record.decoration,
                    &me,
                ),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> BinnedEvaluatedFunctionRecord {
        BinnedEvaluatedFunctionRecord {
            identifier: self.identifier(),
            axis: self.axis().iter().map(|a| Rc::new(a.to_record())).collect(),
            values: self.values().to_record(),
            derivatives: self.derivatives().map(|d| d.to_record()),
            generic_errors: self
                .generic_errors()
                .iter()
                .map(|e| Rc::new(e.to_record()))
                .collect(),
            title: self.title(),
            metadata: self.0.annotations.metadata_record(),
            decoration: self.0.annotations.decoration_record(),
        }
    }
}

impl Validate for BinnedEvaluatedFunction {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(BEF_IDENTIFIER.check_text(&self.identifier()))?;
        let axis = self.axis();
        revalidate(BEF_AXIS.check_len(axis.len()))?;
        let bins = extend(context, &binshape(&axis, context)?);
        self.values().validate(&bins)?;
        self.derivatives().validate(&bins)?;
        validate_all(&self.generic_errors(), &bins)?;
        self.0.annotations.validate(context)?;
        Ok(context.to_vec())
    }
}

// Unions

node_union!(
    /// A function attached to a histogram
    Function {
        Parameterized(ParameterizedFunction),
        Evaluated(EvaluatedFunction),
    }
);

impl Function {
    pub fn identifier(&self) -> String {
        match self {
            Function::Parameterized(f) => f.identifier(),
            Function::Evaluated(f) => f.identifier(),
        }
    }

    pub(crate) fn from_record(record: &FunctionRecord, parent: Weak<dyn NodeInner>) -> Self {
        match record {
            FunctionRecord::Parameterized(r) => ParameterizedFunction::from_record(r, parent).into(),
            FunctionRecord::Evaluated(r) => EvaluatedFunction::from_record(r, parent).into(),
        }
    }

    pub(crate) fn to_record(&self) -> FunctionRecord {
        match self {
            Function::Parameterized(f) => FunctionRecord::Parameterized(Rc::new(f.to_record())),
            Function::Evaluated(f) => FunctionRecord::Evaluated(Rc::new(f.to_record())),
        }
    }
}

impl Validate for Function {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        match self {
            Function::Parameterized(f) => f.validate(context),
            Function::Evaluated(f) => f.validate(context),
        }
    }
}

node_union!(
    /// A function that does not depend on an enclosing histogram
    FunctionObject {
        Parameterized(ParameterizedFunction),
        BinnedEvaluated(BinnedEvaluatedFunction),
    }
);

impl FunctionObject {
    pub fn identifier(&self) -> String {
        match self {
            FunctionObject::Parameterized(f) => f.identifier(),
            FunctionObject::BinnedEvaluated(f) => f.identifier(),
        }
    }

    pub(crate) fn from_record(record: &FunctionObjectRecord, parent: Weak<dyn NodeInner>) -> Self {
        match record {
            FunctionObjectRecord::Parameterized(r) => {
                ParameterizedFunction::from_record(r, parent).into()
            }
            FunctionObjectRecord::BinnedEvaluated(r) => {
                BinnedEvaluatedFunction::from_record(r, parent).into()
            }
        }
    }

    pub(crate) fn to_record(&self) -> FunctionObjectRecord {
        match self {
            FunctionObject::Parameterized(f) => {
                FunctionObjectRecord::Parameterized(Rc::new(f.to_record()))
            }
            FunctionObject::BinnedEvaluated(f) => {
                FunctionObjectRecord::BinnedEvaluated(Rc::new(f.to_record()))
            }
        }
    }
}

impl Validate for FunctionObject {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        match self {
            FunctionObject::Parameterized(f) => f.validate(context),
            FunctionObject::BinnedEvaluated(f) => f.validate(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::IntegerBinning;
    use crate::buffer::InterpretedInlineBuffer;
    use crate::ErrorCategory;

    fn integer_axis(max: i64) -> Axis {
        Axis::new()
            .with_binning(IntegerBinning::new(0, max).with_has_underflow(false).with_has_overflow(false))
            .unwrap()
    }

    #[test]
    fn test_parameters_are_keyed() {
        let f = ParameterizedFunction::new("fit", "a + b*x").unwrap();
        let params = vec![Parameter::new("a", 1.0).unwrap(), Parameter::new("b", 2.0).unwrap()];
        f.set_parameters(params).unwrap();
        assert_eq!(f.parameter("b").unwrap().value(), 2.0);
        assert!(f.parameter("c").is_none());

        let dup = vec![Parameter::new("a", 1.0).unwrap(), Parameter::new("a", 3.0).unwrap()];
        let err = f.set_parameters(dup).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
        assert_eq!(f.parameters().len(), 2);
    }

    #[test]
    fn test_contours_are_unique() {
        let f = ParameterizedFunction::new("fit", "x").unwrap();
        assert!(f.set_contours(vec![0.5, 1.0, 2.0]).is_ok());
        assert!(f.set_contours(vec![0.5, 1.0, 0.5]).is_err());
        // -0.0 and 0.0 name the same level
        assert!(f.set_contours(vec![0.0, -0.0]).is_err());
    }

    #[test]
    fn test_evaluated_values_follow_bins() {
        let f = EvaluatedFunction::new("eval", vec![0.0; 6]).unwrap();
        assert!(f.validate(&[2, 3]).is_ok());
        assert!(f.validate(&[7]).is_err());

        f.set_derivatives(vec![1.0; 5]);
        let err = f.validate(&[2, 3]).unwrap_err();
        assert!(err.to_string().contains("derivatives"));
    }

    #[test]
    fn test_binned_evaluated_uses_own_axes() {
        let values = InterpretedInlineBuffer::from_values(&[0.5f64; 12]);
        let f = BinnedEvaluatedFunction::new("bef", vec![integer_axis(2), integer_axis(3)], values).unwrap();
        assert_eq!(f.binshape().unwrap(), vec![3, 4]);
        assert!(f.validate(&[]).is_ok());

        f.set_derivatives(Some(InterpretedInlineBuffer::from_values(&[0.0f64; 11]).into()))
            .unwrap();
        assert!(f.validate(&[]).is_err());
    }

    #[test]
    fn test_union_identifier() {
        let f: Function = EvaluatedFunction::new("e", vec![1.0]).unwrap().into();
        assert_eq!(f.identifier(), "e");
        let g: FunctionObject = ParameterizedFunction::new("p", "x").unwrap().into();
        assert_eq!(g.identifier(), "p");
        assert!(g.validate(&[5]).is_ok());
    }
}
