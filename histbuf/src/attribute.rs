//! Typed attributes: per-field constraints, lazy values, ownership claims
//!
//! Each node field is described by a static [`FieldDesc`] naming its owner,
//! whether it is required, and the constraint a written value must satisfy.
//! The value itself lives in a [`Field`], which is either ready or deferred:
//! a deferred field holds a closure over the decoded record and produces the
//! value on first read, after which the value is cached until the next
//! explicit write.
//!
//! Writing a node (or a vector of nodes) into a field claims it. Claims are
//! all-or-nothing: every candidate is checked before any link is set.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use hashbrown::HashSet;
use histbuf_core::validation;
use histbuf_core::HistError;
use log::trace;

use crate::error::{ownership, Error, Result};
use crate::node::{Attach, NodeInner};

/// What a value written to a field must satisfy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    /// No constraint beyond the Rust type
    Any,
    /// Integer in `min..=max`
    Integer { min: i128, max: i128 },
    /// Real number between `min` and `max`; NaN never qualifies
    Real {
        min: f64,
        max: f64,
        min_inclusive: bool,
        max_inclusive: bool,
    },
    /// Vector with at least `min` elements
    Length { min: usize },
    /// Vector of keyed nodes: at least `min` elements, unique non-empty keys
    Keyed { min: usize },
    /// Non-empty identifier string
    Identifier,
}

/// Static description of one field of one node type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDesc {
    pub owner: &'static str,
    pub name: &'static str,
    pub required: bool,
    pub constraint: Constraint,
}

impl FieldDesc {
    pub const fn new(owner: &'static str, name: &'static str) -> Self {
        Self {
            owner,
            name,
            required: false,
            constraint: Constraint::Any,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn at_least(mut self, min: i128) -> Self {
        self.constraint = Constraint::Integer { min, max: i128::MAX };
        self
    }

    pub const fn real(mut self, min: f64, max: f64, min_inclusive: bool, max_inclusive: bool) -> Self {
        self.constraint = Constraint::Real {
            min,
            max,
            min_inclusive,
            max_inclusive,
        };
        self
    }

    /// Any real except NaN; infinities allowed
    pub const fn number(self) -> Self {
        self.real(f64::NEG_INFINITY, f64::INFINITY, true, true)
    }

    /// Finite reals only
    pub const fn finite(self) -> Self {
        self.real(f64::NEG_INFINITY, f64::INFINITY, false, false)
    }

    pub const fn min_len(mut self, min: usize) -> Self {
        self.constraint = Constraint::Length { min };
        self
    }

    pub const fn keyed(mut self, min: usize) -> Self {
        self.constraint = Constraint::Keyed { min };
        self
    }

    pub const fn identifier(mut self) -> Self {
        self.constraint = Constraint::Identifier;
        self
    }

    fn violation(&self, reason: String) -> Error {
        HistError::constraint(self.owner, self.name, reason).into()
    }

    pub(crate) fn check_int(&self, value: impl Into<i128>) -> Result<()> {
        let value = value.into();
        if let Constraint::Integer { min, max } = self.constraint {
            if value < min {
                return Err(self.violation(format!("{value} must be at least {min}")));
            }
            if value > max {
                return Err(self.violation(format!("{value} must be at most {max}")));
            }
        }
        Ok(())
    }

    pub(crate) fn check_real(&self, value: f64) -> Result<()> {
        if let Constraint::Real {
            min,
            max,
            min_inclusive,
            max_inclusive,
        } = self.constraint
        {
            if value.is_nan() {
                return Err(self.violation("NaN is not allowed".to_string()));
            }
            let above = if min_inclusive { value >= min } else { value > min };
            let below = if max_inclusive { value <= max } else { value < max };
            if !above || !below {
                let open = if min_inclusive { '[' } else { '(' };
                let close = if max_inclusive { ']' } else { ')' };
                return Err(self.violation(format!(
                    "{value} is outside {open}{min}, {max}{close}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn check_len(&self, len: usize) -> Result<()> {
        if let Constraint::Length { min } | Constraint::Keyed { min } = self.constraint {
            if len < min {
                return Err(self.violation(format!(
                    "has {len} elements but at least {min} are required"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn check_text(&self, value: &str) -> Result<()> {
        if self.constraint == Constraint::Identifier && value.is_empty() {
            return Err(self.violation("identifier must not be empty".to_string()));
        }
        Ok(())
    }

    /// Length plus key uniqueness for a vector of keyed nodes
    pub(crate) fn check_keys<'a, I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keys: Vec<&str> = keys.into_iter().collect();
        self.check_len(keys.len())?;
        if let Constraint::Keyed { .. } = self.constraint {
            if keys.iter().any(|k| k.is_empty()) {
                return Err(self.violation("identifiers must not be empty".to_string()));
            }
            if let Some(dup) = validation::first_duplicate(keys.iter().copied()) {
                return Err(self.violation(format!("keys must be unique; {dup:?} repeats")));
            }
        }
        Ok(())
    }
}

/// Re-run a write-time check during validation
///
/// Decoded nodes never passed through a setter, so validation re-applies
/// field constraints and reports violations as structural errors.
pub(crate) fn revalidate(result: Result<()>) -> Result<()> {
    match result {
        Err(Error::Hist(HistError::AttributeConstraint {
            owner,
            field,
            reason,
        })) => Err(HistError::structure(format!("{owner}.{field}: {reason}")).into()),
        other => other,
    }
}

enum Slot<T> {
    Ready(T),
    Deferred(Box<dyn Fn() -> T>),
}

/// One field of a node: a cached value or a pending materialization
pub(crate) struct Field<T> {
    desc: &'static FieldDesc,
    slot: RefCell<Slot<T>>,
}

impl<T: Clone + 'static> Field<T> {
    pub(crate) fn new(desc: &'static FieldDesc, value: T) -> Self {
        Self {
            desc,
            slot: RefCell::new(Slot::Ready(value)),
        }
    }

    /// A field materialized from `record` on first read
    ///
    /// The closure receives the record and the weak link of the node being
    /// built, which becomes the parent of any node it creates.
    pub(crate) fn lazy<R: 'static>(
        desc: &'static FieldDesc,
        record: &Rc<R>,
        parent: &Weak<dyn NodeInner>,
        build: fn(&R, &Weak<dyn NodeInner>) -> T,
    ) -> Self {
        let record = Rc::clone(record);
        let parent = parent.clone();
        Self {
            desc,
            slot: RefCell::new(Slot::Deferred(Box::new(move || build(&record, &parent)))),
        }
    }

    fn materialize(&self) {
        let value = match &*self.slot.borrow() {
            Slot::Ready(_) => return,
            Slot::Deferred(build) => build(),
        };
        trace!("materialized {}.{}", self.desc.owner, self.desc.name);
        *self.slot.borrow_mut() = Slot::Ready(value);
    }

    /// Borrow the value, materializing it first if needed
    pub(crate) fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        self.materialize();
        match &*self.slot.borrow() {
            Slot::Ready(value) => f(value),
            Slot::Deferred(_) => unreachable!("field was just materialized"),
        }
    }

    pub(crate) fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Replace the value; any pending materialization is discarded
    pub(crate) fn set(&self, value: T) {
        *self.slot.borrow_mut() = Slot::Ready(value);
    }

    #[cfg(test)]
    pub(crate) fn is_materialized(&self) -> bool {
        matches!(&*self.slot.borrow(), Slot::Ready(_))
    }
}

/// A batch of ownership claims committed together
pub(crate) struct Claims<'a> {
    entries: Vec<(&'static FieldDesc, &'a dyn Attach)>,
}

impl<'a> Claims<'a> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn one<T: Attach>(mut self, desc: &'static FieldDesc, child: &'a T) -> Self {
        self.entries.push((desc, child));
        self
    }

    pub(crate) fn opt<T: Attach>(mut self, desc: &'static FieldDesc, child: &'a Option<T>) -> Self {
        if let Some(child) = child {
            self.entries.push((desc, child));
        }
        self
    }

    pub(crate) fn all<T: Attach>(mut self, desc: &'static FieldDesc, children: &'a [T]) -> Self {
        for child in children {
            self.entries.push((desc, child));
        }
        self
    }

    /// Attach every entry to `parent`, or none of them
    pub(crate) fn commit(self, parent: &Weak<dyn NodeInner>) -> Result<()> {
        let mut seen = HashSet::new();
        for (desc, child) in &self.entries {
            if child.link().is_claimed() {
                return Err(ownership(format!(
                    "{:?} assigned to {}.{} is already attached to another hierarchy",
                    child.kind(),
                    desc.owner,
                    desc.name
                )));
            }
            if !seen.insert(child.addr()) {
                return Err(ownership(format!(
                    "{:?} is assigned to {}.{} more than once",
                    child.kind(),
                    desc.owner,
                    desc.name
                )));
            }
        }
        for (_, child) in self.entries {
            child.link().set(parent.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::RealInterval;
    use crate::node::Node;
    use crate::ErrorCategory;

    static NUM: FieldDesc = FieldDesc::new("RegularBinning", "num").required().at_least(1);
    static P: FieldDesc = FieldDesc::new("Quantiles", "p").real(0.0, 1.0, true, true);
    static ORIGIN: FieldDesc = FieldDesc::new("HexagonalBinning", "xorigin").finite();
    static EDGES: FieldDesc = FieldDesc::new("EdgesBinning", "edges").min_len(1);
    static PARAMS: FieldDesc = FieldDesc::new("ParameterizedFunction", "parameters").keyed(0);

    #[test]
    fn test_integer_constraint() {
        assert!(NUM.check_int(1u64).is_ok());
        let err = NUM.check_int(0u64).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
        assert!(err.to_string().starts_with("RegularBinning.num:"));
    }

    #[test]
    fn test_real_constraint() {
        assert!(P.check_real(0.0).is_ok());
        assert!(P.check_real(1.0).is_ok());
        assert!(P.check_real(1.5).is_err());
        assert!(P.check_real(f64::NAN).is_err());

        assert!(ORIGIN.check_real(-3.5).is_ok());
        assert!(ORIGIN.check_real(f64::INFINITY).is_err());
        assert!(ORIGIN.check_real(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_length_and_keys() {
        assert!(EDGES.check_len(1).is_ok());
        assert!(EDGES.check_len(0).is_err());

        assert!(PARAMS.check_keys(["a", "b"]).is_ok());
        assert!(PARAMS.check_keys(Vec::<&str>::new()).is_ok());
        assert!(PARAMS.check_keys(["a", "a"]).is_err());
        assert!(PARAMS.check_keys([""]).is_err());
    }

    #[test]
    fn test_revalidate_turns_constraint_into_structure() {
        let err = revalidate(NUM.check_int(0u64)).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));
        assert!(revalidate(NUM.check_int(4u64)).is_ok());
    }

    #[test]
    fn test_lazy_field_materializes_once() {
        let calls = Rc::new(std::cell::Cell::new(0));
        let record = Rc::new(calls.clone());
        let owner = RealInterval::new(0.0, 1.0).unwrap();
        let parent = owner.weak();
        let field: Field<i32> = Field::lazy(&NUM, &record, &parent, |calls, _| {
            calls.set(calls.get() + 1);
            7
        });
        assert!(!field.is_materialized());
        assert_eq!(field.get(), 7);
        assert_eq!(field.get(), 7);
        assert_eq!(calls.get(), 1);
        field.set(9);
        assert_eq!(field.get(), 9);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_claims_are_all_or_nothing() {
        let a = RealInterval::new(0.0, 1.0).unwrap();
        let b = RealInterval::new(1.0, 2.0).unwrap();
        let owner = RealInterval::new(5.0, 6.0).unwrap();

        // same node twice in one batch
        let err = Claims::new()
            .all(&EDGES, &[a.clone(), b.clone(), a.clone()])
            .commit(&owner.weak())
            .unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Ownership));
        assert!(!a.is_attached());
        assert!(!b.is_attached());

        Claims::new().one(&EDGES, &a).commit(&owner.weak()).unwrap();
        assert!(a.is_attached());
        let err = Claims::new()
            .one(&EDGES, &b)
            .one(&EDGES, &a)
            .commit(&owner.weak())
            .unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Ownership));
        assert!(!b.is_attached());
    }
}
