//! Binning nodes
//!
//! Nine binnings share one contract: validate their own numeric invariants
//! and return the number of slots they add along each of their dimensions,
//! overflow and nanflow slots included. [`RealInterval`] and
//! [`RealOverflow`] are the building blocks the real-valued binnings share.

use std::rc::{Rc, Weak};

use histbuf_core::validation::{dimension, first_duplicate, is_strictly_increasing};
use histbuf_core::wire::{
    BinningRecord, CategoryBinningRecord, EdgesBinningRecord, FractionalBinningRecord,
    HexagonalBinningRecord, IntegerBinningRecord, IrregularBinningRecord, RealIntervalRecord,
    RealOverflowRecord, RegularBinningRecord, SparseRegularBinningRecord,
    TicTacToeOverflowBinningRecord,
};
use histbuf_core::{FractionalErrorMethod, HexagonalCoordinates, NonRealMapping};

use crate::attribute::{revalidate, Claims, Field, FieldDesc};
use crate::error::{structure, Result};
use crate::node::{Link, NodeInner};
use crate::validate::{Shape, Validate};

/// Slots reserved by a regular binning without an explicit overflow
const REGULAR_DEFAULT_SLOTS: usize = 2;

/// Slots reserved by other real binnings without an explicit overflow
const DEFAULT_SLOTS: usize = 3;

fn overflow_slots(overflow: &Option<RealOverflow>, context: &[usize], default: usize) -> Result<usize> {
    match overflow {
        Some(overflow) => {
            overflow.validate(context)?;
            Ok(overflow.slots())
        }
        None => Ok(default),
    }
}

fn require_finite(interval: &RealInterval, what: &str) -> Result<()> {
    if !interval.low().is_finite() || !interval.high().is_finite() {
        return Err(structure(format!(
            "{what} must be finite, not [{}, {}]",
            interval.low(),
            interval.high()
        )));
    }
    Ok(())
}

// RealInterval

static INTERVAL_LOW: FieldDesc = FieldDesc::new("RealInterval", "low").required().number();
static INTERVAL_HIGH: FieldDesc = FieldDesc::new("RealInterval", "high").required().number();
static INTERVAL_LOW_INCLUSIVE: FieldDesc = FieldDesc::new("RealInterval", "low_inclusive");
static INTERVAL_HIGH_INCLUSIVE: FieldDesc = FieldDesc::new("RealInterval", "high_inclusive");

pub(crate) struct RealIntervalInner {
    link: Link,
    low: Field<f64>,
    high: Field<f64>,
    low_inclusive: Field<bool>,
    high_inclusive: Field<bool>,
}

node_handle!(
    /// Real range with independently inclusive or exclusive ends,
    /// `[low, high)` by default
    RealInterval,
    RealIntervalInner
);

impl RealInterval {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        INTERVAL_LOW.check_real(low)?;
        INTERVAL_HIGH.check_real(high)?;
        Ok(Self(Rc::new(RealIntervalInner {
            link: Link::default(),
            low: Field::new(&INTERVAL_LOW, low),
            high: Field::new(&INTERVAL_HIGH, high),
            low_inclusive: Field::new(&INTERVAL_LOW_INCLUSIVE, true),
            high_inclusive: Field::new(&INTERVAL_HIGH_INCLUSIVE, false),
        })))
    }

    pub fn with_low_inclusive(self, inclusive: bool) -> Self {
        self.set_low_inclusive(inclusive);
        self
    }

    pub fn with_high_inclusive(self, inclusive: bool) -> Self {
        self.set_high_inclusive(inclusive);
        self
    }

    pub fn low(&self) -> f64 {
        self.0.low.get()
    }

    pub fn set_low(&self, low: f64) -> Result<()> {
        INTERVAL_LOW.check_real(low)?;
        self.0.low.set(low);
        Ok(())
    }

    pub fn high(&self) -> f64 {
        self.0.high.get()
    }

    pub fn set_high(&self, high: f64) -> Result<()> {
        INTERVAL_HIGH.check_real(high)?;
        self.0.high.set(high);
        Ok(())
    }

    pub fn low_inclusive(&self) -> bool {
        self.0.low_inclusive.get()
    }

    pub fn set_low_inclusive(&self, inclusive: bool) {
        self.0.low_inclusive.set(inclusive);
    }

    pub fn high_inclusive(&self) -> bool {
        self.0.high_inclusive.get()
    }

    pub fn set_high_inclusive(&self, inclusive: bool) {
        self.0.high_inclusive.set(inclusive);
    }

    pub(crate) fn from_record(record: &Rc<RealIntervalRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(RealIntervalInner {
            link: Link::attached(parent),
            low: Field::new(&INTERVAL_LOW, record.low),
            high: Field::new(&INTERVAL_HIGH, record.high),
            low_inclusive: Field::new(&INTERVAL_LOW_INCLUSIVE, record.low_inclusive),
            high_inclusive: Field::new(&INTERVAL_HIGH_INCLUSIVE, record.high_inclusive),
        }))
    }

    pub(crate) fn to_record(&self) -> RealIntervalRecord {
        RealIntervalRecord {
            low: self.low(),
            high: self.high(),
            low_inclusive: self.low_inclusive(),
            high_inclusive: self.high_inclusive(),
        }
    }
}

impl Validate for RealInterval {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        let (low, high) = (self.low(), self.high());
        revalidate(INTERVAL_LOW.check_real(low))?;
        revalidate(INTERVAL_HIGH.check_real(high))?;
        if low > high {
            return Err(structure(format!(
                "RealInterval.low ({low}) must be less than or equal to RealInterval.high ({high})"
            )));
        }
        if low == high && !self.low_inclusive() && !self.high_inclusive() {
            return Err(structure(format!(
                "RealInterval ({low}, {high}) is empty; at least one end must be inclusive"
            )));
        }
        Ok(context.to_vec())
    }
}

// RealOverflow

static OVERFLOW_UNDERFLOW: FieldDesc = FieldDesc::new("RealOverflow", "has_underflow");
static OVERFLOW_OVERFLOW: FieldDesc = FieldDesc::new("RealOverflow", "has_overflow");
static OVERFLOW_NANFLOW: FieldDesc = FieldDesc::new("RealOverflow", "has_nanflow");
static OVERFLOW_MINF: FieldDesc = FieldDesc::new("RealOverflow", "minf_mapping");
static OVERFLOW_PINF: FieldDesc = FieldDesc::new("RealOverflow", "pinf_mapping");
static OVERFLOW_NAN: FieldDesc = FieldDesc::new("RealOverflow", "nan_mapping");

pub(crate) struct RealOverflowInner {
    link: Link,
    has_underflow: Field<bool>,
    has_overflow: Field<bool>,
    has_nanflow: Field<bool>,
    minf_mapping: Field<NonRealMapping>,
    pinf_mapping: Field<NonRealMapping>,
    nan_mapping: Field<NonRealMapping>,
}

node_handle!(
    /// Reserved slots for values outside a real domain
    RealOverflow,
    RealOverflowInner
);

impl RealOverflow {
    /// Reserve the given slots; -inf, +inf and NaN map to the slot named
    /// after them when it exists and are dropped otherwise
    pub fn new(has_underflow: bool, has_overflow: bool, has_nanflow: bool) -> Self {
        let pick = |present: bool, mapping: NonRealMapping| {
            if present {
                mapping
            } else {
                NonRealMapping::Missing
            }
        };
        Self(Rc::new(RealOverflowInner {
            link: Link::default(),
            has_underflow: Field::new(&OVERFLOW_UNDERFLOW, has_underflow),
            has_overflow: Field::new(&OVERFLOW_OVERFLOW, has_overflow),
            has_nanflow: Field::new(&OVERFLOW_NANFLOW, has_nanflow),
            minf_mapping: Field::new(
                &OVERFLOW_MINF,
                pick(has_underflow, NonRealMapping::InUnderflow),
            ),
            pinf_mapping: Field::new(&OVERFLOW_PINF, pick(has_overflow, NonRealMapping::InOverflow)),
            nan_mapping: Field::new(&OVERFLOW_NAN, pick(has_nanflow, NonRealMapping::InNanflow)),
        }))
    }

    pub fn with_minf_mapping(self, mapping: NonRealMapping) -> Self {
        self.set_minf_mapping(mapping);
        self
    }

    pub fn with_pinf_mapping(self, mapping: NonRealMapping) -> Self {
        self.set_pinf_mapping(mapping);
        self
    }

    pub fn with_nan_mapping(self, mapping: NonRealMapping) -> Self {
        self.set_nan_mapping(mapping);
        self
    }

    pub fn has_underflow(&self) -> bool {
        self.0.has_underflow.get()
    }

    pub fn set_has_underflow(&self, value: bool) {
        self.0.has_underflow.set(value);
    }

    pub fn has_overflow(&self) -> bool {
        self.0.has_overflow.get()
    }

    pub fn set_has_overflow(&self, value: bool) {
        self.0.has_overflow.set(value);
    }

    pub fn has_nanflow(&self) -> bool {
        self.0.has_nanflow.get()
    }

    pub fn set_has_nanflow(&self, value: bool) {
        self.0.has_nanflow.set(value);
    }

    pub fn minf_mapping(&self) -> NonRealMapping {
        self.0.minf_mapping.get()
    }

    pub fn set_minf_mapping(&self, mapping: NonRealMapping) {
        self.0.minf_mapping.set(mapping);
    }

    pub fn pinf_mapping(&self) -> NonRealMapping {
        self.0.pinf_mapping.get()
    }

    pub fn set_pinf_mapping(&self, mapping: NonRealMapping) {
        self.0.pinf_mapping.set(mapping);
    }

    pub fn nan_mapping(&self) -> NonRealMapping {
        self.0.nan_mapping.get()
    }

    pub fn set_nan_mapping(&self, mapping: NonRealMapping) {
        self.0.nan_mapping.set(mapping);
    }

    /// Number of reserved slots, 0 to 3
    pub fn slots(&self) -> usize {
        [self.has_underflow(), self.has_overflow(), self.has_nanflow()]
            .into_iter()
            .filter(|&flag| flag)
            .count()
    }

    pub(crate) fn from_record(record: &Rc<RealOverflowRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(RealOverflowInner {
            link: Link::attached(parent),
            has_underflow: Field::new(&OVERFLOW_UNDERFLOW, record.has_underflow),
            has_overflow: Field::new(&OVERFLOW_OVERFLOW, record.has_overflow),
            has_nanflow: Field::new(&OVERFLOW_NANFLOW, record.has_nanflow),
            minf_mapping: Field::new(&OVERFLOW_MINF, record.minf_mapping),
            pinf_mapping: Field::new(&OVERFLOW_PINF, record.pinf_mapping),
            nan_mapping: Field::new(&OVERFLOW_NAN, record.nan_mapping),
        }))
    }

    pub(crate) fn to_record(&self) -> RealOverflowRecord {
        RealOverflowRecord {
            has_underflow: self.has_underflow(),
            has_overflow: self.has_overflow(),
            has_nanflow: self.has_nanflow(),
            minf_mapping: self.minf_mapping(),
            pinf_mapping: self.pinf_mapping(),
            nan_mapping: self.nan_mapping(),
        }
    }
}

impl Default for RealOverflow {
    /// Underflow, overflow and nanflow all reserved
    fn default() -> Self {
        Self::new(true, true, true)
    }
}

impl Validate for RealOverflow {
    /// Returns the reserved slot count as a one-dimensional shape
    fn validate(&self, _context: &[usize]) -> Result<Shape> {
        for (field, mapping) in [
            ("minf_mapping", self.minf_mapping()),
            ("pinf_mapping", self.pinf_mapping()),
            ("nan_mapping", self.nan_mapping()),
        ] {
            let reserved = match mapping {
                NonRealMapping::Missing => true,
                NonRealMapping::InUnderflow => self.has_underflow(),
                NonRealMapping::InOverflow => self.has_overflow(),
                NonRealMapping::InNanflow => self.has_nanflow(),
            };
            if !reserved {
                return Err(structure(format!(
                    "RealOverflow.{field} is {mapping} but that slot is not reserved"
                )));
            }
        }
        Ok(vec![self.slots()])
    }
}

// IntegerBinning

static INTEGER_MIN: FieldDesc = FieldDesc::new("IntegerBinning", "min").required();
static INTEGER_MAX: FieldDesc = FieldDesc::new("IntegerBinning", "max").required();
static INTEGER_UNDERFLOW: FieldDesc = FieldDesc::new("IntegerBinning", "has_underflow");
static INTEGER_OVERFLOW: FieldDesc = FieldDesc::new("IntegerBinning", "has_overflow");

pub(crate) struct IntegerBinningInner {
    link: Link,
    min: Field<i64>,
    max: Field<i64>,
    has_underflow: Field<bool>,
    has_overflow: Field<bool>,
}

node_handle!(
    /// One bin per integer in `min..=max`, plus optional under/overflow
    IntegerBinning,
    IntegerBinningInner
);

impl IntegerBinning {
    /// Under- and overflow are both reserved by default
    pub fn new(min: i64, max: i64) -> Self {
        Self(Rc::new(IntegerBinningInner {
            link: Link::default(),
            min: Field::new(&INTEGER_MIN, min),
            max: Field::new(&INTEGER_MAX, max),
            has_underflow: Field::new(&INTEGER_UNDERFLOW, true),
            has_overflow: Field::new(&INTEGER_OVERFLOW, true),
        }))
    }

    pub fn with_has_underflow(self, value: bool) -> Self {
        self.set_has_underflow(value);
        self
    }

    pub fn with_has_overflow(self, value: bool) -> Self {
        self.set_has_overflow(value);
        self
    }

    pub fn min(&self) -> i64 {
        self.0.min.get()
    }

    pub fn set_min(&self, min: i64) {
        self.0.min.set(min);
    }

    pub fn max(&self) -> i64 {
        self.0.max.get()
    }

    pub fn set_max(&self, max: i64) {
        self.0.max.set(max);
    }

    pub fn has_underflow(&self) -> bool {
        self.0.has_underflow.get()
    }

    pub fn set_has_underflow(&self, value: bool) {
        self.0.has_underflow.set(value);
    }

    pub fn has_overflow(&self) -> bool {
        self.0.has_overflow.get()
    }

    pub fn set_has_overflow(&self, value: bool) {
        self.0.has_overflow.set(value);
    }

    pub(crate) fn from_record(record: &Rc<IntegerBinningRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(IntegerBinningInner {
            link: Link::attached(parent),
            min: Field::new(&INTEGER_MIN, record.min),
            max: Field::new(&INTEGER_MAX, record.max),
            has_underflow: Field::new(&INTEGER_UNDERFLOW, record.has_underflow),
            has_overflow: Field::new(&INTEGER_OVERFLOW, record.has_overflow),
        }))
    }

    pub(crate) fn to_record(&self) -> IntegerBinningRecord {
        IntegerBinningRecord {
            min: self.min(),
            max: self.max(),
            has_underflow: self.has_underflow(),
            has_overflow: self.has_overflow(),
        }
    }
}

impl Validate for IntegerBinning {
    fn validate(&self, _context: &[usize]) -> Result<Shape> {
        let (min, max) = (self.min(), self.max());
        if min >= max {
            return Err(structure(format!(
                "IntegerBinning.min ({min}) must be strictly less than IntegerBinning.max ({max})"
            )));
        }
        let slots = i128::from(max) - i128::from(min)
            + 1
            + i128::from(self.has_underflow())
            + i128::from(self.has_overflow());
        Ok(vec![dimension(slots, "IntegerBinning")?])
    }
}

// RegularBinning

static REGULAR_NUM: FieldDesc = FieldDesc::new("RegularBinning", "num").required().at_least(1);
static REGULAR_INTERVAL: FieldDesc = FieldDesc::new("RegularBinning", "interval").required();
static REGULAR_OVERFLOW: FieldDesc = FieldDesc::new("RegularBinning", "overflow");
static REGULAR_CIRCULAR: FieldDesc = FieldDesc::new("RegularBinning", "circular");

pub(crate) struct RegularBinningInner {
    link: Link,
    num: Field<u64>,
    interval: Field<RealInterval>,
    overflow: Field<Option<RealOverflow>>,
    circular: Field<bool>,
}

node_handle!(
    /// `num` equal-width bins over a finite interval
    RegularBinning,
    RegularBinningInner
);

impl RegularBinning {
    pub fn new(num: u64, interval: RealInterval) -> Result<Self> {
        REGULAR_NUM.check_int(num)?;
        let node = Self(Rc::new(RegularBinningInner {
            link: Link::default(),
            num: Field::new(&REGULAR_NUM, num),
            interval: Field::new(&REGULAR_INTERVAL, interval.clone()),
            overflow: Field::new(&REGULAR_OVERFLOW, None),
            circular: Field::new(&REGULAR_CIRCULAR, false),
        }));
        Claims::new()
            .one(&REGULAR_INTERVAL, &interval)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_overflow(self, overflow: RealOverflow) -> Result<Self> {
        self.set_overflow(Some(overflow))?;
        Ok(self)
    }

    pub fn with_circular(self, circular: bool) -> Self {
        self.set_circular(circular);
        self
    }

    pub fn num(&self) -> u64 {
        self.0.num.get()
    }

    pub fn set_num(&self, num: u64) -> Result<()> {
        REGULAR_NUM.check_int(num)?;
        self.0.num.set(num);
        Ok(())
    }

    pub fn interval(&self) -> RealInterval {
        self.0.interval.get()
    }

    pub fn set_interval(&self, interval: RealInterval) -> Result<()> {
        Claims::new()
            .one(&REGULAR_INTERVAL, &interval)
            .commit(&self.weak())?;
        self.0.interval.set(interval);
        Ok(())
    }

    pub fn overflow(&self) -> Option<RealOverflow> {
        self.0.overflow.get()
    }

    pub fn set_overflow(&self, overflow: Option<RealOverflow>) -> Result<()> {
        Claims::new()
            .opt(&REGULAR_OVERFLOW, &overflow)
            .commit(&self.weak())?;
        self.0.overflow.set(overflow);
        Ok(())
    }

    /// True if the last bin wraps around to the first, as for angles
    pub fn circular(&self) -> bool {
        self.0.circular.get()
    }

    pub fn set_circular(&self, circular: bool) {
        self.0.circular.set(circular);
    }

    pub(crate) fn from_record(record: &Rc<RegularBinningRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<RegularBinningInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            RegularBinningInner {
                link: Link::attached(parent),
                num: Field::new(&REGULAR_NUM, record.num),
                interval: Field::lazy(&REGULAR_INTERVAL, record, &me, |r, me| {
                    RealInterval::from_record(&r.interval, me.clone())
                }),
                overflow: Field::lazy(&REGULAR_OVERFLOW, record, &me, |r, me| {
                    r.overflow
                        .as_ref()
                        .map(|o| RealOverflow::from_record(o, me.clone()))
                }),
                circular: Field::new(&REGULAR_CIRCULAR, record.circular),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> RegularBinningRecord {
        RegularBinningRecord {
            num: self.num(),
            interval: Rc::new(self.interval().to_record()),
            overflow: self.overflow().map(|o| Rc::new(o.to_record())),
            circular: self.circular(),
        }
    }
}

impl Validate for RegularBinning {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(REGULAR_NUM.check_int(self.num()))?;
        let interval = self.interval();
        interval.validate(context)?;
        require_finite(&interval, "RegularBinning.interval")?;
        let slots = overflow_slots(&self.overflow(), context, REGULAR_DEFAULT_SLOTS)?;
        let num = dimension(i128::from(self.num()), "RegularBinning")?;
        Ok(vec![num + slots])
    }
}

// TicTacToeOverflowBinning

static TTT_XNUM: FieldDesc = FieldDesc::new("TicTacToeOverflowBinning", "xnum").required().at_least(1);
static TTT_YNUM: FieldDesc = FieldDesc::new("TicTacToeOverflowBinning", "ynum").required().at_least(1);
static TTT_XINTERVAL: FieldDesc = FieldDesc::new("TicTacToeOverflowBinning", "xinterval").required();
static TTT_YINTERVAL: FieldDesc = FieldDesc::new("TicTacToeOverflowBinning", "yinterval").required();
static TTT_XOVERFLOW: FieldDesc = FieldDesc::new("TicTacToeOverflowBinning", "xoverflow");
static TTT_YOVERFLOW: FieldDesc = FieldDesc::new("TicTacToeOverflowBinning", "yoverflow");

pub(crate) struct TicTacToeOverflowBinningInner {
    link: Link,
    xnum: Field<u64>,
    ynum: Field<u64>,
    xinterval: Field<RealInterval>,
    yinterval: Field<RealInterval>,
    xoverflow: Field<Option<RealOverflow>>,
    yoverflow: Field<Option<RealOverflow>>,
}

node_handle!(
    /// Two-dimensional regular grid whose overflow slots surround it on
    /// both axes
    TicTacToeOverflowBinning,
    TicTacToeOverflowBinningInner
);

impl TicTacToeOverflowBinning {
    pub fn new(xnum: u64, ynum: u64, xinterval: RealInterval, yinterval: RealInterval) -> Result<Self> {
        TTT_XNUM.check_int(xnum)?;
        TTT_YNUM.check_int(ynum)?;
        let node = Self(Rc::new(TicTacToeOverflowBinningInner {
            link: Link::default(),
            xnum: Field::new(&TTT_XNUM, xnum),
            ynum: Field::new(&TTT_YNUM, ynum),
            xinterval: Field::new(&TTT_XINTERVAL, xinterval.clone()),
            yinterval: Field::new(&TTT_YINTERVAL, yinterval.clone()),
            xoverflow: Field::new(&TTT_XOVERFLOW, None),
            yoverflow: Field::new(&TTT_YOVERFLOW, None),
        }));
        Claims::new()
            .one(&TTT_XINTERVAL, &xinterval)
            .one(&TTT_YINTERVAL, &yinterval)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_xoverflow(self, overflow: RealOverflow) -> Result<Self> {
        self.set_xoverflow(Some(overflow))?;
        Ok(self)
    }

    pub fn with_yoverflow(self, overflow: RealOverflow) -> Result<Self> {
        self.set_yoverflow(Some(overflow))?;
        Ok(self)
    }

    pub fn xnum(&self) -> u64 {
        self.0.xnum.get()
    }

    pub fn set_xnum(&self, xnum: u64) -> Result<()> {
        TTT_XNUM.check_int(xnum)?;
        self.0.xnum.set(xnum);
        Ok(())
    }

    pub fn ynum(&self) -> u64 {
        self.0.ynum.get()
    }

    pub fn set_ynum(&self, ynum: u64) -> Result<()> {
        TTT_YNUM.check_int(ynum)?;
        self.0.ynum.set(ynum);
        Ok(())
    }

    pub fn xinterval(&self) -> RealInterval {
        self.0.xinterval.get()
    }

    pub fn set_xinterval(&self, interval: RealInterval) -> Result<()> {
        Claims::new()
            .one(&TTT_XINTERVAL, &interval)
            .commit(&self.weak())?;
        self.0.xinterval.set(interval);
        Ok(())
    }

    pub fn yinterval(&self) -> RealInterval {
        self.0.yinterval.get()
    }

    pub fn set_yinterval(&self, interval: RealInterval) -> Result<()> {
        Claims::new()
            .one(&TTT_YINTERVAL, &interval)
            .commit(&self.weak())?;
        self.0.yinterval.set(interval);
        Ok(())
    }

    pub fn xoverflow(&self) -> Option<RealOverflow> {
        self.0.xoverflow.get()
    }

    pub fn set_xoverflow(&self, overflow: Option<RealOverflow>) -> Result<()> {
        Claims::new()
            .opt(&TTT_XOVERFLOW, &overflow)
            .commit(&self.weak())?;
        self.0.xoverflow.set(overflow);
        Ok(())
    }

    pub fn yoverflow(&self) -> Option<RealOverflow> {
        self.0.yoverflow.get()
    }

    pub fn set_yoverflow(&self, overflow: Option<RealOverflow>) -> Result<()> {
        Claims::new()
            .opt(&TTT_YOVERFLOW, &overflow)
            .commit(&self.weak())?;
        self.0.yoverflow.set(overflow);
        Ok(())
    }

    pub(crate) fn from_record(
        record: &Rc<TicTacToeOverflowBinningRecord>,
        parent: Weak<dyn NodeInner>,
    ) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<TicTacToeOverflowBinningInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            TicTacToeOverflowBinningInner {
                link: Link::attached(parent),
                xnum: Field::new(&TTT_XNUM, record.xnum),
                ynum: Field::new(&TTT_YNUM, record.ynum),
                xinterval: Field::lazy(&TTT_XINTERVAL, record, &me, |r, me| {
                    RealInterval::from_record(&r.xinterval, me.clone())
                }),
                yinterval: Field::lazy(&TTT_YINTERVAL, record, &me, |r, me| {
                    RealInterval::from_record(&r.yinterval, me.clone())
                }),
                xoverflow: Field::lazy(&TTT_XOVERFLOW, record, &me, |r, me| {
                    r.xoverflow
                        .as_ref()
                        .map(|o| RealOverflow::from_record(o, me.clone()))
                }),
                yoverflow: Field::lazy(&TTT_YOVERFLOW, record, &me, |r, me| {
                    r.yoverflow
                        .as_ref()
                        .map(|o| RealOverflow::from_record(o, me.clone()))
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> TicTacToeOverflowBinningRecord {
        TicTacToeOverflowBinningRecord {
            xnum: self.xnum(),
            ynum: self.ynum(),
            xinterval: Rc::new(self.xinterval().to_record()),
            yinterval: Rc::new(self.yinterval().to_record()),
            xoverflow: self.xoverflow().map(|o| Rc::new(o.to_record())),
            yoverflow: self.yoverflow().map(|o| Rc::new(o.to_record())),
        }
    }
}

impl Validate for TicTacToeOverflowBinning {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(TTT_XNUM.check_int(self.xnum()))?;
        revalidate(TTT_YNUM.check_int(self.ynum()))?;
        let (xinterval, yinterval) = (self.xinterval(), self.yinterval());
        xinterval.validate(context)?;
        yinterval.validate(context)?;
        require_finite(&xinterval, "TicTacToeOverflowBinning.xinterval")?;
        require_finite(&yinterval, "TicTacToeOverflowBinning.yinterval")?;
        let xslots = overflow_slots(&self.xoverflow(), context, DEFAULT_SLOTS)?;
        let yslots = overflow_slots(&self.yoverflow(), context, DEFAULT_SLOTS)?;
        Ok(vec![
            dimension(i128::from(self.xnum()), "TicTacToeOverflowBinning")? + xslots,
            dimension(i128::from(self.ynum()), "TicTacToeOverflowBinning")? + yslots,
        ])
    }
}

// HexagonalBinning

static HEX_QINTERVAL: FieldDesc = FieldDesc::new("HexagonalBinning", "qinterval").required();
static HEX_RINTERVAL: FieldDesc = FieldDesc::new("HexagonalBinning", "rinterval").required();
static HEX_COORDINATES: FieldDesc = FieldDesc::new("HexagonalBinning", "coordinates");
static HEX_XORIGIN: FieldDesc = FieldDesc::new("HexagonalBinning", "xorigin").finite();
static HEX_YORIGIN: FieldDesc = FieldDesc::new("HexagonalBinning", "yorigin").finite();
static HEX_QNANFLOW: FieldDesc = FieldDesc::new("HexagonalBinning", "q_has_nanflow");
static HEX_RNANFLOW: FieldDesc = FieldDesc::new("HexagonalBinning", "r_has_nanflow");

pub(crate) struct HexagonalBinningInner {
    link: Link,
    qinterval: Field<IntegerBinning>,
    rinterval: Field<IntegerBinning>,
    coordinates: Field<HexagonalCoordinates>,
    xorigin: Field<f64>,
    yorigin: Field<f64>,
    q_has_nanflow: Field<bool>,
    r_has_nanflow: Field<bool>,
}

node_handle!(
    /// Hexagonal tiling addressed by two integer axes
    HexagonalBinning,
    HexagonalBinningInner
);

impl HexagonalBinning {
    pub fn new(qinterval: IntegerBinning, rinterval: IntegerBinning) -> Result<Self> {
        let node = Self(Rc::new(HexagonalBinningInner {
            link: Link::default(),
            qinterval: Field::new(&HEX_QINTERVAL, qinterval.clone()),
            rinterval: Field::new(&HEX_RINTERVAL, rinterval.clone()),
            coordinates: Field::new(&HEX_COORDINATES, HexagonalCoordinates::default()),
            xorigin: Field::new(&HEX_XORIGIN, 0.0),
            yorigin: Field::new(&HEX_YORIGIN, 0.0),
            q_has_nanflow: Field::new(&HEX_QNANFLOW, true),
            r_has_nanflow: Field::new(&HEX_RNANFLOW, true),
        }));
        Claims::new()
            .one(&HEX_QINTERVAL, &qinterval)
            .one(&HEX_RINTERVAL, &rinterval)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_coordinates(self, coordinates: HexagonalCoordinates) -> Self {
        self.set_coordinates(coordinates);
        self
    }

    pub fn with_origin(self, xorigin: f64, yorigin: f64) -> Result<Self> {
        self.set_xorigin(xorigin)?;
        self.set_yorigin(yorigin)?;
        Ok(self)
    }

    pub fn with_nanflow(self, q_has_nanflow: bool, r_has_nanflow: bool) -> Self {
        self.0.q_has_nanflow.set(q_has_nanflow);
        self.0.r_has_nanflow.set(r_has_nanflow);
        self
    }

    pub fn qinterval(&self) -> IntegerBinning {
        self.0.qinterval.get()
    }

    pub fn set_qinterval(&self, interval: IntegerBinning) -> Result<()> {
        Claims::new()
            .one(&HEX_QINTERVAL, &interval)
            .commit(&self.weak())?;
        self.0.qinterval.set(interval);
        Ok(())
    }

    pub fn rinterval(&self) -> IntegerBinning {
        self.0.rinterval.get()
    }

    pub fn set_rinterval(&self, interval: IntegerBinning) -> Result<()> {
        Claims::new()
            .one(&HEX_RINTERVAL, &interval)
            .commit(&self.weak())?;
        self.0.rinterval.set(interval);
        Ok(())
    }

    pub fn coordinates(&self) -> HexagonalCoordinates {
        self.0.coordinates.get()
    }

    pub fn set_coordinates(&self, coordinates: HexagonalCoordinates) {
        self.0.coordinates.set(coordinates);
    }

    pub fn xorigin(&self) -> f64 {
        self.0.xorigin.get()
    }

    pub fn set_xorigin(&self, xorigin: f64) -> Result<()> {
        HEX_XORIGIN.check_real(xorigin)?;
        self.0.xorigin.set(xorigin);
        Ok(())
    }

    pub fn yorigin(&self) -> f64 {
        self.0.yorigin.get()
    }

    pub fn set_yorigin(&self, yorigin: f64) -> Result<()> {
        HEX_YORIGIN.check_real(yorigin)?;
        self.0.yorigin.set(yorigin);
        Ok(())
    }

    pub fn q_has_nanflow(&self) -> bool {
        self.0.q_has_nanflow.get()
    }

    pub fn r_has_nanflow(&self) -> bool {
        self.0.r_has_nanflow.get()
    }

    pub(crate) fn from_record(record: &Rc<HexagonalBinningRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<HexagonalBinningInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            HexagonalBinningInner {
                link: Link::attached(parent),
                qinterval: Field::lazy(&HEX_QINTERVAL, record, &me, |r, me| {
                    IntegerBinning::from_record(&r.qinterval, me.clone())
                }),
                rinterval: Field::lazy(&HEX_RINTERVAL, record, &me, |r, me| {
                    IntegerBinning::from_record(&r.rinterval, me.clone())
                }),
                coordinates: Field::new(&HEX_COORDINATES, record.coordinates),
                xorigin: Field::new(&HEX_XORIGIN, record.xorigin),
                yorigin: Field::new(&HEX_YORIGIN, record.yorigin),
                q_has_nanflow: Field::new(&HEX_QNANFLOW, record.q_has_nanflow),
                r_has_nanflow: Field::new(&HEX_RNANFLOW, record.r_has_nanflow),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> HexagonalBinningRecord {
        HexagonalBinningRecord {
            qinterval: Rc::new(self.qinterval().to_record()),
            rinterval: Rc::new(self.rinterval().to_record()),
            coordinates: self.coordinates(),
            xorigin: self.xorigin(),
            yorigin: self.yorigin(),
            q_has_nanflow: self.q_has_nanflow(),
            r_has_nanflow: self.r_has_nanflow(),
        }
    }
}

impl Validate for HexagonalBinning {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        revalidate(HEX_XORIGIN.check_real(self.xorigin()))?;
        revalidate(HEX_YORIGIN.check_real(self.yorigin()))?;
        let q = self.qinterval().validate(context)?[0];
        let r = self.rinterval().validate(context)?[0];
        Ok(vec![
            q + usize::from(self.q_has_nanflow()),
            r + usize::from(self.r_has_nanflow()),
        ])
    }
}

// EdgesBinning

static EDGES_EDGES: FieldDesc = FieldDesc::new("EdgesBinning", "edges").required().min_len(1);
static EDGES_OVERFLOW: FieldDesc = FieldDesc::new("EdgesBinning", "overflow");

pub(crate) struct EdgesBinningInner {
    link: Link,
    edges: Field<Vec<f64>>,
    overflow: Field<Option<RealOverflow>>,
}

node_handle!(
    /// Adjacent bins separated by explicit edges
    EdgesBinning,
    EdgesBinningInner
);

impl EdgesBinning {
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        EDGES_EDGES.check_len(edges.len())?;
        Ok(Self(Rc::new(EdgesBinningInner {
            link: Link::default(),
            edges: Field::new(&EDGES_EDGES, edges),
            overflow: Field::new(&EDGES_OVERFLOW, None),
        })))
    }

    pub fn with_overflow(self, overflow: RealOverflow) -> Result<Self> {
        self.set_overflow(Some(overflow))?;
        Ok(self)
    }

    pub fn edges(&self) -> Vec<f64> {
        self.0.edges.get()
    }

    pub fn set_edges(&self, edges: Vec<f64>) -> Result<()> {
        EDGES_EDGES.check_len(edges.len())?;
        self.0.edges.set(edges);
        Ok(())
    }

    pub fn overflow(&self) -> Option<RealOverflow> {
        self.0.overflow.get()
    }

    pub fn set_overflow(&self, overflow: Option<RealOverflow>) -> Result<()> {
        Claims::new()
            .opt(&EDGES_OVERFLOW, &overflow)
            .commit(&self.weak())?;
        self.0.overflow.set(overflow);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<EdgesBinningRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<EdgesBinningInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            EdgesBinningInner {
                link: Link::attached(parent),
                edges: Field::lazy(&EDGES_EDGES, record, &me, |r, _| r.edges.clone()),
                overflow: Field::lazy(&EDGES_OVERFLOW, record, &me, |r, me| {
                    r.overflow
                        .as_ref()
                        .map(|o| RealOverflow::from_record(o, me.clone()))
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> EdgesBinningRecord {
        EdgesBinningRecord {
            edges: self.edges(),
            overflow: self.overflow().map(|o| Rc::new(o.to_record())),
        }
    }
}

impl Validate for EdgesBinning {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        let edges = self.edges();
        revalidate(EDGES_EDGES.check_len(edges.len()))?;
        if let Some(edge) = edges.iter().find(|x| !x.is_finite()) {
            return Err(structure(format!("EdgesBinning.edges must be finite, found {edge}")));
        }
        if !is_strictly_increasing(&edges) {
            return Err(structure("EdgesBinning.edges must be strictly increasing"));
        }
        let slots = overflow_slots(&self.overflow(), context, DEFAULT_SLOTS)?;
        Ok(vec![edges.len() - 1 + slots])
    }
}

// IrregularBinning

static IRREGULAR_INTERVALS: FieldDesc =
    FieldDesc::new("IrregularBinning", "intervals").required().min_len(1);
static IRREGULAR_OVERFLOW: FieldDesc = FieldDesc::new("IrregularBinning", "overflow");

pub(crate) struct IrregularBinningInner {
    link: Link,
    intervals: Field<Vec<RealInterval>>,
    overflow: Field<Option<RealOverflow>>,
}

node_handle!(
    /// Bins given as arbitrary intervals, which may leave gaps or overlap
    IrregularBinning,
    IrregularBinningInner
);

impl IrregularBinning {
    pub fn new(intervals: Vec<RealInterval>) -> Result<Self> {
        IRREGULAR_INTERVALS.check_len(intervals.len())?;
        let node = Self(Rc::new(IrregularBinningInner {
            link: Link::default(),
            intervals: Field::new(&IRREGULAR_INTERVALS, intervals.clone()),
            overflow: Field::new(&IRREGULAR_OVERFLOW, None),
        }));
        Claims::new()
            .all(&IRREGULAR_INTERVALS, &intervals)
            .commit(&node.weak())?;
        Ok(node)
    }

    pub fn with_overflow(self, overflow: RealOverflow) -> Result<Self> {
        self.set_overflow(Some(overflow))?;
        Ok(self)
    }

    pub fn intervals(&self) -> Vec<RealInterval> {
        self.0.intervals.get()
    }

    pub fn set_intervals(&self, intervals: Vec<RealInterval>) -> Result<()> {
        IRREGULAR_INTERVALS.check_len(intervals.len())?;
        Claims::new()
            .all(&IRREGULAR_INTERVALS, &intervals)
            .commit(&self.weak())?;
        self.0.intervals.set(intervals);
        Ok(())
    }

    pub fn overflow(&self) -> Option<RealOverflow> {
        self.0.overflow.get()
    }

    pub fn set_overflow(&self, overflow: Option<RealOverflow>) -> Result<()> {
        Claims::new()
            .opt(&IRREGULAR_OVERFLOW, &overflow)
            .commit(&self.weak())?;
        self.0.overflow.set(overflow);
        Ok(())
    }

    pub(crate) fn from_record(record: &Rc<IrregularBinningRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<IrregularBinningInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            IrregularBinningInner {
                link: Link::attached(parent),
                intervals: Field::lazy(&IRREGULAR_INTERVALS, record, &me, |r, me| {
                    r.intervals
                        .iter()
                        .map(|i| RealInterval::from_record(i, me.clone()))
                        .collect()
                }),
                overflow: Field::lazy(&IRREGULAR_OVERFLOW, record, &me, |r, me| {
                    r.overflow
                        .as_ref()
                        .map(|o| RealOverflow::from_record(o, me.clone()))
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> IrregularBinningRecord {
        IrregularBinningRecord {
            intervals: self
                .intervals()
                .iter()
                .map(|i| Rc::new(i.to_record()))
                .collect(),
            overflow: self.overflow().map(|o| Rc::new(o.to_record())),
        }
    }
}

impl Validate for IrregularBinning {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        let intervals = self.intervals();
        revalidate(IRREGULAR_INTERVALS.check_len(intervals.len()))?;
        for interval in &intervals {
            interval.validate(context)?;
        }
        let slots = overflow_slots(&self.overflow(), context, DEFAULT_SLOTS)?;
        Ok(vec![intervals.len() + slots])
    }
}

// CategoryBinning

static CATEGORY_CATEGORIES: FieldDesc = FieldDesc::new("CategoryBinning", "categories").required();

pub(crate) struct CategoryBinningInner {
    link: Link,
    categories: Field<Vec<String>>,
}

node_handle!(
    /// One bin per named category
    CategoryBinning,
    CategoryBinningInner
);

impl CategoryBinning {
    pub fn new<S: Into<String>>(categories: impl IntoIterator<Item = S>) -> Self {
        Self(Rc::new(CategoryBinningInner {
            link: Link::default(),
            categories: Field::new(
                &CATEGORY_CATEGORIES,
                categories.into_iter().map(Into::into).collect(),
            ),
        }))
    }

    pub fn categories(&self) -> Vec<String> {
        self.0.categories.get()
    }

    pub fn set_categories(&self, categories: Vec<String>) {
        self.0.categories.set(categories);
    }

    pub(crate) fn from_record(record: &Rc<CategoryBinningRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<CategoryBinningInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            CategoryBinningInner {
                link: Link::attached(parent),
                categories: Field::lazy(&CATEGORY_CATEGORIES, record, &me, |r, _| {
                    r.categories.clone()
                }),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> CategoryBinningRecord {
        CategoryBinningRecord {
            categories: self.categories(),
        }
    }
}

impl Validate for CategoryBinning {
    fn validate(&self, _context: &[usize]) -> Result<Shape> {
        Ok(vec![self.0.categories.with(Vec::len)])
    }
}

// SparseRegularBinning

static SPARSE_BINS: FieldDesc = FieldDesc::new("SparseRegularBinning", "bins").required();
static SPARSE_BIN_WIDTH: FieldDesc =
    FieldDesc::new("SparseRegularBinning", "bin_width").required().real(0.0, f64::INFINITY, false, true);
static SPARSE_ORIGIN: FieldDesc = FieldDesc::new("SparseRegularBinning", "origin").finite();
static SPARSE_NANFLOW: FieldDesc = FieldDesc::new("SparseRegularBinning", "has_nanflow");

pub(crate) struct SparseRegularBinningInner {
    link: Link,
    bins: Field<Vec<i64>>,
    bin_width: Field<f64>,
    origin: Field<f64>,
    has_nanflow: Field<bool>,
}

node_handle!(
    /// Regular bins over an unbounded domain, only the filled ones listed
    /// by index from `origin`
    SparseRegularBinning,
    SparseRegularBinningInner
);

impl SparseRegularBinning {
    pub fn new(bins: Vec<i64>, bin_width: f64) -> Result<Self> {
        SPARSE_BIN_WIDTH.check_real(bin_width)?;
        Ok(Self(Rc::new(SparseRegularBinningInner {
            link: Link::default(),
            bins: Field::new(&SPARSE_BINS, bins),
            bin_width: Field::new(&SPARSE_BIN_WIDTH, bin_width),
            origin: Field::new(&SPARSE_ORIGIN, 0.0),
            has_nanflow: Field::new(&SPARSE_NANFLOW, true),
        })))
    }

    pub fn with_origin(self, origin: f64) -> Result<Self> {
        self.set_origin(origin)?;
        Ok(self)
    }

    pub fn with_has_nanflow(self, value: bool) -> Self {
        self.set_has_nanflow(value);
        self
    }

    pub fn bins(&self) -> Vec<i64> {
        self.0.bins.get()
    }

    pub fn set_bins(&self, bins: Vec<i64>) {
        self.0.bins.set(bins);
    }

    pub fn bin_width(&self) -> f64 {
        self.0.bin_width.get()
    }

    pub fn set_bin_width(&self, bin_width: f64) -> Result<()> {
        SPARSE_BIN_WIDTH.check_real(bin_width)?;
        self.0.bin_width.set(bin_width);
        Ok(())
    }

    pub fn origin(&self) -> f64 {
        self.0.origin.get()
    }

    pub fn set_origin(&self, origin: f64) -> Result<()> {
        SPARSE_ORIGIN.check_real(origin)?;
        self.0.origin.set(origin);
        Ok(())
    }

    pub fn has_nanflow(&self) -> bool {
        self.0.has_nanflow.get()
    }

    pub fn set_has_nanflow(&self, value: bool) {
        self.0.has_nanflow.set(value);
    }

    pub(crate) fn from_record(
        record: &Rc<SparseRegularBinningRecord>,
        parent: Weak<dyn NodeInner>,
    ) -> Self {
        Self(Rc::new_cyclic(|me: &Weak<SparseRegularBinningInner>| {
            let me: Weak<dyn NodeInner> = me.clone();
            SparseRegularBinningInner {
                link: Link::attached(parent),
                bins: Field::lazy(&SPARSE_BINS, record, &me, |r, _| r.bins.clone()),
                bin_width: Field::new(&SPARSE_BIN_WIDTH, record.bin_width),
                origin: Field::new(&SPARSE_ORIGIN, record.origin),
                has_nanflow: Field::new(&SPARSE_NANFLOW, record.has_nanflow),
            }
        }))
    }

    pub(crate) fn to_record(&self) -> SparseRegularBinningRecord {
        SparseRegularBinningRecord {
            bins: self.bins(),
            bin_width: self.bin_width(),
            origin: self.origin(),
            has_nanflow: self.has_nanflow(),
        }
    }
}

impl Validate for SparseRegularBinning {
    fn validate(&self, _context: &[usize]) -> Result<Shape> {
        revalidate(SPARSE_BIN_WIDTH.check_real(self.bin_width()))?;
        revalidate(SPARSE_ORIGIN.check_real(self.origin()))?;
        let bins = self.bins();
        if let Some(bin) = first_duplicate(bins.iter().copied()) {
            return Err(structure(format!(
                "SparseRegularBinning.bins must be unique; {bin} appears more than once"
            )));
        }
        Ok(vec![bins.len() + usize::from(self.has_nanflow())])
    }
}

// FractionalBinning

static FRACTIONAL_METHOD: FieldDesc = FieldDesc::new("FractionalBinning", "error_method");

pub(crate) struct FractionalBinningInner {
    link: Link,
    error_method: Field<FractionalErrorMethod>,
}

node_handle!(
    /// Marks counts as passing/total efficiencies rather than a spatial axis
    FractionalBinning,
    FractionalBinningInner
);

impl FractionalBinning {
    pub fn new() -> Self {
        Self(Rc::new(FractionalBinningInner {
            link: Link::default(),
            error_method: Field::new(&FRACTIONAL_METHOD, FractionalErrorMethod::default()),
        }))
    }

    pub fn with_error_method(self, method: FractionalErrorMethod) -> Self {
        self.set_error_method(method);
        self
    }

    pub fn error_method(&self) -> FractionalErrorMethod {
        self.0.error_method.get()
    }

    pub fn set_error_method(&self, method: FractionalErrorMethod) {
        self.0.error_method.set(method);
    }

    pub(crate) fn from_record(record: &Rc<FractionalBinningRecord>, parent: Weak<dyn NodeInner>) -> Self {
        Self(Rc::new(FractionalBinningInner {
            link: Link::attached(parent),
            error_method: Field::new(&FRACTIONAL_METHOD, record.error_method),
        }))
    }

    pub(crate) fn to_record(&self) -> FractionalBinningRecord {
        FractionalBinningRecord {
            error_method: self.error_method(),
        }
    }
}

impl Default for FractionalBinning {
    fn default() -> Self {
        Self::new()
    }
}

impl Validate for FractionalBinning {
    fn validate(&self, _context: &[usize]) -> Result<Shape> {
        Ok(vec![1])
    }
}

// Binning

node_union!(
    /// Any of the nine binnings
    Binning {
        Integer(IntegerBinning),
        Regular(RegularBinning),
        TicTacToeOverflow(TicTacToeOverflowBinning),
        Hexagonal(HexagonalBinning),
        Edges(EdgesBinning),
        Irregular(IrregularBinning),
        Category(CategoryBinning),
        SparseRegular(SparseRegularBinning),
        Fractional(FractionalBinning),
    }
);

impl Binning {
    pub(crate) fn from_record(record: &BinningRecord, parent: Weak<dyn NodeInner>) -> Self {
        match record {
            BinningRecord::Integer(r) => IntegerBinning::from_record(r, parent).into(),
            BinningRecord::Regular(r) => RegularBinning::from_record(r, parent).into(),
            BinningRecord::TicTacToeOverflow(r) => {
                TicTacToeOverflowBinning::from_record(r, parent).into()
            }
            BinningRecord::Hexagonal(r) => HexagonalBinning::from_record(r, parent).into(),
            BinningRecord::Edges(r) => EdgesBinning::from_record(r, parent).into(),
            BinningRecord::Irregular(r) => IrregularBinning::from_record(r, parent).into(),
            BinningRecord::Category(r) => CategoryBinning::from_record(r, parent).into(),
            BinningRecord::SparseRegular(r) => SparseRegularBinning::from_record(r, parent).into(),
            BinningRecord::Fractional(r) => FractionalBinning::from_record(r, parent).into(),
        }
    }

    pub(crate) fn to_record(&self) -> BinningRecord {
        match self {
            Binning::Integer(b) => BinningRecord::Integer(Rc::new(b.to_record())),
            Binning::Regular(b) => BinningRecord::Regular(Rc::new(b.to_record())),
            Binning::TicTacToeOverflow(b) => {
                BinningRecord::TicTacToeOverflow(Rc::new(b.to_record()))
            }
            Binning::Hexagonal(b) => BinningRecord::Hexagonal(Rc::new(b.to_record())),
            Binning::Edges(b) => BinningRecord::Edges(Rc::new(b.to_record())),
            Binning::Irregular(b) => BinningRecord::Irregular(Rc::new(b.to_record())),
            Binning::Category(b) => BinningRecord::Category(Rc::new(b.to_record())),
            Binning::SparseRegular(b) => BinningRecord::SparseRegular(Rc::new(b.to_record())),
            Binning::Fractional(b) => BinningRecord::Fractional(Rc::new(b.to_record())),
        }
    }
}

impl Validate for Binning {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        match self {
            Binning::Integer(b) => b.validate(context),
            Binning::Regular(b) => b.validate(context),
            Binning::TicTacToeOverflow(b) => b.validate(context),
            Binning::Hexagonal(b) => b.validate(context),
            Binning::Edges(b) => b.validate(context),
            Binning::Irregular(b) => b.validate(context),
            Binning::Category(b) => b.validate(context),
            Binning::SparseRegular(b) => b.validate(context),
            Binning::Fractional(b) => b.validate(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::ErrorCategory;

    fn unit() -> RealInterval {
        RealInterval::new(0.0, 1.0).unwrap()
    }

    #[test]
    fn test_regular_default_overflow() {
        let binning = RegularBinning::new(10, unit()).unwrap();
        assert_eq!(binning.validate(&[]).unwrap(), vec![12]);

        let binning = RegularBinning::new(10, unit())
            .unwrap()
            .with_overflow(RealOverflow::new(false, false, false))
            .unwrap();
        assert_eq!(binning.validate(&[]).unwrap(), vec![10]);

        let binning = RegularBinning::new(10, unit())
            .unwrap()
            .with_overflow(RealOverflow::default())
            .unwrap();
        assert_eq!(binning.validate(&[]).unwrap(), vec![13]);
    }

    #[test]
    fn test_regular_constraints() {
        let err = RegularBinning::new(0, unit()).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));

        let infinite = RealInterval::new(0.0, f64::INFINITY).unwrap();
        let binning = RegularBinning::new(5, infinite).unwrap();
        assert!(binning.validate(&[]).unwrap_err().is_structural());
    }

    #[test]
    fn test_integer_binning() {
        let err = IntegerBinning::new(3, 3).validate(&[]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));

        let binning = IntegerBinning::new(0, 9).with_has_overflow(false);
        assert_eq!(binning.validate(&[]).unwrap(), vec![11]);
        let binning = IntegerBinning::new(-5, 5)
            .with_has_underflow(false)
            .with_has_overflow(false);
        assert_eq!(binning.validate(&[]).unwrap(), vec![11]);
    }

    #[test]
    fn test_edges_binning() {
        let err = EdgesBinning::new(vec![0.0, 1.0, 1.0, 2.0])
            .unwrap()
            .validate(&[])
            .unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Structure));

        let binning = EdgesBinning::new(vec![0.0, 1.0, 3.0]).unwrap();
        assert_eq!(binning.validate(&[]).unwrap(), vec![5]);

        assert!(EdgesBinning::new(vec![]).is_err());
        assert!(EdgesBinning::new(vec![0.0, f64::NAN]).unwrap().validate(&[]).is_err());
    }

    #[test]
    fn test_real_interval() {
        let inverted = RealInterval::new(2.0, 1.0).unwrap();
        assert!(inverted.validate(&[]).unwrap_err().is_structural());

        let point = RealInterval::new(1.0, 1.0).unwrap().with_low_inclusive(false);
        assert!(point.validate(&[]).is_err());
        point.set_high_inclusive(true);
        assert!(point.validate(&[]).is_ok());

        let err = RealInterval::new(f64::NAN, 1.0).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
    }

    #[test]
    fn test_overflow_mappings() {
        let overflow = RealOverflow::new(true, false, true);
        assert_eq!(overflow.slots(), 2);
        assert_eq!(overflow.pinf_mapping(), NonRealMapping::Missing);
        assert_eq!(overflow.validate(&[]).unwrap(), vec![2]);

        let overflow = RealOverflow::new(true, false, false).with_nan_mapping(NonRealMapping::InNanflow);
        assert!(overflow.validate(&[]).unwrap_err().is_structural());

        let overflow = RealOverflow::new(true, false, false).with_nan_mapping(NonRealMapping::InUnderflow);
        assert!(overflow.validate(&[]).is_ok());
    }

    #[test]
    fn test_two_dimensional_binnings() {
        let ttt = TicTacToeOverflowBinning::new(
            4,
            3,
            unit(),
            RealInterval::new(-1.0, 1.0).unwrap(),
        )
        .unwrap()
        .with_yoverflow(RealOverflow::new(true, true, false))
        .unwrap();
        assert_eq!(ttt.validate(&[]).unwrap(), vec![7, 5]);

        let hex = HexagonalBinning::new(
            IntegerBinning::new(0, 4).with_has_underflow(false).with_has_overflow(false),
            IntegerBinning::new(0, 2),
        )
        .unwrap()
        .with_nanflow(false, true);
        assert_eq!(hex.validate(&[]).unwrap(), vec![5, 6]);

        let err = HexagonalBinning::new(IntegerBinning::new(0, 1), IntegerBinning::new(0, 1))
            .unwrap()
            .with_origin(f64::INFINITY, 0.0)
            .unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::AttributeConstraint));
    }

    #[test]
    fn test_other_binnings() {
        let irregular = IrregularBinning::new(vec![
            RealInterval::new(0.0, 1.0).unwrap(),
            RealInterval::new(0.5, 3.0).unwrap(),
        ])
        .unwrap();
        assert_eq!(irregular.validate(&[]).unwrap(), vec![5]);

        let category = CategoryBinning::new(["a", "b", "c"]);
        assert_eq!(category.validate(&[]).unwrap(), vec![3]);

        let sparse = SparseRegularBinning::new(vec![-3, 0, 7], 0.5).unwrap();
        assert_eq!(sparse.validate(&[]).unwrap(), vec![4]);
        sparse.set_bins(vec![1, 1]);
        assert!(sparse.validate(&[]).is_err());
        assert!(SparseRegularBinning::new(vec![], 0.0).is_err());

        assert_eq!(FractionalBinning::new().validate(&[]).unwrap(), vec![1]);
    }

    #[test]
    fn test_interval_cannot_be_shared() {
        let interval = unit();
        let _first = RegularBinning::new(10, interval.clone()).unwrap();
        let err = RegularBinning::new(10, interval).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Ownership));

        let a = unit();
        let err = IrregularBinning::new(vec![a.clone(), a.clone()]).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Ownership));
        assert!(!a.is_attached());
    }

    #[test]
    fn test_decoded_binning_is_lazy() {
        let record = Rc::new(RegularBinningRecord {
            num: 4,
            interval: Rc::new(unit().to_record()),
            overflow: None,
            circular: false,
        });
        let parent = unit();
        let binning = RegularBinning::from_record(&record, parent.weak());
        assert!(!binning.0.interval.is_materialized());
        assert_eq!(binning.validate(&[]).unwrap(), vec![6]);
        assert!(binning.0.interval.is_materialized());
        assert!(binning.interval().is_attached());
        assert_eq!(binning.interval(), binning.interval());
    }
}
