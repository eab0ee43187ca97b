//! Interval abstraction over stream values.
//!
//! An interval stands for the set of concrete values one (signal, step) pair
//! may take across a family of models. Boolean streams use a three-valued
//! domain, numeric streams a closed range with possibly infinite endpoints.
//! All operations over-approximate: the result interval contains every value
//! the operation can produce from the operands, which keeps a `True`/`False`
//! verdict from a consistency check trustworthy.

pub mod generalize;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolInterval {
    True,
    False,
    /// Both truth values are allowed.
    Arbitrary,
}

impl BoolInterval {
    pub fn from_bool(b: bool) -> Self {
        if b { BoolInterval::True } else { BoolInterval::False }
    }

    pub fn is_true(self) -> bool {
        self == BoolInterval::True
    }

    pub fn is_false(self) -> bool {
        self == BoolInterval::False
    }

    pub fn is_arbitrary(self) -> bool {
        self == BoolInterval::Arbitrary
    }

    pub fn not(self) -> Self {
        match self {
            BoolInterval::True => BoolInterval::False,
            BoolInterval::False => BoolInterval::True,
            BoolInterval::Arbitrary => BoolInterval::Arbitrary,
        }
    }

    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (BoolInterval::False, _) | (_, BoolInterval::False) => BoolInterval::False,
            (BoolInterval::True, BoolInterval::True) => BoolInterval::True,
            _ => BoolInterval::Arbitrary,
        }
    }

    pub fn or(self, other: Self) -> Self {
        self.not().and(other.not()).not()
    }

    pub fn implies(self, other: Self) -> Self {
        self.not().or(other)
    }

    pub fn iff(self, other: Self) -> Self {
        match (self, other) {
            (BoolInterval::Arbitrary, _) | (_, BoolInterval::Arbitrary) => BoolInterval::Arbitrary,
            (a, b) if a == b => BoolInterval::True,
            _ => BoolInterval::False,
        }
    }

    pub fn join(self, other: Self) -> Self {
        if self == other { self } else { BoolInterval::Arbitrary }
    }
}

impl fmt::Display for BoolInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolInterval::True => write!(f, "true"),
            BoolInterval::False => write!(f, "false"),
            BoolInterval::Arbitrary => write!(f, "arbitrary"),
        }
    }
}

/// One bound of a numeric interval. Integer endpoints are exact, real
/// endpoints are exact rationals, matching raw solver model values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    NegInf,
    Int(BigInt),
    Real(BigRational),
    PosInf,
}

impl Endpoint {
    fn as_rational(&self) -> Option<BigRational> {
        match self {
            Endpoint::Int(i) => Some(BigRational::from_integer(i.clone())),
            Endpoint::Real(r) => Some(r.clone()),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Endpoint::Int(_) | Endpoint::Real(_))
    }

    fn is_zero(&self) -> bool {
        match self {
            Endpoint::Int(i) => i.is_zero(),
            Endpoint::Real(r) => r.is_zero(),
            _ => false,
        }
    }

    fn is_positive(&self) -> bool {
        match self {
            Endpoint::PosInf => true,
            Endpoint::Int(i) => i.is_positive(),
            Endpoint::Real(r) => r.is_positive(),
            Endpoint::NegInf => false,
        }
    }

    fn neg(&self) -> Endpoint {
        match self {
            Endpoint::NegInf => Endpoint::PosInf,
            Endpoint::PosInf => Endpoint::NegInf,
            Endpoint::Int(i) => Endpoint::Int(-i),
            Endpoint::Real(r) => Endpoint::Real(-r),
        }
    }

    fn add(&self, other: &Endpoint) -> Endpoint {
        match (self, other) {
            (Endpoint::NegInf, Endpoint::PosInf) | (Endpoint::PosInf, Endpoint::NegInf) => {
                unreachable!("adding opposite infinities")
            }
            (Endpoint::NegInf, _) | (_, Endpoint::NegInf) => Endpoint::NegInf,
            (Endpoint::PosInf, _) | (_, Endpoint::PosInf) => Endpoint::PosInf,
            (Endpoint::Int(a), Endpoint::Int(b)) => Endpoint::Int(a + b),
            (a, b) => Endpoint::Real(a.as_rational().unwrap() + b.as_rational().unwrap()),
        }
    }

    fn mul(&self, other: &Endpoint) -> Endpoint {
        // inf * 0 contributes 0; the remaining candidates cover the hull
        if self.is_zero() || other.is_zero() {
            return match (self, other) {
                (Endpoint::Real(_), _) | (_, Endpoint::Real(_)) => {
                    Endpoint::Real(BigRational::zero())
                }
                _ => Endpoint::Int(BigInt::zero()),
            };
        }
        match (self, other) {
            (Endpoint::Int(a), Endpoint::Int(b)) => Endpoint::Int(a * b),
            (a, b) if a.is_finite() && b.is_finite() => {
                Endpoint::Real(a.as_rational().unwrap() * b.as_rational().unwrap())
            }
            (a, b) => {
                if a.is_positive() == b.is_positive() {
                    Endpoint::PosInf
                } else {
                    Endpoint::NegInf
                }
            }
        }
    }
}

impl PartialOrd for Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Endpoint::NegInf, Endpoint::NegInf) | (Endpoint::PosInf, Endpoint::PosInf) => {
                Ordering::Equal
            }
            (Endpoint::NegInf, _) | (_, Endpoint::PosInf) => Ordering::Less,
            (_, Endpoint::NegInf) | (Endpoint::PosInf, _) => Ordering::Greater,
            (Endpoint::Int(a), Endpoint::Int(b)) => a.cmp(b),
            (a, b) => a.as_rational().unwrap().cmp(&b.as_rational().unwrap()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::NegInf => write!(f, "-inf"),
            Endpoint::PosInf => write!(f, "inf"),
            Endpoint::Int(i) => write!(f, "{i}"),
            Endpoint::Real(r) => write!(f, "{r}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumericInterval {
    pub lo: Endpoint,
    pub hi: Endpoint,
}

impl NumericInterval {
    pub fn new(lo: Endpoint, hi: Endpoint) -> Self {
        debug_assert!(lo <= hi, "inverted interval");
        Self { lo, hi }
    }

    pub fn singleton(p: Endpoint) -> Self {
        Self { lo: p.clone(), hi: p }
    }

    pub fn full() -> Self {
        Self { lo: Endpoint::NegInf, hi: Endpoint::PosInf }
    }

    pub fn is_arbitrary(&self) -> bool {
        self.lo == Endpoint::NegInf && self.hi == Endpoint::PosInf
    }

    pub fn is_singleton(&self) -> bool {
        self.lo.is_finite() && self.lo == self.hi
    }

    pub fn contains_zero(&self) -> bool {
        let zero = Endpoint::Int(BigInt::zero());
        self.lo <= zero && zero <= self.hi
    }

    pub fn neg(&self) -> Self {
        Self::new(self.hi.neg(), self.lo.neg())
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.lo.add(&other.lo), self.hi.add(&other.hi))
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Self) -> Self {
        let candidates = [
            self.lo.mul(&other.lo),
            self.lo.mul(&other.hi),
            self.hi.mul(&other.lo),
            self.hi.mul(&other.hi),
        ];
        let lo = candidates.iter().min().unwrap().clone();
        let hi = candidates.iter().max().unwrap().clone();
        Self::new(lo, hi)
    }

    /// Real division. A divisor spanning zero or any unbounded operand
    /// widens to the full line.
    pub fn div(&self, other: &Self) -> Self {
        if other.contains_zero()
            || !self.lo.is_finite()
            || !self.hi.is_finite()
            || !other.lo.is_finite()
            || !other.hi.is_finite()
        {
            return Self::full();
        }
        let quot = |a: &Endpoint, b: &Endpoint| {
            Endpoint::Real(a.as_rational().unwrap() / b.as_rational().unwrap())
        };
        let candidates = [
            quot(&self.lo, &other.lo),
            quot(&self.lo, &other.hi),
            quot(&self.hi, &other.lo),
            quot(&self.hi, &other.hi),
        ];
        let lo = candidates.iter().min().unwrap().clone();
        let hi = candidates.iter().max().unwrap().clone();
        Self::new(lo, hi)
    }

    /// Truncating integer division; only exact on singletons.
    pub fn int_div(&self, other: &Self) -> Self {
        match (self.exact_int(), other.exact_int()) {
            (Some(a), Some(b)) if !b.is_zero() => Self::singleton(Endpoint::Int(a / b)),
            _ => Self::full(),
        }
    }

    /// Remainder with the sign of the dividend; only exact on singletons.
    pub fn rem(&self, other: &Self) -> Self {
        match (self.exact_int(), other.exact_int()) {
            (Some(a), Some(b)) if !b.is_zero() => Self::singleton(Endpoint::Int(a % b)),
            _ => Self::full(),
        }
    }

    fn exact_int(&self) -> Option<BigInt> {
        if !self.is_singleton() {
            return None;
        }
        match &self.lo {
            Endpoint::Int(i) => Some(i.clone()),
            _ => None,
        }
    }

    pub fn lt(&self, other: &Self) -> BoolInterval {
        if self.hi < other.lo {
            BoolInterval::True
        } else if self.lo >= other.hi {
            BoolInterval::False
        } else {
            BoolInterval::Arbitrary
        }
    }

    pub fn le(&self, other: &Self) -> BoolInterval {
        if self.hi <= other.lo {
            BoolInterval::True
        } else if self.lo > other.hi {
            BoolInterval::False
        } else {
            BoolInterval::Arbitrary
        }
    }

    pub fn eq_num(&self, other: &Self) -> BoolInterval {
        if self.is_singleton() && other.is_singleton() && self.lo == other.lo {
            BoolInterval::True
        } else if self.hi < other.lo || self.lo > other.hi {
            BoolInterval::False
        } else {
            BoolInterval::Arbitrary
        }
    }

    pub fn join(&self, other: &Self) -> Self {
        Self::new(
            self.lo.clone().min(other.lo.clone()),
            self.hi.clone().max(other.hi.clone()),
        )
    }
}

impl fmt::Display for NumericInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_singleton() {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interval {
    Bool(BoolInterval),
    Numeric(NumericInterval),
}

impl Interval {
    pub fn is_arbitrary(&self) -> bool {
        match self {
            Interval::Bool(b) => b.is_arbitrary(),
            Interval::Numeric(n) => n.is_arbitrary(),
        }
    }

    pub fn as_bool(&self) -> Option<BoolInterval> {
        match self {
            Interval::Bool(b) => Some(*b),
            Interval::Numeric(_) => None,
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericInterval> {
        match self {
            Interval::Numeric(n) => Some(n),
            Interval::Bool(_) => None,
        }
    }

    pub fn join(&self, other: &Interval) -> Option<Interval> {
        match (self, other) {
            (Interval::Bool(a), Interval::Bool(b)) => Some(Interval::Bool(a.join(*b))),
            (Interval::Numeric(a), Interval::Numeric(b)) => Some(Interval::Numeric(a.join(b))),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Bool(b) => write!(f, "{b}"),
            Interval::Numeric(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Endpoint {
        Endpoint::Int(BigInt::from(i))
    }

    fn iv(lo: i64, hi: i64) -> NumericInterval {
        NumericInterval::new(int(lo), int(hi))
    }

    #[test]
    fn three_valued_bool() {
        use BoolInterval::*;
        assert_eq!(False.and(Arbitrary), False);
        assert_eq!(True.and(Arbitrary), Arbitrary);
        assert_eq!(True.or(Arbitrary), True);
        assert_eq!(Arbitrary.not(), Arbitrary);
        assert_eq!(False.implies(Arbitrary), True);
        assert_eq!(Arbitrary.iff(True), Arbitrary);
        assert_eq!(True.join(False), Arbitrary);
    }

    #[test]
    fn multiply_signs() {
        assert_eq!(iv(-2, 3).mul(&iv(4, 5)), iv(-10, 15));
        assert_eq!(iv(-2, -1).mul(&iv(-3, -2)), iv(2, 6));
        let unbounded = NumericInterval::new(int(1), Endpoint::PosInf);
        assert_eq!(
            iv(-1, 2).mul(&unbounded),
            NumericInterval::new(Endpoint::NegInf, Endpoint::PosInf)
        );
        assert_eq!(iv(0, 0).mul(&unbounded), iv(0, 0));
    }

    #[test]
    fn division_over_zero_widens() {
        assert_eq!(iv(1, 2).div(&iv(-1, 1)), NumericInterval::full());
        let r = |n: i64, d: i64| Endpoint::Real(BigRational::new(BigInt::from(n), BigInt::from(d)));
        assert_eq!(iv(1, 2).div(&iv(2, 4)), NumericInterval::new(r(1, 4), r(1, 1)));
    }

    #[test]
    fn comparisons_three_valued() {
        assert_eq!(iv(0, 1).lt(&iv(2, 3)), BoolInterval::True);
        assert_eq!(iv(2, 3).lt(&iv(0, 1)), BoolInterval::False);
        assert_eq!(iv(0, 2).lt(&iv(1, 3)), BoolInterval::Arbitrary);
        assert_eq!(iv(1, 2).le(&iv(2, 3)), BoolInterval::True);
        assert_eq!(iv(2, 2).eq_num(&iv(2, 2)), BoolInterval::True);
        assert_eq!(iv(0, 1).eq_num(&iv(2, 3)), BoolInterval::False);
        assert_eq!(iv(0, 2).eq_num(&iv(1, 3)), BoolInterval::Arbitrary);
    }

    #[test]
    fn join_is_hull() {
        assert_eq!(iv(0, 1).join(&iv(5, 9)), iv(0, 9));
        let half = NumericInterval::new(Endpoint::NegInf, int(3));
        assert_eq!(iv(0, 7).join(&half), NumericInterval::new(Endpoint::NegInf, int(7)));
    }
}
