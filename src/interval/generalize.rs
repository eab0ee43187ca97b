//! Interval generalization of a falsifying model.
//!
//! Starting from one concrete counterexample, compute per (signal, step) the
//! loosest interval that still falsifies the property at step k-1 while
//! every assertion holds at steps 0..k-1. Free signals (those without a
//! defining equation) are widened directly; defined signals re-derive their
//! intervals through their equations.

use crate::cex::{CexValue, Counterexample};
use crate::expr::{BinaryOp, Expr, Type, UnaryOp, Value};
use crate::interval::{BoolInterval, Endpoint, Interval, NumericInterval};
use crate::solver::{Model, RawValue};
use crate::spec::{ReverseDependencyMap, Specification};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::One;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Bounds the binary refinement of rational endpoints, which would otherwise
/// never terminate.
const REAL_REFINE_STEPS: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneralizeError {
    #[error("algebraic loop while evaluating {id} at step {step}")]
    AlgebraicLoop { id: String, step: i64 },
    #[error("model is inconsistent with the reported violation")]
    InconsistentSeed,
    #[error("model has no value for {id} at step {step}")]
    MissingValue { id: String, step: i64 },
    #[error("model value for {id} at step {step} does not parse as its declared type")]
    UnparseableValue { id: String, step: i64 },
    #[error("no declared type for {id}")]
    UnknownType { id: String },
    #[error("ill-typed expression during interval evaluation")]
    TypeMismatch,
}

/// The unit of memoization: one signal at one time step.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdIndexPair {
    pub id: String,
    pub step: i64,
}

impl IdIndexPair {
    fn new(id: impl Into<String>, step: i64) -> Self {
        Self { id: id.into(), step }
    }
}

pub struct ModelGeneralizer {
    spec: Arc<Specification>,
    property: String,
    basis: Arc<dyn Model>,
    k: usize,

    equations: HashMap<String, Arc<Expr>>,
    /// Signals eligible for generalization: the property cone.
    cone: BTreeSet<String>,
    depends_on: ReverseDependencyMap,

    cache: HashMap<IdIndexPair, Interval>,
    generalized: HashMap<IdIndexPair, Interval>,
    to_generalize: VecDeque<IdIndexPair>,
    queued: HashSet<IdIndexPair>,
    /// Pairs currently under evaluation; re-entry is an algebraic loop.
    working: HashSet<IdIndexPair>,
}

impl ModelGeneralizer {
    pub fn new(
        spec: Arc<Specification>,
        property: impl Into<String>,
        model: Arc<dyn Model>,
        k: usize,
    ) -> Self {
        let property = property.into();
        let equations = spec
            .node
            .equations
            .iter()
            .map(|eq| (eq.lhs.clone(), Arc::new(eq.rhs.clone())))
            .collect();
        let cone = spec.property_cone(&property);
        let depends_on = ReverseDependencyMap::new(&spec, &property);
        Self {
            spec,
            property,
            basis: model,
            k,
            equations,
            cone,
            depends_on,
            cache: HashMap::new(),
            generalized: HashMap::new(),
            to_generalize: VecDeque::new(),
            queued: HashSet::new(),
            working: HashSet::new(),
        }
    }

    pub fn generalize(mut self) -> Result<Counterexample, GeneralizeError> {
        // seeding fills the to-generalize queue as a side effect
        if !self.model_consistent()? {
            return Err(GeneralizeError::InconsistentSeed);
        }
        // the queue keeps growing while generalizations make new pairs relevant
        while let Some(pair) = self.to_generalize.pop_front() {
            self.queued.remove(&pair);
            let interval = self.generalize_interval(&pair)?;
            self.generalized.insert(pair, interval);
        }
        self.extract()
    }

    fn generalize_interval(&mut self, pair: &IdIndexPair) -> Result<Interval, GeneralizeError> {
        let ty = self
            .spec
            .type_map
            .get(&pair.id)
            .cloned()
            .ok_or_else(|| GeneralizeError::UnknownType { id: pair.id.clone() })?;
        match ty {
            Type::Bool => {
                if self.consistent_with(pair, Interval::Bool(BoolInterval::Arbitrary))? {
                    Ok(Interval::Bool(BoolInterval::Arbitrary))
                } else {
                    self.original(pair)
                }
            }
            Type::Subrange { .. } => {
                if self.consistent_with(pair, Interval::Numeric(NumericInterval::full()))? {
                    Ok(Interval::Numeric(NumericInterval::full()))
                } else {
                    self.original(pair)
                }
            }
            Type::Int => {
                let initial = self.original_numeric(pair)?;
                self.widen_int(pair, initial)
            }
            Type::Real => {
                let initial = self.original_numeric(pair)?;
                self.widen_real(pair, initial)
            }
        }
    }

    fn original(&mut self, pair: &IdIndexPair) -> Result<Interval, GeneralizeError> {
        let id = pair.id.clone();
        self.eval_id(&id, pair.step)
    }

    fn original_numeric(&mut self, pair: &IdIndexPair) -> Result<NumericInterval, GeneralizeError> {
        self.original(pair)?
            .as_numeric()
            .cloned()
            .ok_or(GeneralizeError::TypeMismatch)
    }

    /// Property false at k-1, every assertion true at steps 0..k-1.
    fn model_consistent(&mut self) -> Result<bool, GeneralizeError> {
        let property = self.property.clone();
        let pi = self
            .eval_id(&property, self.k as i64 - 1)?
            .as_bool()
            .ok_or(GeneralizeError::TypeMismatch)?;
        if !pi.is_false() {
            return Ok(false);
        }
        let spec = self.spec.clone();
        for assertion in &spec.node.assertions {
            for i in 0..self.k as i64 {
                let ai = self
                    .eval_expr(assertion, i)?
                    .as_bool()
                    .ok_or(GeneralizeError::TypeMismatch)?;
                if !ai.is_true() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Does substituting `proposed` at `pair` keep the model falsifying?
    /// The trial is rolled back regardless of the outcome, leaving no
    /// residue in the cache.
    fn consistent_with(
        &mut self,
        pair: &IdIndexPair,
        proposed: Interval,
    ) -> Result<bool, GeneralizeError> {
        self.clear_cache_from(pair);
        self.cache.insert(pair.clone(), proposed);
        let result = self.model_consistent();
        self.clear_cache_from(pair);
        result
    }

    /// Evict every cached value that may depend on `pair`, at its step and
    /// all later ones.
    fn clear_cache_from(&mut self, pair: &IdIndexPair) {
        let Some(affected) = self.depends_on.get(&pair.id) else {
            for step in pair.step..self.k as i64 {
                self.cache.remove(&IdIndexPair::new(pair.id.clone(), step));
            }
            return;
        };
        for dep in affected.clone() {
            for step in pair.step..self.k as i64 {
                self.cache.remove(&IdIndexPair::new(dep.clone(), step));
            }
        }
    }

    fn eval_id(&mut self, id: &str, i: i64) -> Result<Interval, GeneralizeError> {
        let pair = IdIndexPair::new(id, i);
        if let Some(cached) = self.cache.get(&pair) {
            return Ok(cached.clone());
        }
        let result = if i >= 0 && self.equations.contains_key(id) {
            let equation = self.equations[id].clone();
            if !self.working.insert(pair.clone()) {
                return Err(GeneralizeError::AlgebraicLoop { id: id.to_string(), step: i });
            }
            let result = self.eval_expr(&equation, i);
            self.working.remove(&pair);
            result?
        } else if let Some(generalized) = self.generalized.get(&pair) {
            generalized.clone()
        } else {
            let value = self.from_basis(&pair)?;
            // assertions may read signals the property does not depend on;
            // those stay concrete and are never queued
            if i >= 0 && self.cone.contains(id) && self.queued.insert(pair.clone()) {
                self.to_generalize.push_back(pair.clone());
            }
            value
        };
        self.cache.insert(pair, result.clone());
        Ok(result)
    }

    fn from_basis(&self, pair: &IdIndexPair) -> Result<Interval, GeneralizeError> {
        let raw = self
            .basis
            .stream_value(&pair.id, pair.step)
            .ok_or_else(|| GeneralizeError::MissingValue {
                id: pair.id.clone(),
                step: pair.step,
            })?;
        if let RawValue::Bool(b) = raw {
            return Ok(Interval::Bool(BoolInterval::from_bool(b)));
        }
        let ty = self
            .spec
            .type_map
            .get(&pair.id)
            .ok_or_else(|| GeneralizeError::UnknownType { id: pair.id.clone() })?;
        let value = raw.parse(ty).ok_or_else(|| GeneralizeError::UnparseableValue {
            id: pair.id.clone(),
            step: pair.step,
        })?;
        Ok(match value {
            Value::Bool(b) => Interval::Bool(BoolInterval::from_bool(b)),
            Value::Integer(n) => Interval::Numeric(NumericInterval::singleton(Endpoint::Int(n))),
            Value::Real(r) => Interval::Numeric(NumericInterval::singleton(Endpoint::Real(r))),
        })
    }

    fn eval_expr(&mut self, expr: &Expr, i: i64) -> Result<Interval, GeneralizeError> {
        match expr {
            Expr::Id(id) => {
                let id = id.clone();
                self.eval_id(&id, i)
            }
            Expr::Bool(b) => Ok(Interval::Bool(BoolInterval::from_bool(*b))),
            Expr::Int(n) => Ok(Interval::Numeric(NumericInterval::singleton(Endpoint::Int(
                n.clone(),
            )))),
            Expr::Real(r) => Ok(Interval::Numeric(NumericInterval::singleton(Endpoint::Real(
                r.clone(),
            )))),
            Expr::Unary(op, e) => match op {
                UnaryOp::Pre => self.eval_expr(e, i - 1),
                UnaryOp::Not => Ok(Interval::Bool(self.eval_bool(e, i)?.not())),
                UnaryOp::Neg => Ok(Interval::Numeric(self.eval_numeric(e, i)?.neg())),
            },
            Expr::Binary(op, l, r) => self.eval_binary(*op, l, r, i),
            Expr::Ite(c, t, e) => match self.eval_bool(c, i)? {
                BoolInterval::True => self.eval_expr(t, i),
                BoolInterval::False => self.eval_expr(e, i),
                BoolInterval::Arbitrary => {
                    let tv = self.eval_expr(t, i)?;
                    let ev = self.eval_expr(e, i)?;
                    tv.join(&ev).ok_or(GeneralizeError::TypeMismatch)
                }
            },
        }
    }

    fn eval_bool(&mut self, expr: &Expr, i: i64) -> Result<BoolInterval, GeneralizeError> {
        self.eval_expr(expr, i)?
            .as_bool()
            .ok_or(GeneralizeError::TypeMismatch)
    }

    fn eval_numeric(&mut self, expr: &Expr, i: i64) -> Result<NumericInterval, GeneralizeError> {
        self.eval_expr(expr, i)?
            .as_numeric()
            .cloned()
            .ok_or(GeneralizeError::TypeMismatch)
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        l: &Expr,
        r: &Expr,
        i: i64,
    ) -> Result<Interval, GeneralizeError> {
        match op {
            BinaryOp::Arrow => {
                if i == 0 {
                    self.eval_expr(l, i)
                } else {
                    self.eval_expr(r, i)
                }
            }
            BinaryOp::And => {
                let lv = self.eval_bool(l, i)?;
                let rv = self.eval_bool(r, i)?;
                Ok(Interval::Bool(lv.and(rv)))
            }
            BinaryOp::Or => {
                let lv = self.eval_bool(l, i)?;
                let rv = self.eval_bool(r, i)?;
                Ok(Interval::Bool(lv.or(rv)))
            }
            BinaryOp::Implies => {
                let lv = self.eval_bool(l, i)?;
                let rv = self.eval_bool(r, i)?;
                Ok(Interval::Bool(lv.implies(rv)))
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let lv = self.eval_expr(l, i)?;
                let rv = self.eval_expr(r, i)?;
                let eq = match (&lv, &rv) {
                    (Interval::Bool(a), Interval::Bool(b)) => a.iff(*b),
                    (Interval::Numeric(a), Interval::Numeric(b)) => a.eq_num(b),
                    _ => return Err(GeneralizeError::TypeMismatch),
                };
                let result = if op == BinaryOp::Ne { eq.not() } else { eq };
                Ok(Interval::Bool(result))
            }
            BinaryOp::Lt => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Bool(lv.lt(&rv)))
            }
            BinaryOp::Le => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Bool(lv.le(&rv)))
            }
            BinaryOp::Gt => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Bool(rv.lt(&lv)))
            }
            BinaryOp::Ge => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Bool(rv.le(&lv)))
            }
            BinaryOp::Add => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Numeric(lv.add(&rv)))
            }
            BinaryOp::Sub => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Numeric(lv.sub(&rv)))
            }
            BinaryOp::Mul => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Numeric(lv.mul(&rv)))
            }
            BinaryOp::Div => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Numeric(lv.div(&rv)))
            }
            BinaryOp::IntDiv => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Numeric(lv.int_div(&rv)))
            }
            BinaryOp::Mod => {
                let lv = self.eval_numeric(l, i)?;
                let rv = self.eval_numeric(r, i)?;
                Ok(Interval::Numeric(lv.rem(&rv)))
            }
        }
    }

    /// Monotonic expansion of an exact integer interval: probe infinity,
    /// otherwise gallop outward by doubling and binary-search the boundary.
    fn widen_int(
        &mut self,
        pair: &IdIndexPair,
        mut current: NumericInterval,
    ) -> Result<Interval, GeneralizeError> {
        let one = BigInt::one();
        // low side
        let probe = NumericInterval::new(Endpoint::NegInf, current.hi.clone());
        if self.consistent_with(pair, Interval::Numeric(probe))? {
            current.lo = Endpoint::NegInf;
        } else if let Endpoint::Int(start) = current.lo.clone() {
            let mut good = start;
            let mut gap = BigInt::one();
            let mut bad;
            loop {
                let cand = &good - &gap;
                let trial = NumericInterval::new(Endpoint::Int(cand.clone()), current.hi.clone());
                if self.consistent_with(pair, Interval::Numeric(trial))? {
                    good = cand;
                    gap *= 2;
                } else {
                    bad = cand;
                    break;
                }
            }
            while &good - &bad > one {
                let mid: BigInt = &good - (&good - &bad) / 2;
                let trial = NumericInterval::new(Endpoint::Int(mid.clone()), current.hi.clone());
                if self.consistent_with(pair, Interval::Numeric(trial))? {
                    good = mid;
                } else {
                    bad = mid;
                }
            }
            current.lo = Endpoint::Int(good);
        }
        // high side
        let probe = NumericInterval::new(current.lo.clone(), Endpoint::PosInf);
        if self.consistent_with(pair, Interval::Numeric(probe))? {
            current.hi = Endpoint::PosInf;
        } else if let Endpoint::Int(start) = current.hi.clone() {
            let mut good = start;
            let mut gap = BigInt::one();
            let mut bad;
            loop {
                let cand = &good + &gap;
                let trial = NumericInterval::new(current.lo.clone(), Endpoint::Int(cand.clone()));
                if self.consistent_with(pair, Interval::Numeric(trial))? {
                    good = cand;
                    gap *= 2;
                } else {
                    bad = cand;
                    break;
                }
            }
            while &bad - &good > one {
                let mid: BigInt = &good + (&bad - &good) / 2;
                let trial = NumericInterval::new(current.lo.clone(), Endpoint::Int(mid.clone()));
                if self.consistent_with(pair, Interval::Numeric(trial))? {
                    good = mid;
                } else {
                    bad = mid;
                }
            }
            current.hi = Endpoint::Int(good);
        }
        Ok(Interval::Numeric(current))
    }

    /// Rational variant of the widening search with bounded refinement.
    fn widen_real(
        &mut self,
        pair: &IdIndexPair,
        mut current: NumericInterval,
    ) -> Result<Interval, GeneralizeError> {
        let two = BigRational::from_integer(BigInt::from(2));
        // low side
        let probe = NumericInterval::new(Endpoint::NegInf, current.hi.clone());
        if self.consistent_with(pair, Interval::Numeric(probe))? {
            current.lo = Endpoint::NegInf;
        } else if let Endpoint::Real(start) = current.lo.clone() {
            let mut good = start;
            let mut gap = BigRational::one();
            let mut bad;
            loop {
                let cand = &good - &gap;
                let trial = NumericInterval::new(Endpoint::Real(cand.clone()), current.hi.clone());
                if self.consistent_with(pair, Interval::Numeric(trial))? {
                    good = cand;
                    gap *= &two;
                } else {
                    bad = cand;
                    break;
                }
            }
            for _ in 0..REAL_REFINE_STEPS {
                let mid = (&good + &bad) / &two;
                let trial = NumericInterval::new(Endpoint::Real(mid.clone()), current.hi.clone());
                if self.consistent_with(pair, Interval::Numeric(trial))? {
                    good = mid;
                } else {
                    bad = mid;
                }
            }
            current.lo = Endpoint::Real(good);
        }
        // high side
        let probe = NumericInterval::new(current.lo.clone(), Endpoint::PosInf);
        if self.consistent_with(pair, Interval::Numeric(probe))? {
            current.hi = Endpoint::PosInf;
        } else if let Endpoint::Real(start) = current.hi.clone() {
            let mut good = start;
            let mut gap = BigRational::one();
            let mut bad;
            loop {
                let cand = &good + &gap;
                let trial = NumericInterval::new(current.lo.clone(), Endpoint::Real(cand.clone()));
                if self.consistent_with(pair, Interval::Numeric(trial))? {
                    good = cand;
                    gap *= &two;
                } else {
                    bad = cand;
                    break;
                }
            }
            for _ in 0..REAL_REFINE_STEPS {
                let mid = (&good + &bad) / &two;
                let trial = NumericInterval::new(current.lo.clone(), Endpoint::Real(mid.clone()));
                if self.consistent_with(pair, Interval::Numeric(trial))? {
                    good = mid;
                } else {
                    bad = mid;
                }
            }
            current.hi = Endpoint::Real(good);
        }
        Ok(Interval::Numeric(current))
    }

    /// Refill the cache from the final generalizations and read off every
    /// non-arbitrary pair in the property cone.
    fn extract(&mut self) -> Result<Counterexample, GeneralizeError> {
        if !self.model_consistent()? {
            return Err(GeneralizeError::InconsistentSeed);
        }
        let mut cex = Counterexample::new(self.k);
        for (pair, value) in &self.cache {
            if value.is_arbitrary() || pair.step < 0 || pair.step >= self.k as i64 {
                continue;
            }
            if !self.cone.contains(&pair.id) {
                continue;
            }
            cex.signal_mut(&pair.id)
                .put(pair.step as usize, CexValue::Interval(value.clone()));
        }
        cex.sort_signals();
        Ok(cex)
    }
}
