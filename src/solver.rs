//! Contracts for the external constraint-solver layer.
//!
//! The wire protocol, term translation and model parsing live outside this
//! crate; engines see a solver only through coarse-grained queries and raw,
//! string-typed model values.

use crate::expr::{Expr, Type, Value, parse_value};
use crate::message::Invariant;
use crate::spec::Specification;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Raw model value as the solver reports it: Booleans are recognized at the
/// wire level, everything else is parsed by the stream's declared type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawValue {
    Bool(bool),
    Other(String),
}

impl RawValue {
    pub fn parse(&self, ty: &Type) -> Option<Value> {
        match self {
            RawValue::Bool(b) => match ty {
                Type::Bool => Some(Value::Bool(*b)),
                _ => None,
            },
            RawValue::Other(raw) => parse_value(ty, raw),
        }
    }
}

/// One row of an uninterpreted function's table in a model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionEntry {
    pub function: String,
    pub inputs: Vec<RawValue>,
    pub output: RawValue,
}

/// Solver-produced valuation: point lookups of stream values plus
/// enumeration of the declared streams and function tables.
pub trait Model: Send + Sync {
    fn stream_value(&self, stream: &str, step: i64) -> Option<RawValue>;
    fn streams(&self) -> Vec<String>;
    fn function_entries(&self) -> Vec<FunctionEntry> {
        Vec::new()
    }
}

/// In-memory model, used by tests and wherever a valuation has to be
/// materialized locally.
#[derive(Clone, Debug, Default)]
pub struct MemoryModel {
    streams: BTreeMap<String, BTreeMap<i64, RawValue>>,
    functions: Vec<FunctionEntry>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stream: impl Into<String>, step: i64, value: RawValue) {
        self.streams.entry(stream.into()).or_default().insert(step, value);
    }

    pub fn insert_bool(&mut self, stream: impl Into<String>, step: i64, value: bool) {
        self.insert(stream, step, RawValue::Bool(value));
    }

    pub fn insert_raw(&mut self, stream: impl Into<String>, step: i64, value: &str) {
        self.insert(stream, step, RawValue::Other(value.to_string()));
    }

    pub fn add_function_entry(&mut self, entry: FunctionEntry) {
        self.functions.push(entry);
    }
}

impl Model for MemoryModel {
    fn stream_value(&self, stream: &str, step: i64) -> Option<RawValue> {
        self.streams.get(stream)?.get(&step).cloned()
    }

    fn streams(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    fn function_entries(&self) -> Vec<FunctionEntry> {
        self.functions.clone()
    }
}

/// One proof obligation handed to a solver instance.
///
/// `k` counts steps from 0; a `Base` query asks whether some listed property
/// can be false at step `k` with all assertions in force at steps 0..=k, a
/// `Step` query whether some property can be false at step `k` after holding
/// on the `k` prior steps with every invariant asserted throughout.
#[derive(Clone, Debug)]
pub enum Query<'a> {
    Base { k: usize, properties: &'a [String] },
    Step { k: usize, properties: &'a [String], invariants: &'a [Invariant] },
    /// Like `Base`, but prefer a falsifying model with minimal value churn
    /// between adjacent steps.
    Smooth { k: usize, properties: &'a [String] },
    /// Can some candidate expression be false within steps 0..=k?
    CandidateBase { k: usize, candidates: &'a [Expr] },
    /// Can some candidate expression be false at step k after all held on
    /// the prior steps?
    CandidateStep { k: usize, candidates: &'a [Expr] },
}

#[derive(Clone)]
pub enum Response {
    Sat(Arc<dyn Model>),
    Unsat,
    Unknown,
}

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("solver backend failed: {0}")]
    Backend(String),
}

/// One live solver instance, owned by a single engine for its lifetime.
/// `limit` bounds a single query; `Unknown` covers both give-ups and
/// exhausted limits.
pub trait Solver: Send {
    fn query(&mut self, query: Query, limit: Option<Duration>) -> Result<Response, SolverError>;
}

/// Spawns fresh solver instances for a specification. Each engine and each
/// re-verification trial gets its own instance sharing no mutable state.
pub trait SolverFactory: Send + Sync {
    fn solver(&self, spec: &Specification) -> Box<dyn Solver>;
}
