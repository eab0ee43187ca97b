use crate::expr::Value;
use crate::interval::Interval;
use crate::solver::{Model, RawValue};
use crate::spec::Specification;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// A counterexample entry: either a concrete model value or a generalized
/// interval of equally falsifying values.
#[derive(Clone, Debug, PartialEq)]
pub enum CexValue {
    Value(Value),
    Interval(Interval),
}

impl fmt::Display for CexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CexValue::Value(v) => write!(f, "{v}"),
            CexValue::Interval(i) => write!(f, "{i}"),
        }
    }
}

/// Per-step values of one named stream.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    pub name: String,
    values: BTreeMap<usize, CexValue>,
}

impl Signal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), values: BTreeMap::new() }
    }

    pub fn put(&mut self, step: usize, value: CexValue) {
        self.values.insert(step, value);
    }

    pub fn value(&self, step: usize) -> Option<&CexValue> {
        self.values.get(&step)
    }

    pub fn values(&self) -> impl Iterator<Item = (usize, &CexValue)> {
        self.values.iter().map(|(s, v)| (*s, v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Recorded applications of one uninterpreted function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionTable {
    pub name: String,
    pub entries: Vec<(Vec<Value>, Value)>,
}

/// The externally visible witness attached to a verdict: a trace of `length`
/// steps plus any helper-function applications the trace exercises.
#[derive(Clone, Debug, PartialEq)]
pub struct Counterexample {
    pub length: usize,
    signals: Vec<Signal>,
    functions: Vec<FunctionTable>,
}

impl Counterexample {
    pub fn new(length: usize) -> Self {
        Self { length, signals: Vec::new(), functions: Vec::new() }
    }

    pub fn add_signal(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn signal_mut(&mut self, name: &str) -> &mut Signal {
        if let Some(i) = self.signals.iter().position(|s| s.name == name) {
            return &mut self.signals[i];
        }
        self.signals.push(Signal::new(name));
        self.signals.last_mut().unwrap()
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn sort_signals(&mut self) {
        self.signals.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn add_function_value(&mut self, name: &str, inputs: Vec<Value>, output: Value) {
        if let Some(t) = self.functions.iter_mut().find(|t| t.name == name) {
            t.entries.push((inputs, output));
            return;
        }
        self.functions.push(FunctionTable { name: name.to_string(), entries: vec![(inputs, output)] });
    }

    pub fn functions(&self) -> &[FunctionTable] {
        &self.functions
    }
}

/// Restricts a model to the streams a property transitively depends on.
pub struct CounterexampleSlicer<'a> {
    spec: &'a Specification,
}

impl<'a> CounterexampleSlicer<'a> {
    pub fn new(spec: &'a Specification) -> Self {
        Self { spec }
    }

    pub fn slice(&self, property: &str, model: Arc<dyn Model>) -> Arc<dyn Model> {
        Arc::new(SlicedModel { keep: self.spec.property_cone(property), inner: model })
    }
}

struct SlicedModel {
    keep: BTreeSet<String>,
    inner: Arc<dyn Model>,
}

impl Model for SlicedModel {
    fn stream_value(&self, stream: &str, step: i64) -> Option<RawValue> {
        if !self.keep.contains(stream) {
            return None;
        }
        self.inner.stream_value(stream, step)
    }

    fn streams(&self) -> Vec<String> {
        self.inner
            .streams()
            .into_iter()
            .filter(|s| self.keep.contains(s))
            .collect()
    }

    fn function_entries(&self) -> Vec<crate::solver::FunctionEntry> {
        self.inner.function_entries()
    }
}
