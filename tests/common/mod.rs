#![allow(dead_code)]

use rKind::cex::Counterexample;
use rKind::message::Invariant;
use rKind::solver::{Query, Response, Solver, SolverError, SolverFactory};
use rKind::spec::Specification;
use rKind::writer::Writer;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub type QueryFn = dyn Fn(&Specification, &Query) -> Result<Response, SolverError> + Send + Sync;

/// Solver factory scripted by a closure; every spawned instance shares the
/// same script and answers queries instantly.
pub struct ScriptFactory {
    script: Arc<QueryFn>,
}

impl ScriptFactory {
    pub fn new(
        script: impl Fn(&Specification, &Query) -> Result<Response, SolverError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self { script: Arc::new(script) })
    }
}

impl SolverFactory for ScriptFactory {
    fn solver(&self, spec: &Specification) -> Box<dyn Solver> {
        Box::new(ScriptSolver { spec: spec.clone(), script: self.script.clone() })
    }
}

struct ScriptSolver {
    spec: Specification,
    script: Arc<QueryFn>,
}

impl Solver for ScriptSolver {
    fn query(&mut self, query: Query, _limit: Option<Duration>) -> Result<Response, SolverError> {
        (self.script)(&self.spec, &query)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Valid {
        properties: Vec<String>,
        k: usize,
        invariants: Vec<Invariant>,
        ivcs: BTreeMap<String, BTreeSet<String>>,
    },
    Invalid {
        property: String,
        cex: Counterexample,
    },
    Unknown {
        properties: Vec<String>,
        cexs: BTreeMap<String, Counterexample>,
    },
}

/// Writer that records every report for later assertions.
pub struct RecordingWriter {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingWriter {
    pub fn new() -> (Self, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (Self { events: events.clone() }, events)
    }
}

impl Writer for RecordingWriter {
    fn write_valid(
        &mut self,
        properties: &[String],
        k: usize,
        _runtime: f64,
        invariants: &[Invariant],
        ivcs: &BTreeMap<String, BTreeSet<String>>,
    ) {
        self.events.lock().unwrap().push(Event::Valid {
            properties: properties.to_vec(),
            k,
            invariants: invariants.to_vec(),
            ivcs: ivcs.clone(),
        });
    }

    fn write_invalid(&mut self, property: &str, cex: &Counterexample, _runtime: f64) {
        self.events.lock().unwrap().push(Event::Invalid {
            property: property.to_string(),
            cex: cex.clone(),
        });
    }

    fn write_unknown(
        &mut self,
        properties: &[String],
        inductive_cexs: &BTreeMap<String, Counterexample>,
        _runtime: f64,
    ) {
        self.events.lock().unwrap().push(Event::Unknown {
            properties: properties.to_vec(),
            cexs: inductive_cexs.clone(),
        });
    }
}
