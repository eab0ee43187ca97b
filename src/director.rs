use crate::{
    Engine,
    bmc::BMC,
    cex::{CexValue, Counterexample, CounterexampleSlicer, Signal},
    config::Config,
    intervalgen::IntervalGen,
    invgen::InvGen,
    ivc::{MiniChecker, MinimalIvcFinder, ivc_candidates},
    kind::Kind,
    message::Message,
    reduce::Reduce,
    smooth::Smooth,
    solver::{Model, SolverFactory},
    spec::Specification,
    writer::Writer,
};
use log::{error, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{
    Arc, Mutex,
    mpsc::{self, Receiver, Sender},
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum DirectorError {
    /// An inter-engine message reached the director: the wiring has drifted
    /// from the protocol and no verdict can be trusted.
    #[error("protocol drift: unexpected {kind} message in director")]
    ProtocolDrift { kind: &'static str },
}

/// Final partition of the checked properties, plus any engine faults
/// recorded along the way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
    pub unknown: Vec<String>,
    pub faults: Vec<(String, String)>,
}

struct EngineHandle {
    name: &'static str,
    thread: JoinHandle<()>,
    fault: Arc<Mutex<Option<String>>>,
}

/// Top-level supervisor. Owns the single source of truth for property
/// status: engines only report, and the first verdict per property wins.
pub struct Director {
    cfg: Config,
    spec: Arc<Specification>,
    writer: Box<dyn Writer>,
    factory: Arc<dyn SolverFactory>,

    remaining: Vec<String>,
    valid: Vec<String>,
    invalid: Vec<String>,
    /// Latest non-terminal hint per still-open property: (k, n, model).
    inductive_cexs: BTreeMap<String, (usize, usize, Arc<dyn Model>)>,

    incoming_tx: Sender<Message>,
    incoming_rx: Receiver<Message>,
    engines: Vec<EngineHandle>,
}

impl Director {
    pub fn new(
        cfg: Config,
        spec: Arc<Specification>,
        writer: Box<dyn Writer>,
        factory: Arc<dyn SolverFactory>,
    ) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::channel();
        let remaining = spec.node.properties.clone();
        Self {
            cfg,
            spec,
            writer,
            factory,
            remaining,
            valid: Vec::new(),
            invalid: Vec::new(),
            inductive_cexs: BTreeMap::new(),
            incoming_tx,
            incoming_rx,
            engines: Vec::new(),
        }
    }

    pub fn run(&mut self) -> Result<RunSummary, DirectorError> {
        info!(
            "there are {} properties to be checked: {:?}",
            self.remaining.len(),
            self.remaining
        );
        self.writer.begin();
        let start = Instant::now();
        let deadline = start + Duration::from_secs(self.cfg.timeout);
        self.start_engines(deadline);

        while Instant::now() < deadline
            && !self.remaining.is_empty()
            && self.some_thread_alive()
            && !self.some_engine_failed()
        {
            self.process_messages(start)?;
            thread::sleep(DRAIN_INTERVAL);
        }

        self.process_messages(start)?;
        if !self.remaining.is_empty() {
            let inductive_cexs = self.convert_inductive_cexs();
            let runtime = start.elapsed().as_secs_f64();
            self.writer.write_unknown(&self.remaining, &inductive_cexs, runtime);
        }
        self.writer.end();

        let summary = RunSummary {
            valid: self.valid.clone(),
            invalid: self.invalid.clone(),
            unknown: self.remaining.clone(),
            faults: self.collect_faults(),
        };
        if !summary.valid.is_empty() {
            info!("valid properties: {:?}", summary.valid);
        }
        if !summary.invalid.is_empty() {
            info!("invalid properties: {:?}", summary.invalid);
        }
        if !summary.unknown.is_empty() {
            info!("unknown properties: {:?}", summary.unknown);
        }
        for (name, fault) in &summary.faults {
            error!("{name} engine failed: {fault}");
        }
        Ok(summary)
    }

    /// Construct and wire every enabled engine, then start their threads.
    /// The wiring is a static graph fixed here and never touched again.
    fn start_engines(&mut self, deadline: Instant) {
        let spec = self.spec.clone();
        let dtx = self.incoming_tx.clone();

        let (bmc_tx, bmc_rx) = mpsc::channel();
        let mut bmc = BMC::new(
            spec.clone(),
            self.factory.solver(&spec),
            dtx.clone(),
            bmc_rx,
            self.cfg.max_k,
            deadline,
        );

        let mut kind = if self.cfg.no_kind {
            None
        } else {
            let (kind_tx, kind_rx) = mpsc::channel();
            let mut kind = Kind::new(
                spec.clone(),
                self.factory.solver(&spec),
                dtx.clone(),
                kind_rx,
                deadline,
            );
            kind.set_bmc(bmc_tx);
            bmc.set_kind(kind_tx.clone());

            if !self.cfg.no_invgen {
                let invgen =
                    InvGen::new(spec.clone(), self.factory.solver(&spec), kind_tx, deadline);
                self.register(Box::new(invgen));
            }
            if self.cfg.reduce_inv {
                let (reduce_tx, reduce_rx) = mpsc::channel();
                let reduce =
                    Reduce::new(self.factory.solver(&spec), dtx.clone(), reduce_rx, deadline);
                kind.set_reduce(reduce_tx);
                self.register(Box::new(reduce));
            }
            Some(kind)
        };

        // counterexample refinement chain: smoothing first, then interval
        // generalization, ending at the director
        let mut chain_head = None;
        if self.cfg.interval {
            let (tx, rx) = mpsc::channel();
            let engine = IntervalGen::new(spec.clone(), dtx.clone(), rx, deadline);
            self.register(Box::new(engine));
            chain_head = Some(tx);
        }
        if self.cfg.smooth {
            let (tx, rx) = mpsc::channel();
            let next = chain_head.take().unwrap_or_else(|| dtx.clone());
            let engine = Smooth::new(self.factory.solver(&spec), next, rx, deadline);
            self.register(Box::new(engine));
            chain_head = Some(tx);
        }
        if let Some(head) = chain_head {
            bmc.set_cex_chain(head);
        }

        self.register(Box::new(bmc));
        if let Some(kind) = kind.take() {
            self.register(Box::new(kind));
        }
    }

    fn register(&mut self, engine: Box<dyn Engine>) {
        let name = engine.name();
        let fault = Arc::new(Mutex::new(None));
        let slot = fault.clone();
        let thread = thread::spawn(move || {
            let mut engine = engine;
            match catch_unwind(AssertUnwindSafe(|| engine.run())) {
                Ok(Ok(())) => (),
                Ok(Err(e)) => *slot.lock().unwrap() = Some(e.to_string()),
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "engine panicked".to_string());
                    *slot.lock().unwrap() = Some(message);
                }
            }
        });
        self.engines.push(EngineHandle { name, thread, fault });
    }

    fn some_thread_alive(&self) -> bool {
        self.engines.iter().any(|e| !e.thread.is_finished())
    }

    fn some_engine_failed(&self) -> bool {
        self.engines
            .iter()
            .any(|e| e.fault.lock().unwrap().is_some())
    }

    fn collect_faults(&self) -> Vec<(String, String)> {
        self.engines
            .iter()
            .filter_map(|e| {
                let fault = e.fault.lock().unwrap().clone();
                fault.map(|f| (e.name.to_string(), f))
            })
            .collect()
    }

    /// Remove the named properties from `remaining`, warning about any that
    /// already resolved; those are dropped.
    fn take_fresh(&mut self, named: &[String]) -> Vec<String> {
        let mut fresh = Vec::new();
        for property in named {
            if self.remaining.contains(property) {
                fresh.push(property.clone());
            } else {
                warn!("conflicting verdict for resolved property {property}, dropped");
            }
        }
        self.remaining.retain(|p| !fresh.contains(p));
        for property in &fresh {
            self.inductive_cexs.remove(property);
        }
        fresh
    }

    fn process_messages(&mut self, start: Instant) -> Result<(), DirectorError> {
        while let Ok(message) = self.incoming_rx.try_recv() {
            let runtime = start.elapsed().as_secs_f64();
            match message {
                Message::Valid { valid, k, invariants } => {
                    let fresh = self.take_fresh(&valid);
                    if fresh.is_empty() {
                        continue;
                    }
                    self.valid.extend(fresh.iter().cloned());
                    // invariants are only surfaced once reduction has had a
                    // chance to minimize them
                    let invariants = if self.cfg.reduce_inv { invariants } else { Vec::new() };
                    let ivcs = if self.cfg.ivc {
                        self.compute_ivcs(&fresh)
                    } else {
                        BTreeMap::new()
                    };
                    self.writer.write_valid(&fresh, k, runtime, &invariants, &ivcs);
                }
                Message::Invalid { invalid, k, model } => {
                    let fresh = self.take_fresh(&invalid);
                    if fresh.is_empty() {
                        continue;
                    }
                    self.invalid.extend(fresh.iter().cloned());
                    let spec = self.spec.clone();
                    let slicer = CounterexampleSlicer::new(&spec);
                    for property in &fresh {
                        let sliced = slicer.slice(property, model.clone());
                        let cex = self.extract_counterexample(k, 0, sliced.as_ref());
                        self.writer.write_invalid(property, &cex, runtime);
                    }
                }
                Message::Counterexample { property, k: _, cex } => {
                    let fresh = self.take_fresh(std::slice::from_ref(&property));
                    if fresh.is_empty() {
                        continue;
                    }
                    self.invalid.push(property.clone());
                    self.writer.write_invalid(&property, &cex, runtime);
                }
                Message::InductiveCounterexample { property, k, n, model } => {
                    // bookkeeping only; superseded the moment the property
                    // resolves, ignored afterwards
                    if self.remaining.contains(&property) {
                        self.inductive_cexs.insert(property, (k, n, model));
                    }
                }
                other @ (Message::BaseStep { .. } | Message::Invariants { .. }) => {
                    return Err(DirectorError::ProtocolDrift { kind: other.kind() });
                }
            }
        }
        Ok(())
    }

    fn convert_inductive_cexs(&self) -> BTreeMap<String, Counterexample> {
        let slicer = CounterexampleSlicer::new(&self.spec);
        let mut result = BTreeMap::new();
        for (property, (k, n, model)) in &self.inductive_cexs {
            let sliced = slicer.slice(property, model.clone());
            result.insert(
                property.clone(),
                self.extract_counterexample(*k, *n, sliced.as_ref()),
            );
        }
        result
    }

    /// Read a length-k trace out of a model, starting at step `offset`.
    fn extract_counterexample(&self, k: usize, offset: usize, model: &dyn Model) -> Counterexample {
        let mut cex = Counterexample::new(k);
        for stream in model.streams() {
            let Some(ty) = self.spec.type_map.get(&stream) else {
                continue;
            };
            let mut signal = Signal::new(&stream);
            for i in 0..k {
                if let Some(raw) = model.stream_value(&stream, (i + offset) as i64)
                    && let Some(value) = raw.parse(ty)
                {
                    signal.put(i, CexValue::Value(value));
                }
            }
            cex.add_signal(signal);
        }
        for entry in model.function_entries() {
            let base = entry.function.split('.').next().unwrap_or(&entry.function);
            let Some(function) = self.spec.functions.iter().find(|f| f.id == base) else {
                continue;
            };
            if entry.inputs.len() != function.inputs.len() {
                continue;
            }
            let inputs: Option<Vec<_>> = entry
                .inputs
                .iter()
                .zip(&function.inputs)
                .map(|(raw, decl)| raw.parse(&decl.ty))
                .collect();
            let output = entry.output.parse(&function.output.ty);
            if let (Some(inputs), Some(output)) = (inputs, output) {
                cex.add_function_value(base, inputs, output);
            }
        }
        cex
    }

    /// Compute a must set and a minimal inductive validity core for each
    /// freshly proven property, re-verifying weakened nodes through the
    /// solver factory.
    fn compute_ivcs(&self, properties: &[String]) -> BTreeMap<String, BTreeSet<String>> {
        let oracle = MiniChecker::new(self.factory.clone());
        let timeout = Duration::from_secs(self.cfg.ivc_timeout);
        let mut ivcs = BTreeMap::new();
        for property in properties {
            let candidates = ivc_candidates(&self.spec, property);
            let mut finder = MinimalIvcFinder::new(self.spec.node.clone(), property);
            let must = finder.compute_must(&candidates, &oracle, timeout);
            let minimal = finder.minimize_ivc(&candidates, &must, &oracle, timeout);
            info!("ivc for {property}: {} of {} equations", minimal.len(), candidates.len());
            ivcs.insert(property.clone(), minimal);
        }
        ivcs
    }
}
