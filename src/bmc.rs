use crate::{
    Engine, EngineError,
    message::Message,
    solver::{Query, RawValue, Response, Solver, SolverError},
    spec::Specification,
};
use log::{debug, info};
use std::sync::{
    Arc,
    mpsc::{Receiver, Sender},
};
use std::time::Instant;

/// Bounded search: walk the depth bound upwards and ask the solver for a
/// trace falsifying any remaining property at exactly that depth.
pub struct BMC {
    solver: Box<dyn Solver>,
    remaining: Vec<String>,
    director: Sender<Message>,
    inbox: Receiver<Message>,
    /// Invalid verdicts and base progress are forwarded here.
    kind: Option<Sender<Message>>,
    /// Head of the counterexample refinement chain, when installed.
    cex_chain: Option<Sender<Message>>,
    max_k: usize,
    deadline: Instant,
}

impl BMC {
    pub fn new(
        spec: Arc<Specification>,
        solver: Box<dyn Solver>,
        director: Sender<Message>,
        inbox: Receiver<Message>,
        max_k: usize,
        deadline: Instant,
    ) -> Self {
        let remaining = spec.node.properties.clone();
        Self {
            solver,
            remaining,
            director,
            inbox,
            kind: None,
            cex_chain: None,
            max_k,
            deadline,
        }
    }

    pub fn set_kind(&mut self, tx: Sender<Message>) {
        self.kind = Some(tx);
    }

    pub fn set_cex_chain(&mut self, tx: Sender<Message>) {
        self.cex_chain = Some(tx);
    }

    fn drain_inbox(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            match message {
                Message::Valid { valid, .. } => {
                    self.remaining.retain(|p| !valid.contains(p));
                }
                other => debug!("bmc ignoring {} message", other.kind()),
            }
        }
    }

    fn falsified(&self, model: &dyn crate::solver::Model, depth: usize) -> Vec<String> {
        self.remaining
            .iter()
            .filter(|p| model.stream_value(p, depth as i64) == Some(RawValue::Bool(false)))
            .cloned()
            .collect()
    }

    fn time_left(&self) -> Option<std::time::Duration> {
        Some(self.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Engine for BMC {
    fn name(&self) -> &'static str {
        "bmc"
    }

    fn run(&mut self) -> Result<(), EngineError> {
        for depth in 0..=self.max_k {
            self.drain_inbox();
            if self.remaining.is_empty() || Instant::now() >= self.deadline {
                return Ok(());
            }
            debug!("bmc depth: {depth}");
            loop {
                if self.remaining.is_empty() || Instant::now() >= self.deadline {
                    return Ok(());
                }
                let limit = self.time_left();
                let query = Query::Base { k: depth, properties: &self.remaining };
                match self.solver.query(query, limit)? {
                    Response::Sat(model) => {
                        let falsified = self.falsified(model.as_ref(), depth);
                        if falsified.is_empty() {
                            return Err(EngineError::Solver(SolverError::Backend(
                                "base model falsifies no property".to_string(),
                            )));
                        }
                        info!("bmc found counterexample at depth {depth}");
                        self.remaining.retain(|p| !falsified.contains(p));
                        let message = Message::Invalid {
                            invalid: falsified,
                            k: depth + 1,
                            model,
                        };
                        if let Some(kind) = &self.kind {
                            let _ = kind.send(message.clone());
                        }
                        let out = self.cex_chain.as_ref().unwrap_or(&self.director);
                        if out.send(message).is_err() {
                            return Ok(());
                        }
                        // retry this depth for the survivors
                    }
                    Response::Unsat => {
                        if let Some(kind) = &self.kind {
                            let _ = kind.send(Message::BaseStep { k: depth + 1 });
                        }
                        break;
                    }
                    Response::Unknown => {
                        debug!("bmc solve gave up at depth {depth}");
                        break;
                    }
                }
            }
        }
        info!("bmc reached bound {}, stopping search", self.max_k);
        Ok(())
    }
}
