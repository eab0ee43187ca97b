use crate::{
    Engine, EngineError,
    message::{Invariant, Message},
    solver::{Query, RawValue, Response, Solver, SolverError},
    spec::Specification,
};
use log::{debug, info};
use std::sync::{
    Arc,
    mpsc::{Receiver, RecvTimeoutError, Sender},
};
use std::time::{Duration, Instant};

const INBOX_POLL: Duration = Duration::from_millis(100);

/// k-induction: at increasing depth k, show that no trace can reach a
/// property violation after the property held on the k prior steps.
///
/// A proof at depth k only covers steps >= k; the verdict is held back until
/// bounded search confirms the first k steps, so a `Valid` message is always
/// a proof for all time.
pub struct Kind {
    solver: Box<dyn Solver>,
    remaining: Vec<String>,
    invariants: Vec<Invariant>,
    base_progress: usize,
    director: Sender<Message>,
    inbox: Receiver<Message>,
    reduce: Option<Sender<Message>>,
    bmc: Option<Sender<Message>>,
    deadline: Instant,
}

impl Kind {
    pub fn new(
        spec: Arc<Specification>,
        solver: Box<dyn Solver>,
        director: Sender<Message>,
        inbox: Receiver<Message>,
        deadline: Instant,
    ) -> Self {
        let remaining = spec.node.properties.clone();
        Self {
            solver,
            remaining,
            invariants: Vec::new(),
            base_progress: 0,
            director,
            inbox,
            reduce: None,
            bmc: None,
            deadline,
        }
    }

    pub fn set_reduce(&mut self, tx: Sender<Message>) {
        self.reduce = Some(tx);
    }

    pub fn set_bmc(&mut self, tx: Sender<Message>) {
        self.bmc = Some(tx);
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::BaseStep { k } => self.base_progress = self.base_progress.max(k),
            Message::Invariants { invariants } => {
                for inv in invariants {
                    if !self.invariants.contains(&inv) {
                        self.invariants.push(inv);
                    }
                }
            }
            Message::Invalid { invalid, .. } => {
                self.remaining.retain(|p| !invalid.contains(p));
            }
            other => debug!("kind ignoring {} message", other.kind()),
        }
    }

    fn drain_inbox(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            self.handle(message);
        }
    }

    /// Block until bounded search has verified the first k steps. False when
    /// the deadline passes or the base engine can no longer report.
    fn wait_for_base(&mut self, k: usize) -> bool {
        loop {
            self.drain_inbox();
            if self.base_progress >= k {
                return true;
            }
            if Instant::now() >= self.deadline {
                return false;
            }
            match self.inbox.recv_timeout(INBOX_POLL) {
                Ok(message) => self.handle(message),
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => return self.base_progress >= k,
            }
        }
    }

    fn time_left(&self) -> Option<Duration> {
        Some(self.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Engine for Kind {
    fn name(&self) -> &'static str {
        "kind"
    }

    fn run(&mut self) -> Result<(), EngineError> {
        for k in 1.. {
            self.drain_inbox();
            if self.remaining.is_empty() || Instant::now() >= self.deadline {
                return Ok(());
            }
            debug!("kind depth: {k}");
            // the set provable at this depth shrinks as step counterexamples
            // turn up; survivors of an unsat round are proven
            let mut round = self.remaining.clone();
            while !round.is_empty() {
                if Instant::now() >= self.deadline {
                    return Ok(());
                }
                let limit = self.time_left();
                let query = Query::Step { k, properties: &round, invariants: &self.invariants };
                match self.solver.query(query, limit)? {
                    Response::Sat(model) => {
                        let falsified: Vec<String> = round
                            .iter()
                            .filter(|p| {
                                model.stream_value(p, k as i64) == Some(RawValue::Bool(false))
                            })
                            .cloned()
                            .collect();
                        if falsified.is_empty() {
                            return Err(EngineError::Solver(SolverError::Backend(
                                "step model falsifies no property".to_string(),
                            )));
                        }
                        round.retain(|p| !falsified.contains(p));
                        for property in falsified {
                            let hint = Message::InductiveCounterexample {
                                property,
                                k: k + 1,
                                n: 0,
                                model: model.clone(),
                            };
                            if self.director.send(hint).is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Response::Unsat => {
                        info!("k-induction proved {} properties at depth {k}", round.len());
                        if !self.wait_for_base(k) {
                            return Ok(());
                        }
                        // bounded search may have falsified some of the round
                        // while we waited
                        round.retain(|p| self.remaining.contains(p));
                        if round.is_empty() {
                            break;
                        }
                        self.remaining.retain(|p| !round.contains(p));
                        let message = Message::Valid {
                            valid: round,
                            k,
                            invariants: self.invariants.clone(),
                        };
                        if let Some(bmc) = &self.bmc {
                            let _ = bmc.send(message.clone());
                        }
                        let out = self.reduce.as_ref().unwrap_or(&self.director);
                        if out.send(message).is_err() {
                            return Ok(());
                        }
                        break;
                    }
                    Response::Unknown => {
                        debug!("kind solve gave up at depth {k}");
                        break;
                    }
                }
            }
        }
        unreachable!();
    }
}
