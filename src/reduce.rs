use crate::{
    Engine, EngineError,
    message::{Invariant, Message},
    solver::{Query, Response, Solver},
};
use log::{debug, info, warn};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

const INBOX_POLL: Duration = Duration::from_millis(100);

/// Invariant reduction: before a proof is reported, greedily drop every
/// invariant whose removal keeps the inductive step unsatisfiable, so the
/// human-readable proof carries only load-bearing facts.
pub struct Reduce {
    solver: Box<dyn Solver>,
    director: Sender<Message>,
    inbox: Receiver<Message>,
    deadline: Instant,
}

impl Reduce {
    pub fn new(
        solver: Box<dyn Solver>,
        director: Sender<Message>,
        inbox: Receiver<Message>,
        deadline: Instant,
    ) -> Self {
        Self { solver, director, inbox, deadline }
    }

    fn time_left(&self) -> Option<Duration> {
        Some(self.deadline.saturating_duration_since(Instant::now()))
    }

    /// An unresolvable trial keeps its invariant; reduction never drops a
    /// fact it cannot prove removable.
    fn reduce(
        &mut self,
        properties: &[String],
        k: usize,
        invariants: Vec<Invariant>,
    ) -> Vec<Invariant> {
        let mut kept = invariants;
        let mut i = 0;
        while i < kept.len() {
            if Instant::now() >= self.deadline {
                break;
            }
            let mut trial = kept.clone();
            let removed = trial.remove(i);
            let limit = self.time_left();
            let query = Query::Step { k, properties, invariants: &trial };
            match self.solver.query(query, limit) {
                Ok(Response::Unsat) => {
                    debug!("dropped invariant {removed}");
                    kept = trial;
                }
                Ok(_) => i += 1,
                Err(e) => {
                    warn!("invariant reduction trial failed: {e}");
                    i += 1;
                }
            }
        }
        kept
    }
}

impl Engine for Reduce {
    fn name(&self) -> &'static str {
        "reduce"
    }

    fn run(&mut self) -> Result<(), EngineError> {
        loop {
            if Instant::now() >= self.deadline {
                return Ok(());
            }
            let message = match self.inbox.recv_timeout(INBOX_POLL) {
                Ok(m) => m,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            };
            match message {
                Message::Valid { valid, k, invariants } => {
                    let total = invariants.len();
                    let reduced = self.reduce(&valid, k, invariants);
                    info!("invariant reduction kept {} of {} invariants", reduced.len(), total);
                    let message = Message::Valid { valid, k, invariants: reduced };
                    if self.director.send(message).is_err() {
                        return Ok(());
                    }
                }
                other => debug!("reduce ignoring {} message", other.kind()),
            }
        }
    }
}
