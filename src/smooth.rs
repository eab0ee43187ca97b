use crate::{
    Engine, EngineError,
    message::Message,
    solver::{Query, RawValue, Response, Solver},
};
use log::{debug, warn};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

const INBOX_POLL: Duration = Duration::from_millis(100);

/// Counterexample smoothing: re-solve each invalid verdict preferring a
/// falsifying trace with minimal value churn, then pass the verdict on.
/// The original model goes through unchanged whenever the solver cannot
/// improve on it.
pub struct Smooth {
    solver: Box<dyn Solver>,
    next: Sender<Message>,
    inbox: Receiver<Message>,
    deadline: Instant,
}

impl Smooth {
    pub fn new(
        solver: Box<dyn Solver>,
        next: Sender<Message>,
        inbox: Receiver<Message>,
        deadline: Instant,
    ) -> Self {
        Self { solver, next, inbox, deadline }
    }

    fn time_left(&self) -> Option<Duration> {
        Some(self.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Engine for Smooth {
    fn name(&self) -> &'static str {
        "smooth"
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
                Message::Invalid { invalid, k, model } => {
                    let limit = self.time_left();
                    let query = Query::Smooth { k: k - 1, properties: &invalid };
                    let model = match self.solver.query(query, limit) {
                        Ok(Response::Sat(smoothed)) => {
                            // only adopt a model that still falsifies
                            // everything the original did
                            let depth = (k - 1) as i64;
                            if invalid.iter().all(|p| {
                                smoothed.stream_value(p, depth) == Some(RawValue::Bool(false))
                            }) {
                                smoothed
                            } else {
                                warn!("smoothed model lost a violation, keeping the original");
                                model
                            }
                        }
                        Ok(_) => model,
                        Err(e) => {
                            warn!("counterexample smoothing failed: {e}");
                            model
                        }
                    };
                    if self.next.send(Message::Invalid { invalid, k, model }).is_err() {
                        return Ok(());
                    }
                }
                other => debug!("smooth ignoring {} message", other.kind()),
            }
        }
    }
}
