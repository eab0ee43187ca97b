use crate::{
    Engine, EngineError,
    interval::generalize::ModelGeneralizer,
    message::Message,
    spec::Specification,
};
use log::{debug, info, warn};
use std::sync::{
    Arc,
    mpsc::{Receiver, RecvTimeoutError, Sender},
};
use std::time::{Duration, Instant};

const INBOX_POLL: Duration = Duration::from_millis(100);

/// Tail of the counterexample refinement chain: replace point values in each
/// invalid verdict with generalized intervals before the director sees it.
/// A failed generalization degrades to forwarding the concrete model.
pub struct IntervalGen {
    spec: Arc<Specification>,
    director: Sender<Message>,
    inbox: Receiver<Message>,
    deadline: Instant,
}

impl IntervalGen {
    pub fn new(
        spec: Arc<Specification>,
        director: Sender<Message>,
        inbox: Receiver<Message>,
        deadline: Instant,
    ) -> Self {
        Self { spec, director, inbox, deadline }
    }
}

impl Engine for IntervalGen {
    fn name(&self) -> &'static str {
        "interval"
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
                    for property in invalid {
                        let generalizer = ModelGeneralizer::new(
                            self.spec.clone(),
                            &property,
                            model.clone(),
                            k,
                        );
                        let message = match generalizer.generalize() {
                            Ok(cex) => {
                                info!("generalized counterexample for {property}");
                                Message::Counterexample { property, k, cex }
                            }
                            Err(e) => {
                                warn!("interval generalization failed for {property}: {e}");
                                Message::Invalid {
                                    invalid: vec![property],
                                    k,
                                    model: model.clone(),
                                }
                            }
                        };
                        if self.director.send(message).is_err() {
                            return Ok(());
                        }
                    }
                }
                other => debug!("interval ignoring {} message", other.kind()),
            }
        }
    }
}
