use crate::{
    Engine, EngineError,
    expr::{Expr, Type},
    message::{Invariant, Message},
    solver::{Model, Query, RawValue, Response, Solver, SolverError},
    spec::Specification,
};
use log::{debug, info};
use std::sync::{Arc, mpsc::Sender};
use std::time::{Duration, Instant};

/// Template invariant: a Boolean stream or its negation.
struct Candidate {
    id: String,
    negated: bool,
}

impl Candidate {
    fn expr(&self) -> Expr {
        if self.negated {
            Expr::not_(Expr::id(&self.id))
        } else {
            Expr::id(&self.id)
        }
    }

    /// `None` when the model does not constrain the stream at this step.
    fn holds_on(&self, model: &dyn Model, step: i64) -> Option<bool> {
        match model.stream_value(&self.id, step)? {
            RawValue::Bool(b) => Some(b != self.negated),
            RawValue::Other(_) => None,
        }
    }
}

/// Invariant discovery: propose candidate facts over the node's Boolean
/// streams, prune them against solver models until the set is 1-inductive,
/// then hand the survivors to the inductive engine and stop. Never resolves
/// a property by itself.
pub struct InvGen {
    spec: Arc<Specification>,
    solver: Box<dyn Solver>,
    kind: Sender<Message>,
    deadline: Instant,
}

impl InvGen {
    pub fn new(
        spec: Arc<Specification>,
        solver: Box<dyn Solver>,
        kind: Sender<Message>,
        deadline: Instant,
    ) -> Self {
        Self { spec, solver, kind, deadline }
    }

    fn candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for decl in self.spec.node.var_decls() {
            if decl.ty == Type::Bool {
                candidates.push(Candidate { id: decl.id.clone(), negated: false });
                candidates.push(Candidate { id: decl.id.clone(), negated: true });
            }
        }
        candidates
    }

    fn time_left(&self) -> Option<Duration> {
        Some(self.deadline.saturating_duration_since(Instant::now()))
    }

    /// Drop every candidate the model falsifies within steps 0..=k. Errors
    /// when nothing could be pruned, since re-querying would then loop.
    fn prune(
        candidates: &mut Vec<Candidate>,
        model: &dyn Model,
        k: usize,
    ) -> Result<(), EngineError> {
        let before = candidates.len();
        candidates.retain(|c| (0..=k as i64).all(|i| c.holds_on(model, i) == Some(true)));
        if candidates.len() == before {
            return Err(EngineError::Solver(SolverError::Backend(
                "candidate model falsifies no candidate".to_string(),
            )));
        }
        debug!("invariant generation pruned {} candidates", before - candidates.len());
        Ok(())
    }
}

impl Engine for InvGen {
    fn name(&self) -> &'static str {
        "invgen"
    }

    fn run(&mut self) -> Result<(), EngineError> {
        let mut candidates = self.candidates();
        let k = 1;
        // base fixed point
        while !candidates.is_empty() {
            if Instant::now() >= self.deadline {
                return Ok(());
            }
            let limit = self.time_left();
            let exprs: Vec<Expr> = candidates.iter().map(Candidate::expr).collect();
            match self.solver.query(Query::CandidateBase { k, candidates: &exprs }, limit)? {
                Response::Sat(model) => Self::prune(&mut candidates, model.as_ref(), k)?,
                Response::Unsat => break,
                Response::Unknown => return Ok(()),
            }
        }
        // step fixed point
        while !candidates.is_empty() {
            if Instant::now() >= self.deadline {
                return Ok(());
            }
            let limit = self.time_left();
            let exprs: Vec<Expr> = candidates.iter().map(Candidate::expr).collect();
            match self.solver.query(Query::CandidateStep { k, candidates: &exprs }, limit)? {
                Response::Sat(model) => Self::prune(&mut candidates, model.as_ref(), k)?,
                Response::Unsat => break,
                Response::Unknown => return Ok(()),
            }
        }
        if !candidates.is_empty() {
            info!("invariant generation proposed {} invariants", candidates.len());
            let invariants = candidates.iter().map(|c| Invariant(c.expr())).collect();
            let _ = self.kind.send(Message::Invariants { invariants });
        }
        Ok(())
    }
}
