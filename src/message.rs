use crate::cex::Counterexample;
use crate::expr::Expr;
use crate::solver::Model;
use std::fmt;
use std::sync::Arc;

/// Auxiliary fact strengthening an inductive step.
#[derive(Clone, Debug, PartialEq)]
pub struct Invariant(pub Expr);

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The engine protocol. Every engine communicates only by posting these to
/// the director's queue or to a wired peer; messages are immutable once
/// constructed and models are shared read-only.
///
/// The director accepts the first four kinds. `BaseStep` and `Invariants`
/// are inter-engine mail; one reaching the director means the wiring has
/// drifted and the run is aborted.
#[derive(Clone)]
pub enum Message {
    /// Properties proven at depth k, with the invariants used.
    Valid { valid: Vec<String>, k: usize, invariants: Vec<Invariant> },
    /// Properties falsified by `model`, a trace of length k.
    Invalid { invalid: Vec<String>, k: usize, model: Arc<dyn Model> },
    /// A finished, already-sliced counterexample for one property.
    Counterexample { property: String, k: usize, cex: Counterexample },
    /// Non-terminal hint: a k-step trace violating a still-open property,
    /// starting at an arbitrary step offset n. Superseded once the property
    /// resolves.
    InductiveCounterexample { property: String, k: usize, n: usize, model: Arc<dyn Model> },
    /// Bounded search has verified all open properties for the first k steps.
    BaseStep { k: usize },
    /// Invariant discovery proposes these proven auxiliary invariants.
    Invariants { invariants: Vec<Invariant> },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Valid { .. } => "valid",
            Message::Invalid { .. } => "invalid",
            Message::Counterexample { .. } => "counterexample",
            Message::InductiveCounterexample { .. } => "inductive-counterexample",
            Message::BaseStep { .. } => "base-step",
            Message::Invariants { .. } => "invariants",
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Valid { valid, k, invariants } => f
                .debug_struct("Valid")
                .field("valid", valid)
                .field("k", k)
                .field("invariants", invariants)
                .finish(),
            Message::Invalid { invalid, k, .. } => f
                .debug_struct("Invalid")
                .field("invalid", invalid)
                .field("k", k)
                .finish_non_exhaustive(),
            Message::Counterexample { property, k, .. } => f
                .debug_struct("Counterexample")
                .field("property", property)
                .field("k", k)
                .finish_non_exhaustive(),
            Message::InductiveCounterexample { property, k, n, .. } => f
                .debug_struct("InductiveCounterexample")
                .field("property", property)
                .field("k", k)
                .field("n", n)
                .finish_non_exhaustive(),
            Message::BaseStep { k } => f.debug_struct("BaseStep").field("k", k).finish(),
            Message::Invariants { invariants } => f
                .debug_struct("Invariants")
                .field("invariants", invariants)
                .finish(),
        }
    }
}
