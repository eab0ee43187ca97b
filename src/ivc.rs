//! Inductive validity cores: the smallest sets of equations sufficient to
//! keep a proven property proven, found by repeated re-verification of
//! weakened nodes.

use crate::solver::{Query, Response, SolverFactory};
use crate::spec::{Node, Specification, VarDecl};
use log::{debug, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OracleVerdict {
    Valid { k: usize },
    Invalid,
    Unknown,
}

impl OracleVerdict {
    pub fn is_valid(self) -> bool {
        matches!(self, OracleVerdict::Valid { .. })
    }
}

/// Single-property re-verification. Every call constructs a fresh run
/// sharing no mutable state with prior trials.
pub trait Oracle {
    fn verify(&self, node: &Node, property: &str, timeout: Duration) -> OracleVerdict;
}

/// Default oracle: a self-contained base/step k-induction loop over a fresh
/// solver instance, on the calling thread.
pub struct MiniChecker {
    factory: Arc<dyn SolverFactory>,
}

impl MiniChecker {
    pub fn new(factory: Arc<dyn SolverFactory>) -> Self {
        Self { factory }
    }
}

impl Oracle for MiniChecker {
    fn verify(&self, node: &Node, property: &str, timeout: Duration) -> OracleVerdict {
        let mut node = node.clone();
        node.properties = vec![property.to_string()];
        let spec = Specification::new(node, Vec::new());
        let mut solver = self.factory.solver(&spec);
        let deadline = Instant::now() + timeout;
        let properties = vec![property.to_string()];
        for k in 0.. {
            if Instant::now() >= deadline {
                return OracleVerdict::Unknown;
            }
            let limit = Some(deadline.saturating_duration_since(Instant::now()));
            match solver.query(Query::Base { k, properties: &properties }, limit) {
                Ok(Response::Unsat) => (),
                Ok(Response::Sat(_)) => return OracleVerdict::Invalid,
                Ok(Response::Unknown) => return OracleVerdict::Unknown,
                Err(e) => {
                    warn!("re-verification base query failed: {e}");
                    return OracleVerdict::Unknown;
                }
            }
            let limit = Some(deadline.saturating_duration_since(Instant::now()));
            let step = Query::Step { k: k + 1, properties: &properties, invariants: &[] };
            match solver.query(step, limit) {
                Ok(Response::Unsat) => return OracleVerdict::Valid { k: k + 1 },
                Ok(Response::Sat(_)) => (),
                Ok(Response::Unknown) => return OracleVerdict::Unknown,
                Err(e) => {
                    warn!("re-verification step query failed: {e}");
                    return OracleVerdict::Unknown;
                }
            }
        }
        unreachable!();
    }
}

/// Weaken a node by turning `id` into a free input: its defining equation is
/// removed and the properties are restricted to the one under analysis.
/// Resolves trimmed names back to their suffixed declarations.
pub fn unassign(node: &Node, id: &str, property: &str) -> Option<Node> {
    let mut node = node.clone();
    let decl = match node.type_of(id) {
        Some(ty) => VarDecl::new(id, ty.clone()),
        None => {
            let decl = node
                .locals
                .iter()
                .chain(node.outputs.iter())
                .find(|d| trim_name(&d.id) == id)?;
            decl.clone()
        }
    };
    node.locals.retain(|d| d.id != decl.id);
    node.outputs.retain(|d| d.id != decl.id);
    node.equations.retain(|eq| eq.lhs != decl.id);
    node.inputs.push(decl);
    node.properties = vec![property.to_string()];
    Some(node)
}

/// Strip internal disambiguation suffixes ("x~3" becomes "x").
pub fn trim_name(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    let mut chars = id.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            while chars.peek().is_some_and(|n| n.is_ascii_digit()) {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn trim_names(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter().map(|s| trim_name(s)).collect()
}

/// Equation left-hand sides inside the property cone, in equation order:
/// the candidate elements for core minimization.
pub fn ivc_candidates(spec: &Specification, property: &str) -> Vec<String> {
    let cone = spec.property_cone(property);
    spec.node
        .equations
        .iter()
        .filter(|eq| cone.contains(&eq.lhs))
        .map(|eq| eq.lhs.clone())
        .collect()
}

pub struct MinimalIvcFinder {
    node: Node,
    property: String,
}

impl MinimalIvcFinder {
    pub fn new(node: Node, property: impl Into<String>) -> Self {
        Self { node, property: property.into() }
    }

    /// Greedy minimization: try to unassign each candidate in turn, keeping
    /// the weakened node whenever the property still proves. The result is
    /// locally irreducible; which minimum is found depends on the candidate
    /// order. An unresolvable trial keeps its candidate.
    pub fn minimize_ivc(
        &mut self,
        candidates: &[String],
        must_elements: &BTreeSet<String>,
        oracle: &dyn Oracle,
        timeout: Duration,
    ) -> BTreeSet<String> {
        let mut minimal: BTreeSet<String> = candidates.iter().cloned().collect();
        for candidate in candidates {
            let Some(weakened) = unassign(&self.node, candidate, &self.property) else {
                warn!("ivc candidate {candidate} is not assigned in the node");
                continue;
            };
            if oracle.verify(&weakened, &self.property, timeout).is_valid() {
                debug!("dropped {candidate} from the ivc");
                minimal.remove(candidate);
                self.node = weakened;
            }
        }
        minimal.extend(must_elements.iter().cloned());
        trim_names(&minimal)
    }

    /// A candidate is a must element when unassigning it alone, from the
    /// original node, breaks the proof. Unlike minimization this never
    /// accumulates weakenings, so each trial is independent.
    pub fn compute_must(
        &self,
        candidates: &[String],
        oracle: &dyn Oracle,
        timeout: Duration,
    ) -> BTreeSet<String> {
        let mut must = BTreeSet::new();
        for candidate in candidates {
            let Some(weakened) = unassign(&self.node, candidate, &self.property) else {
                continue;
            };
            if !oracle.verify(&weakened, &self.property, timeout).is_valid() {
                must.insert(candidate.clone());
            }
        }
        trim_names(&must)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, Type};
    use crate::spec::Equation;

    #[test]
    fn trim_strips_suffixes() {
        assert_eq!(trim_name("x~3"), "x");
        assert_eq!(trim_name("x~12~4"), "x");
        assert_eq!(trim_name("x~y"), "x~y");
        assert_eq!(trim_name("plain"), "plain");
    }

    #[test]
    fn unassign_moves_signal_to_inputs() {
        let node = Node {
            id: "n".into(),
            inputs: vec![VarDecl::new("x", Type::Int)],
            outputs: vec![],
            locals: vec![VarDecl::new("e1~2", Type::Bool), VarDecl::new("p", Type::Bool)],
            equations: vec![
                Equation::new("e1~2", Expr::gt(Expr::id("x"), Expr::int(0))),
                Equation::new("p", Expr::id("e1~2")),
            ],
            assertions: vec![],
            properties: vec!["p".into(), "q".into()],
        };
        let weakened = unassign(&node, "e1", "p").unwrap();
        assert!(weakened.locals.iter().all(|d| d.id != "e1~2"));
        assert!(weakened.inputs.iter().any(|d| d.id == "e1~2"));
        assert!(weakened.equation("e1~2").is_none());
        assert_eq!(weakened.properties, ["p"]);
        assert!(unassign(&node, "zed", "p").is_none());
    }
}
