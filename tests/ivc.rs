mod common;

use common::{ScriptFactory, init_logging};
use rKind::expr::{Expr, Type};
use rKind::ivc::{MiniChecker, MinimalIvcFinder, Oracle, OracleVerdict, ivc_candidates, unassign};
use rKind::solver::{Query, Response};
use rKind::spec::{Equation, Node, Specification, VarDecl};
use std::collections::BTreeSet;
use std::time::Duration;

fn set(elements: &[&str]) -> BTreeSet<String> {
    elements.iter().map(|s| s.to_string()).collect()
}

fn core_node() -> Node {
    Node {
        id: "core".into(),
        inputs: vec![VarDecl::new("x", Type::Int)],
        outputs: vec![],
        locals: vec![
            VarDecl::new("e1", Type::Bool),
            VarDecl::new("e2", Type::Bool),
            VarDecl::new("e3", Type::Bool),
            VarDecl::new("p", Type::Bool),
        ],
        equations: vec![
            Equation::new("e1", Expr::gt(Expr::id("x"), Expr::int(0))),
            Equation::new("e2", Expr::lt(Expr::id("x"), Expr::int(10))),
            Equation::new("e3", Expr::ge(Expr::id("x"), Expr::int(0))),
            Equation::new(
                "p",
                Expr::and(Expr::id("e1"), Expr::and(Expr::id("e2"), Expr::id("e3"))),
            ),
        ],
        assertions: vec![],
        properties: vec!["p".into()],
    }
}

/// Decides by which equations have been freed into inputs: unassigning e2
/// alone breaks the proof, e3 breaks it only once e1 is gone too.
struct RuleOracle {
    original_inputs: BTreeSet<String>,
}

impl RuleOracle {
    fn new(node: &Node) -> Self {
        Self { original_inputs: node.inputs.iter().map(|d| d.id.clone()).collect() }
    }
}

impl Oracle for RuleOracle {
    fn verify(&self, node: &Node, _property: &str, _timeout: Duration) -> OracleVerdict {
        let freed: BTreeSet<String> = node
            .inputs
            .iter()
            .map(|d| d.id.clone())
            .filter(|id| !self.original_inputs.contains(id))
            .collect();
        if freed.contains("e2") || (freed.contains("e1") && freed.contains("e3")) {
            OracleVerdict::Invalid
        } else {
            OracleVerdict::Valid { k: 1 }
        }
    }
}

/// Greedy minimization is cumulative and order-dependent; the must set is
/// computed per candidate from the original node.
#[test]
fn minimize_and_must_follow_the_order_rules() {
    init_logging();
    let node = core_node();
    let candidates = vec!["e1".to_string(), "e2".to_string(), "e3".to_string()];
    let oracle = RuleOracle::new(&node);

    let finder = MinimalIvcFinder::new(node.clone(), "p");
    let must = finder.compute_must(&candidates, &oracle, Duration::from_secs(1));
    assert_eq!(must, set(&["e2"]));

    let mut finder = MinimalIvcFinder::new(node, "p");
    let minimal = finder.minimize_ivc(&candidates, &must, &oracle, Duration::from_secs(1));
    assert_eq!(minimal, set(&["e2", "e3"]));
    assert!(must.is_subset(&minimal), "must set must be within the minimal core");
}

/// An oracle that cannot decide a trial keeps the candidate.
#[test]
fn unresolvable_trials_keep_candidates() {
    init_logging();
    struct UnknownOracle;
    impl Oracle for UnknownOracle {
        fn verify(&self, _: &Node, _: &str, _: Duration) -> OracleVerdict {
            OracleVerdict::Unknown
        }
    }
    let node = core_node();
    let candidates = vec!["e1".to_string(), "e2".to_string(), "e3".to_string()];
    let mut finder = MinimalIvcFinder::new(node, "p");
    let minimal =
        finder.minimize_ivc(&candidates, &BTreeSet::new(), &UnknownOracle, Duration::from_secs(1));
    assert_eq!(minimal, set(&["e1", "e2", "e3"]));
}

/// Internal disambiguation suffixes are stripped from reported cores.
#[test]
fn reported_cores_are_trimmed() {
    init_logging();
    let mut node = core_node();
    node.locals[0].id = "e1~7".into();
    node.equations[0].lhs = "e1~7".into();
    struct ValidOracle;
    impl Oracle for ValidOracle {
        fn verify(&self, _: &Node, _: &str, _: Duration) -> OracleVerdict {
            OracleVerdict::Valid { k: 1 }
        }
    }
    let candidates = vec!["e1~7".to_string(), "e2".to_string()];
    let mut finder = MinimalIvcFinder::new(node, "p");
    let minimal = finder.minimize_ivc(
        &candidates,
        &set(&["e1~7", "e2"]),
        &ValidOracle,
        Duration::from_secs(1),
    );
    assert_eq!(minimal, set(&["e1", "e2"]));
}

#[test]
fn candidates_are_cone_restricted_in_equation_order() {
    let mut node = core_node();
    // an equation outside p's cone must not become a candidate
    node.locals.push(VarDecl::new("noise", Type::Bool));
    node.equations.push(Equation::new("noise", Expr::id("e1")));
    let spec = Specification::new(node, vec![]);
    assert_eq!(ivc_candidates(&spec, "p"), ["e1", "e2", "e3", "p"]);
}

#[test]
fn unassign_weakens_into_an_input() {
    let node = core_node();
    let weakened = unassign(&node, "e2", "p").unwrap();
    assert!(weakened.inputs.iter().any(|d| d.id == "e2"));
    assert!(weakened.equation("e2").is_none());
    assert_eq!(weakened.properties, ["p"]);
    // the original node is untouched
    assert!(node.equation("e2").is_some());
}

/// The default oracle runs a fresh base/step loop per trial.
#[test]
fn mini_checker_verdicts() {
    init_logging();
    let valid_factory = ScriptFactory::new(|_, query| {
        Ok(match query {
            Query::Base { .. } => Response::Unsat,
            Query::Step { .. } => Response::Unsat,
            _ => Response::Unknown,
        })
    });
    let checker = MiniChecker::new(valid_factory);
    let verdict = checker.verify(&core_node(), "p", Duration::from_secs(1));
    assert_eq!(verdict, OracleVerdict::Valid { k: 1 });

    let invalid_factory = ScriptFactory::new(|spec, query| {
        Ok(match query {
            Query::Base { k, .. } => {
                // a weakened node (an extra input) admits a violation
                if spec.node.inputs.len() > 1 {
                    let mut model = rKind::solver::MemoryModel::new();
                    model.insert_bool("p", *k as i64, false);
                    Response::Sat(std::sync::Arc::new(model))
                } else {
                    Response::Unsat
                }
            }
            Query::Step { .. } => Response::Unsat,
            _ => Response::Unknown,
        })
    });
    let checker = MiniChecker::new(invalid_factory);
    let weakened = unassign(&core_node(), "e2", "p").unwrap();
    assert_eq!(checker.verify(&weakened, "p", Duration::from_secs(1)), OracleVerdict::Invalid);

    let checker_timeout = MiniChecker::new(ScriptFactory::new(|_, _| Ok(Response::Unknown)));
    assert_eq!(
        checker_timeout.verify(&core_node(), "p", Duration::ZERO),
        OracleVerdict::Unknown
    );
}
