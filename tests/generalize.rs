mod common;

use common::init_logging;
use num_bigint::BigInt;
use rKind::cex::CexValue;
use rKind::expr::{Expr, Type};
use rKind::interval::generalize::{GeneralizeError, ModelGeneralizer};
use rKind::interval::{BoolInterval, Endpoint, Interval, NumericInterval};
use rKind::solver::MemoryModel;
use rKind::spec::{Equation, Node, Specification, VarDecl};
use std::sync::Arc;

fn spec_of(node: Node) -> Arc<Specification> {
    Arc::new(Specification::new(node, vec![]))
}

/// A don't-care Boolean input is widened to arbitrary and omitted from the
/// emitted counterexample.
#[test]
fn arbitrary_bool_is_omitted() {
    init_logging();
    let node = Node {
        id: "e".into(),
        inputs: vec![VarDecl::new("b", Type::Bool), VarDecl::new("c", Type::Bool)],
        outputs: vec![],
        locals: vec![VarDecl::new("p", Type::Bool)],
        equations: vec![Equation::new("p", Expr::and(Expr::id("b"), Expr::id("c")))],
        assertions: vec![],
        properties: vec!["p".into()],
    };
    let mut model = MemoryModel::new();
    model.insert_bool("b", 2, true);
    model.insert_bool("c", 2, false);
    let mg = ModelGeneralizer::new(spec_of(node), "p", Arc::new(model), 3);
    let cex = mg.generalize().unwrap();

    assert!(cex.signal("b").is_none(), "don't-care signal must be omitted");
    assert_eq!(
        cex.signal("c").unwrap().value(2),
        Some(&CexValue::Interval(Interval::Bool(BoolInterval::False)))
    );
}

/// An integer input pinned only from below widens to a half line with an
/// exact boundary.
#[test]
fn integer_widens_to_half_line() {
    init_logging();
    let node = Node {
        id: "w".into(),
        inputs: vec![VarDecl::new("x", Type::Int)],
        outputs: vec![],
        locals: vec![VarDecl::new("p", Type::Bool)],
        equations: vec![Equation::new("p", Expr::lt(Expr::id("x"), Expr::int(10)))],
        assertions: vec![],
        properties: vec!["p".into()],
    };
    let mut model = MemoryModel::new();
    model.insert_raw("x", 0, "15");
    model.insert_bool("p", 0, false);
    let mg = ModelGeneralizer::new(spec_of(node), "p", Arc::new(model), 1);
    let cex = mg.generalize().unwrap();

    let expected = NumericInterval::new(Endpoint::Int(BigInt::from(10)), Endpoint::PosInf);
    assert_eq!(
        cex.signal("x").unwrap().value(0),
        Some(&CexValue::Interval(Interval::Numeric(expected)))
    );
}

/// A bounded-integer input is widened in a single all-or-nothing probe.
#[test]
fn subrange_keeps_concrete_value_when_widening_breaks() {
    init_logging();
    let node = Node {
        id: "s".into(),
        inputs: vec![VarDecl::new("s", Type::Subrange {
            low: BigInt::from(0),
            high: BigInt::from(3),
        })],
        outputs: vec![],
        locals: vec![VarDecl::new("p", Type::Bool)],
        equations: vec![Equation::new("p", Expr::gt(Expr::id("s"), Expr::int(5)))],
        assertions: vec![],
        properties: vec!["p".into()],
    };
    let mut model = MemoryModel::new();
    model.insert_raw("s", 0, "3");
    let mg = ModelGeneralizer::new(spec_of(node), "p", Arc::new(model), 1);
    let cex = mg.generalize().unwrap();

    let expected = NumericInterval::singleton(Endpoint::Int(BigInt::from(3)));
    assert_eq!(
        cex.signal("s").unwrap().value(0),
        Some(&CexValue::Interval(Interval::Numeric(expected)))
    );
}

/// Signals only assertions read stay concrete and never reach the emitted
/// counterexample.
#[test]
fn assertion_only_signals_stay_out_of_cex() {
    init_logging();
    let node = Node {
        id: "a".into(),
        inputs: vec![VarDecl::new("b", Type::Bool), VarDecl::new("c", Type::Bool)],
        outputs: vec![],
        locals: vec![VarDecl::new("p", Type::Bool)],
        equations: vec![Equation::new("p", Expr::id("b"))],
        assertions: vec![Expr::or(Expr::id("b"), Expr::id("c"))],
        properties: vec!["p".into()],
    };
    let mut model = MemoryModel::new();
    model.insert_bool("b", 0, false);
    model.insert_bool("c", 0, true);
    let mg = ModelGeneralizer::new(spec_of(node), "p", Arc::new(model), 1);
    let cex = mg.generalize().unwrap();

    assert!(cex.signal("c").is_none());
    assert_eq!(
        cex.signal("b").unwrap().value(0),
        Some(&CexValue::Interval(Interval::Bool(BoolInterval::False)))
    );
}

/// Generalization is sound: a kept boundary really is the loosest one. The
/// accepted interval for x must still falsify the property, and one step
/// looser must not.
#[test]
fn widened_interval_is_maximal() {
    init_logging();
    let node = Node {
        id: "m".into(),
        inputs: vec![VarDecl::new("x", Type::Int)],
        outputs: vec![],
        locals: vec![VarDecl::new("p", Type::Bool)],
        equations: vec![Equation::new(
            "p",
            Expr::or(
                Expr::lt(Expr::id("x"), Expr::int(-7)),
                Expr::gt(Expr::id("x"), Expr::int(7)),
            ),
        )],
        assertions: vec![],
        properties: vec!["p".into()],
    };
    // p is false exactly on [-7, 7]
    let mut model = MemoryModel::new();
    model.insert_raw("x", 0, "2");
    let mg = ModelGeneralizer::new(spec_of(node), "p", Arc::new(model), 1);
    let cex = mg.generalize().unwrap();

    let expected = NumericInterval::new(Endpoint::Int(BigInt::from(-7)), Endpoint::Int(BigInt::from(7)));
    assert_eq!(
        cex.signal("x").unwrap().value(0),
        Some(&CexValue::Interval(Interval::Numeric(expected)))
    );
}

/// A self-referential definition is a fatal error for the attempt, reported
/// as such rather than retried.
#[test]
fn algebraic_loop_is_detected() {
    init_logging();
    let node = Node {
        id: "loop".into(),
        inputs: vec![],
        outputs: vec![],
        locals: vec![VarDecl::new("x", Type::Int), VarDecl::new("p", Type::Bool)],
        equations: vec![
            Equation::new("x", Expr::add(Expr::id("x"), Expr::int(1))),
            Equation::new("p", Expr::gt(Expr::id("x"), Expr::int(0))),
        ],
        assertions: vec![],
        properties: vec!["p".into()],
    };
    let model = MemoryModel::new();
    let mg = ModelGeneralizer::new(spec_of(node), "p", Arc::new(model), 1);
    assert_eq!(
        mg.generalize(),
        Err(GeneralizeError::AlgebraicLoop { id: "x".into(), step: 0 })
    );
}

/// A model that does not actually falsify the property is an upstream bug,
/// surfaced as an inconsistent seed.
#[test]
fn consistent_model_is_rejected() {
    init_logging();
    let node = Node {
        id: "seed".into(),
        inputs: vec![VarDecl::new("b", Type::Bool)],
        outputs: vec![],
        locals: vec![VarDecl::new("p", Type::Bool)],
        equations: vec![Equation::new("p", Expr::id("b"))],
        assertions: vec![],
        properties: vec!["p".into()],
    };
    let mut model = MemoryModel::new();
    model.insert_bool("b", 0, true);
    let mg = ModelGeneralizer::new(spec_of(node), "p", Arc::new(model), 1);
    assert_eq!(mg.generalize(), Err(GeneralizeError::InconsistentSeed));
}

/// Initialized delay: pre shifts evaluation a step back, arrow selects the
/// initial branch at step 0. The init value is load-bearing, the later
/// input is not.
#[test]
fn delayed_stream_generalizes_per_step() {
    init_logging();
    // q = false -> pre b, p = not q: violating p at step 1 pins b at 0 only
    let node = Node {
        id: "delay".into(),
        inputs: vec![VarDecl::new("b", Type::Bool)],
        outputs: vec![],
        locals: vec![VarDecl::new("q", Type::Bool), VarDecl::new("p", Type::Bool)],
        equations: vec![
            Equation::new("q", Expr::arrow(Expr::Bool(false), Expr::pre(Expr::id("b")))),
            Equation::new("p", Expr::not_(Expr::id("q"))),
        ],
        assertions: vec![],
        properties: vec!["p".into()],
    };
    let mut model = MemoryModel::new();
    model.insert_bool("b", 0, true);
    model.insert_bool("b", 1, false);
    let mg = ModelGeneralizer::new(spec_of(node), "p", Arc::new(model), 2);
    let cex = mg.generalize().unwrap();

    assert_eq!(
        cex.signal("b").unwrap().value(0),
        Some(&CexValue::Interval(Interval::Bool(BoolInterval::True)))
    );
    assert!(cex.signal("b").unwrap().value(1).is_none());
}
