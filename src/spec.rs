use crate::expr::{Expr, Type};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarDecl {
    pub id: String,
    pub ty: Type,
}

impl VarDecl {
    pub fn new(id: impl Into<String>, ty: Type) -> Self {
        Self { id: id.into(), ty }
    }
}

/// Uninterpreted helper function declared by the checked program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub id: String,
    pub inputs: Vec<VarDecl>,
    pub output: VarDecl,
}

/// Single-assignment stream definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    pub lhs: String,
    pub rhs: Expr,
}

impl Equation {
    pub fn new(lhs: impl Into<String>, rhs: Expr) -> Self {
        Self { lhs: lhs.into(), rhs }
    }
}

/// The checked node, as produced by the translation pipeline: flattened,
/// single-assignment, with named Boolean properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub id: String,
    pub inputs: Vec<VarDecl>,
    pub outputs: Vec<VarDecl>,
    pub locals: Vec<VarDecl>,
    pub equations: Vec<Equation>,
    pub assertions: Vec<Expr>,
    pub properties: Vec<String>,
}

impl Node {
    pub fn var_decls(&self) -> impl Iterator<Item = &VarDecl> {
        self.inputs.iter().chain(self.outputs.iter()).chain(self.locals.iter())
    }

    pub fn type_of(&self, id: &str) -> Option<&Type> {
        self.var_decls().find(|d| d.id == id).map(|d| &d.ty)
    }

    pub fn equation(&self, id: &str) -> Option<&Equation> {
        self.equations.iter().find(|e| e.lhs == id)
    }
}

/// Immutable bundle consumed by every engine: the node, its helper
/// functions, and the derived type and dependency maps.
#[derive(Clone, Debug)]
pub struct Specification {
    pub node: Node,
    pub functions: Vec<Function>,
    pub type_map: HashMap<String, Type>,
    /// Transitive closure: signal to every signal its definition reads.
    /// Undefined signals (free inputs) have an empty entry.
    pub dependency_map: HashMap<String, BTreeSet<String>>,
}

impl Specification {
    pub fn new(node: Node, functions: Vec<Function>) -> Self {
        let type_map = node
            .var_decls()
            .map(|d| (d.id.clone(), d.ty.clone()))
            .collect();
        let direct: BTreeMap<&str, BTreeSet<String>> = node
            .equations
            .iter()
            .map(|eq| {
                let mut ids = BTreeSet::new();
                eq.rhs.ids(&mut ids);
                (eq.lhs.as_str(), ids)
            })
            .collect();
        let mut dependency_map = HashMap::new();
        for decl in node.var_decls() {
            let mut closure = BTreeSet::new();
            let mut stack: Vec<String> = direct
                .get(decl.id.as_str())
                .into_iter()
                .flatten()
                .cloned()
                .collect();
            while let Some(id) = stack.pop() {
                if closure.insert(id.clone()) {
                    stack.extend(direct.get(id.as_str()).into_iter().flatten().cloned());
                }
            }
            dependency_map.insert(decl.id.clone(), closure);
        }
        Self { node, functions, type_map, dependency_map }
    }

    /// The signals a property's verdict can depend on, including itself.
    pub fn property_cone(&self, property: &str) -> BTreeSet<String> {
        let mut cone = self
            .dependency_map
            .get(property)
            .cloned()
            .unwrap_or_default();
        cone.insert(property.to_string());
        cone
    }

    /// Every signal read by an assertion, transitively.
    pub fn assertion_cone(&self) -> BTreeSet<String> {
        let mut cone = BTreeSet::new();
        for assertion in &self.node.assertions {
            let mut ids = BTreeSet::new();
            assertion.ids(&mut ids);
            for id in ids {
                if let Some(closure) = self.dependency_map.get(&id) {
                    cone.extend(closure.iter().cloned());
                }
                cone.insert(id);
            }
        }
        cone
    }
}

/// For each signal, the set of signals whose cached evaluation must be
/// discarded when that signal's value changes. Spans the property cone plus
/// every assertion cone, so a trial substitution of a shared input also
/// evicts assertion-only dependents.
#[derive(Debug)]
pub struct ReverseDependencyMap {
    affected: HashMap<String, BTreeSet<String>>,
}

impl ReverseDependencyMap {
    pub fn new(spec: &Specification, property: &str) -> Self {
        let mut universe = spec.property_cone(property);
        universe.extend(spec.assertion_cone());
        let mut affected: HashMap<String, BTreeSet<String>> = HashMap::new();
        for target in &universe {
            let entry = affected.entry(target.clone()).or_default();
            entry.insert(target.clone());
            for source in &universe {
                if let Some(deps) = spec.dependency_map.get(source)
                    && deps.contains(target)
                {
                    entry.insert(source.clone());
                }
            }
        }
        Self { affected }
    }

    /// `None` when the signal is outside every cone of interest.
    pub fn get(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.affected.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    fn chain_node() -> Node {
        // p = q, q = x + 1, with free input x and an assertion over a
        Node {
            id: "chain".into(),
            inputs: vec![
                VarDecl::new("x", Type::Int),
                VarDecl::new("a", Type::Bool),
            ],
            outputs: vec![],
            locals: vec![
                VarDecl::new("p", Type::Bool),
                VarDecl::new("q", Type::Bool),
            ],
            equations: vec![
                Equation::new("p", Expr::id("q")),
                Equation::new("q", Expr::gt(Expr::add(Expr::id("x"), Expr::int(1)), Expr::int(0))),
            ],
            assertions: vec![Expr::id("a")],
            properties: vec!["p".into()],
        }
    }

    #[test]
    fn dependency_closure() {
        let spec = Specification::new(chain_node(), vec![]);
        let deps = &spec.dependency_map["p"];
        assert!(deps.contains("q") && deps.contains("x"));
        assert!(!deps.contains("a"));
        assert!(spec.dependency_map["x"].is_empty());
        assert_eq!(
            spec.property_cone("p").into_iter().collect::<Vec<_>>(),
            ["p", "q", "x"]
        );
        assert_eq!(spec.assertion_cone().into_iter().collect::<Vec<_>>(), ["a"]);
    }

    #[test]
    fn reverse_map_spans_assertions() {
        let spec = Specification::new(chain_node(), vec![]);
        let rdm = ReverseDependencyMap::new(&spec, "p");
        let affected = rdm.get("x").unwrap();
        assert!(affected.contains("x") && affected.contains("q") && affected.contains("p"));
        assert!(rdm.get("a").unwrap().contains("a"));
        assert!(rdm.get("unrelated").is_none());
    }
}
