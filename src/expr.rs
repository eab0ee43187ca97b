use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;
use std::collections::BTreeSet;
use std::fmt;

/// Declared type of a stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Bool,
    Int,
    Real,
    Subrange { low: BigInt, high: BigInt },
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Real => write!(f, "real"),
            Type::Subrange { low, high } => write!(f, "subrange [{low}, {high}]"),
        }
    }
}

/// Concrete stream value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Integer(BigInt),
    Real(BigRational),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
        }
    }
}

/// Parse a raw solver value by the declared type of its stream.
///
/// Integers are plain decimal, reals are either decimal fractions ("1.5"),
/// rationals ("2/3") or plain integers.
pub fn parse_value(ty: &Type, raw: &str) -> Option<Value> {
    let raw = raw.trim();
    match ty {
        Type::Bool => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        Type::Int | Type::Subrange { .. } => raw.parse::<BigInt>().ok().map(Value::Integer),
        Type::Real => parse_real(raw).map(Value::Real),
    }
}

fn parse_real(raw: &str) -> Option<BigRational> {
    if let Some((numer, denom)) = raw.split_once('/') {
        let numer = numer.trim().parse::<BigInt>().ok()?;
        let denom = denom.trim().parse::<BigInt>().ok()?;
        if denom.is_zero() {
            return None;
        }
        return Some(BigRational::new(numer, denom));
    }
    if let Some((int, frac)) = raw.split_once('.') {
        let negative = int.trim_start().starts_with('-');
        let int = int.parse::<BigInt>().ok()?;
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let scale = BigInt::from(10u8).pow(frac.len() as u32);
        let frac = frac.parse::<BigInt>().ok()?;
        let numer = if negative { int * &scale - frac } else { int * &scale + frac };
        return Some(BigRational::new(numer, scale));
    }
    raw.parse::<BigInt>().ok().map(BigRational::from_integer)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    /// Value of the operand at the previous step.
    Pre,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Implies,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    /// Initialization: left at step 0, right afterwards.
    Arrow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Implies => "=>",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Arrow => "->",
        }
    }
}

/// Stream expression over one time step.
///
/// A closed sum type: every transformation over expressions is an exhaustive
/// match, so a new expression kind fails to compile until each pass handles it.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Id(String),
    Bool(bool),
    Int(BigInt),
    Real(BigRational),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn id(id: impl Into<String>) -> Self {
        Expr::Id(id.into())
    }

    pub fn int(i: i64) -> Self {
        Expr::Int(BigInt::from(i))
    }

    pub fn not_(e: Expr) -> Self {
        Expr::Unary(UnaryOp::Not, Box::new(e))
    }

    pub fn neg(e: Expr) -> Self {
        Expr::Unary(UnaryOp::Neg, Box::new(e))
    }

    pub fn pre(e: Expr) -> Self {
        Expr::Unary(UnaryOp::Pre, Box::new(e))
    }

    pub fn binary(op: BinaryOp, l: Expr, r: Expr) -> Self {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }

    pub fn and(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::And, l, r)
    }

    pub fn or(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Or, l, r)
    }

    pub fn implies(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Implies, l, r)
    }

    pub fn eq(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Eq, l, r)
    }

    pub fn lt(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Lt, l, r)
    }

    pub fn le(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Le, l, r)
    }

    pub fn gt(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Gt, l, r)
    }

    pub fn ge(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Ge, l, r)
    }

    pub fn add(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Add, l, r)
    }

    pub fn arrow(l: Expr, r: Expr) -> Self {
        Self::binary(BinaryOp::Arrow, l, r)
    }

    pub fn ite(c: Expr, t: Expr, e: Expr) -> Self {
        Expr::Ite(Box::new(c), Box::new(t), Box::new(e))
    }

    /// Collect every stream referenced by this expression.
    pub fn ids(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Id(id) => {
                out.insert(id.clone());
            }
            Expr::Bool(_) | Expr::Int(_) | Expr::Real(_) => (),
            Expr::Unary(_, e) => e.ids(out),
            Expr::Binary(_, l, r) => {
                l.ids(out);
                r.ids(out);
            }
            Expr::Ite(c, t, e) => {
                c.ids(out);
                t.ids(out);
                e.ids(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Id(id) => write!(f, "{id}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Int(i) => write!(f, "{i}"),
            Expr::Real(r) => write!(f, "{r}"),
            Expr::Unary(UnaryOp::Neg, e) => write!(f, "-{e}"),
            Expr::Unary(UnaryOp::Not, e) => write!(f, "not {e}"),
            Expr::Unary(UnaryOp::Pre, e) => write!(f, "pre {e}"),
            Expr::Binary(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Expr::Ite(c, t, e) => write!(f, "(if {c} then {t} else {e})"),
        }
    }
}
