//! The rule language used by plugin descriptors for defaults, enable/disable toggles,
//! validation and output filenames.
//!
//! Rules are compiled once into an [`Expr`] tree and evaluated against a [`Scope`]
//! whenever the values they read may have changed. Evaluation has no side effects.

mod compile;
mod lexer;
mod parser;

use indexmap::IndexMap;

use crate::value::Value;

pub use compile::Compiler;

/// File-slot fields readable with a dotted reference such as `input.filename`.
pub const FILE_FIELDS: [&str; 3] = ["filename", "filepath", "rootname"];

/// Read access to the named values a rule may reference.
pub trait Scope {
    fn has(&self, name: &str) -> bool;

    fn value(&self, name: &str) -> Value;

    /// A file-slot field of a node; `None` for nodes without one.
    fn field(&self, _name: &str, _field: &str) -> Option<Value> {
        None
    }

    fn is_disabled(&self, _name: &str) -> bool {
        false
    }
}

impl Scope for IndexMap<String, Value> {
    fn has(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn value(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        use std::cmp::Ordering;

        match self {
            CompareOp::Eq => lhs.loose_eq(rhs),
            CompareOp::Ne => !lhs.loose_eq(rhs),
            CompareOp::Lt => lhs.compare(rhs) == Some(Ordering::Less),
            CompareOp::Gt => lhs.compare(rhs) == Some(Ordering::Greater),
            CompareOp::Le => matches!(lhs.compare(rhs), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::Ge => {
                matches!(lhs.compare(rhs), Some(Ordering::Greater | Ordering::Equal))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Reference {
        name: String,
        field: Option<String>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Contains {
        haystack: Box<Expr>,
        needle: Box<Expr>,
    },
    /// `name is enabled` when `enabled` is set, `name is disabled` otherwise.
    State {
        name: String,
        enabled: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// First branch whose condition holds wins.
    Conditional {
        branches: Vec<(Expr, Expr)>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn evaluate(&self, scope: &dyn Scope) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Reference { name, field: None } => scope.value(name),
            Expr::Reference {
                name,
                field: Some(field),
            } => scope.field(name, field).unwrap_or_default(),
            Expr::Compare { op, lhs, rhs } => {
                Value::Bool(op.apply(&lhs.evaluate(scope), &rhs.evaluate(scope)))
            }
            Expr::Contains { haystack, needle } => {
                Value::Bool(haystack.evaluate(scope).contains(&needle.evaluate(scope)))
            }
            Expr::State { name, enabled } => Value::Bool(scope.is_disabled(name) != *enabled),
            Expr::And(lhs, rhs) => {
                let left = lhs.evaluate(scope);
                if left.is_truthy() {
                    rhs.evaluate(scope)
                } else {
                    left
                }
            }
            Expr::Or(lhs, rhs) => {
                let left = lhs.evaluate(scope);
                if left.is_truthy() {
                    left
                } else {
                    rhs.evaluate(scope)
                }
            }
            Expr::Not(inner) => Value::Bool(!inner.evaluate(scope).is_truthy()),
            Expr::Conditional {
                branches,
                otherwise,
            } => branches
                .iter()
                .find(|(condition, _)| condition.evaluate(scope).is_truthy())
                .map_or_else(|| otherwise.evaluate(scope), |(_, result)| result.evaluate(scope)),
        }
    }
}

/// A compiled rule together with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    source: String,
    expr: Expr,
}

impl Rule {
    pub fn new(source: impl Into<String>, expr: Expr) -> Self {
        Self {
            source: source.into(),
            expr,
        }
    }

    /// The rule that replaces one that failed to compile.
    pub fn noop(source: impl Into<String>) -> Self {
        Self::new(source, Expr::Literal(Value::empty()))
    }

    pub fn literal(value: Value) -> Self {
        Self::new(value.to_string(), Expr::Literal(value))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Value {
        self.expr.evaluate(scope)
    }
}
