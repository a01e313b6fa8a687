//! Conditional compilation: `#[cfg(..)]` predicates and the options they
//! are evaluated against.

use std::collections::BTreeSet;

use crate::base::Name;

/// A parsed `cfg` predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CfgExpr {
    /// `test`, `unix`
    Atom(Name),
    /// `feature = "serde"`
    KeyValue { key: Name, value: Name },
    All(Vec<CfgExpr>),
    Any(Vec<CfgExpr>),
    Not(Box<CfgExpr>),
}

impl CfgExpr {
    pub fn eval(&self, options: &CfgOptions) -> bool {
        match self {
            CfgExpr::Atom(name) => options.atoms.contains(name),
            CfgExpr::KeyValue { key, value } => {
                options.key_values.contains(&(key.clone(), value.clone()))
            }
            CfgExpr::All(exprs) => exprs.iter().all(|expr| expr.eval(options)),
            CfgExpr::Any(exprs) => exprs.iter().any(|expr| expr.eval(options)),
            CfgExpr::Not(expr) => !expr.eval(options),
        }
    }

    /// Conjunction of two optional predicates.
    pub fn and(lhs: Option<CfgExpr>, rhs: Option<CfgExpr>) -> Option<CfgExpr> {
        match (lhs, rhs) {
            (None, rhs) => rhs,
            (lhs, None) => lhs,
            (Some(CfgExpr::All(mut exprs)), Some(rhs)) => {
                exprs.push(rhs);
                Some(CfgExpr::All(exprs))
            }
            (Some(lhs), Some(rhs)) => Some(CfgExpr::All(vec![lhs, rhs])),
        }
    }
}

/// The set of enabled cfg atoms and key-value pairs of one crate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CfgOptions {
    atoms: BTreeSet<Name>,
    key_values: BTreeSet<(Name, Name)>,
}

impl CfgOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_atom(mut self, atom: &str) -> Self {
        self.atoms.insert(Name::new(atom));
        self
    }

    pub fn with_key_value(mut self, key: &str, value: &str) -> Self {
        self.key_values.insert((Name::new(key), Name::new(value)));
        self
    }

    /// Shorthand for `feature = "<name>"`.
    pub fn with_feature(self, feature: &str) -> Self {
        self.with_key_value("feature", feature)
    }
}
