//! Unification and instantiation of statements.
//!
//! Both operations share the [`Bindings`] substitution. Unification extends a
//! single binding set across every term pair of two statements; instantiation
//! applies a binding set to a template, leaving unbound variables in place.

use std::fmt;

use indexmap::IndexMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::term::{Statement, Term, VARIABLE_MARKER};

/// A substitution from variable names to terms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bindings {
    bindings: IndexMap<String, Term>,
}

impl Bindings {
    /// Create an empty binding set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The fully resolved value of a variable, if it is bound
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.bindings
            .get(variable)
            .map(|term| self.resolve(term))
    }

    /// Number of bound variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate over the bindings in the order they were made
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings
            .iter()
            .map(|(variable, term)| (variable.as_str(), term))
    }

    /// Follow variable-to-variable bindings until reaching a constant or an
    /// unbound variable
    #[must_use]
    pub fn resolve<'a>(&'a self, mut term: &'a Term) -> &'a Term {
        // Bounded so that a hand-built cyclic map cannot loop
        for _ in 0..=self.bindings.len() {
            match term {
                Term::Variable(name) => match self.bindings.get(name) {
                    Some(next) => term = next,
                    None => break,
                },
                Term::Constant(_) => break,
            }
        }
        term
    }

    fn bind(&mut self, variable: String, term: Term) {
        self.bindings.insert(variable, term);
    }

    /// Unify two terms under the accumulated bindings
    fn unify_terms(&mut self, left: &Term, right: &Term) -> bool {
        let left = self.resolve(left).clone();
        let right = self.resolve(right).clone();

        match (left, right) {
            (Term::Constant(a), Term::Constant(b)) => a == b,
            (Term::Variable(a), Term::Variable(b)) if a == b => true,
            (Term::Variable(variable), term) | (term, Term::Variable(variable)) => {
                self.bind(variable, term);
                true
            }
        }
    }
}

impl FromIterator<(String, Term)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (String, Term)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (variable, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{VARIABLE_MARKER}{variable} : {}", self.resolve(term))?;
        }
        Ok(())
    }
}

/// Computes the binding set that makes two statements identical.
///
/// Returns `None` when the statements cannot be unified. A successful match
/// that needs no bindings returns an empty [`Bindings`], never `None`.
///
/// ```rust
/// use microtms::{unify, Statement, Term};
///
/// let bindings = unify(
///     &Statement::new("on", ["a", "b"]),
///     &Statement::new("on", ["?x", "b"]),
/// )
/// .unwrap();
/// assert_eq!(bindings.get("x"), Some(&Term::constant("a")));
///
/// assert!(unify(&Statement::new("on", ["a"]), &Statement::new("on", ["a"])).unwrap().is_empty());
/// assert!(unify(&Statement::new("on", ["a"]), &Statement::new("on", ["b"])).is_none());
/// ```
#[must_use]
pub fn unify(left: &Statement, right: &Statement) -> Option<Bindings> {
    if left.predicate != right.predicate || left.terms.len() != right.terms.len() {
        return None;
    }

    let mut bindings = Bindings::new();
    let unified = left
        .terms
        .iter()
        .zip(&right.terms)
        .all(|(a, b)| bindings.unify_terms(a, b));

    unified.then_some(bindings)
}

/// Applies `bindings` to `template`, replacing every bound variable.
///
/// Variables that are not bound are kept as they are, so the remaining
/// premises of a partially matched rule keep their free variables.
#[must_use]
pub fn instantiate(template: &Statement, bindings: &Bindings) -> Statement {
    Statement {
        predicate: template.predicate.clone(),
        terms: template
            .terms
            .iter()
            .map(|term| bindings.resolve(term).clone())
            .collect(),
    }
}
