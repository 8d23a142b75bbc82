use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Prefix that marks a variable in textual form (e.g. `?x`)
pub const VARIABLE_MARKER: char = '?';

/// A term appearing in a statement
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Term {
    /// A variable scoped to the rule or query it appears in (e.g. `?x`).
    /// The stored name does not include the `?` marker.
    Variable(String),
    /// A concrete constant (e.g. `a`, `block`)
    Constant(String),
}

impl Term {
    /// Create a variable term from its bare name
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// Create a constant term
    #[must_use]
    pub fn constant(name: impl Into<String>) -> Self {
        Self::Constant(name.into())
    }

    /// Returns true for [`Term::Variable`]
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }
}

/// Applies the naming convention: a leading `?` makes a variable.
impl From<&str> for Term {
    fn from(value: &str) -> Self {
        match value.strip_prefix(VARIABLE_MARKER) {
            Some(name) => Self::Variable(name.to_string()),
            None => Self::Constant(value.to_string()),
        }
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "{VARIABLE_MARKER}{name}"),
            Self::Constant(name) => f.write_str(name),
        }
    }
}

/// A predicate applied to an ordered list of terms (e.g. `(on a b)`)
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Statement {
    /// The name of the predicate (e.g. `"on"`, `"above"`)
    pub predicate: String,
    /// The arguments of the predicate
    pub terms: SmallVec<[Term; 4]>,
}

impl Statement {
    /// Build a statement from a predicate and its terms.
    ///
    /// ```rust
    /// use microtms::{Statement, Term};
    ///
    /// let statement = Statement::new("on", ["?x", "b"]);
    /// assert_eq!(statement.terms[0], Term::var("x"));
    /// assert_eq!(statement.to_string(), "(on ?x b)");
    /// ```
    pub fn new<T: Into<Term>>(
        predicate: impl Into<String>,
        terms: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            predicate: predicate.into(),
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of terms
    #[must_use]
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Returns true if no term is a variable
    #[must_use]
    pub fn is_ground(&self) -> bool {
        !self.terms.iter().any(Term::is_variable)
    }

    /// Variable names in order of first appearance
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        let mut seen: SmallVec<[&str; 4]> = SmallVec::new();
        self.terms.iter().filter_map(move |term| match term {
            Term::Variable(name) if !seen.contains(&name.as_str()) => {
                seen.push(name.as_str());
                Some(name.as_str())
            }
            _ => None,
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.predicate)?;
        for term in &self.terms {
            write!(f, " {term}")?;
        }
        f.write_str(")")
    }
}
