use thiserror::Error;

use crate::engine::Implication;
use crate::term::Statement;

/// The error type used by this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `ask` was given something other than a statement
    #[error("Invalid ask: {0}")]
    InvalidQuery(String),

    /// A fact was asserted with variables in it
    #[error("Facts must contain only constants: {0}")]
    NonGroundFact(Statement),

    /// A rule was asserted without premises
    #[error("Rule for {0} has no premises")]
    EmptyPremises(Statement),

    /// A rule's consequent uses a variable that none of its premises bind
    #[error("Variable '?{variable}' in {rule} is bound by no premise")]
    UnboundVariable {
        /// The variable name, without the `?` marker
        variable: String,
        /// The rejected rule
        rule: Implication,
    },

    /// Knowledge file text could not be parsed
    #[error("Parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        message: String,
    },
}

/// Result alias with this crate's [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;
